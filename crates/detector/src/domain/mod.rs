#![forbid(unsafe_code)]

mod entry;
mod snapshot;

pub use entry::{DefectiveEntry, ProcessEntry, RelationshipEntry};
pub use snapshot::{DetectionSnapshot, Generation, SnapshotBuilder};
