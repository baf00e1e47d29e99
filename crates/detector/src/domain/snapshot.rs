#![forbid(unsafe_code)]

use crate::domain::{DefectiveEntry, ProcessEntry, RelationshipEntry};
use rustc_hash::FxHashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Sequence number of a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The empty snapshot served before the first cycle completes.
    pub const INITIAL: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything one scan cycle found. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionSnapshot {
    pub generation: Generation,
    pub completed_at: Option<SystemTime>,
    pub unsigned: Vec<ProcessEntry>,
    pub malicious: Vec<ProcessEntry>,
    pub defective: Vec<DefectiveEntry>,
    pub relationships: Vec<RelationshipEntry>,
}

impl DetectionSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Accumulates one cycle's results, keeping at most one entry per
/// executable path in each per-executable set. The first process seen for a
/// path wins.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    unsigned: Vec<ProcessEntry>,
    unsigned_seen: FxHashSet<PathBuf>,
    malicious: Vec<ProcessEntry>,
    malicious_seen: FxHashSet<PathBuf>,
    defective: Vec<DefectiveEntry>,
    defective_seen: FxHashSet<PathBuf>,
    relationships: Vec<RelationshipEntry>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already recorded this cycle.
    pub fn push_unsigned(&mut self, entry: ProcessEntry) -> bool {
        if !self.unsigned_seen.insert(entry.exe_path.clone()) {
            return false;
        }
        self.unsigned.push(entry);
        true
    }

    /// Returns `false` if the path was already recorded this cycle.
    pub fn push_malicious(&mut self, entry: ProcessEntry) -> bool {
        if !self.malicious_seen.insert(entry.exe_path.clone()) {
            return false;
        }
        self.malicious.push(entry);
        true
    }

    /// Returns `false` if the path was already recorded this cycle.
    pub fn push_defective(&mut self, entry: DefectiveEntry) -> bool {
        if !self.defective_seen.insert(entry.exe_path.clone()) {
            return false;
        }
        self.defective.push(entry);
        true
    }

    pub fn push_relationship(&mut self, entry: RelationshipEntry) {
        self.relationships.push(entry);
    }

    pub fn finish(self, generation: Generation) -> DetectionSnapshot {
        DetectionSnapshot {
            generation,
            completed_at: Some(SystemTime::now()),
            unsigned: self.unsigned,
            malicious: self.malicious,
            defective: self.defective,
            relationships: self.relationships,
        }
    }
}
