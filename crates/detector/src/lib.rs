#![deny(unsafe_code)]

pub mod agent;
pub mod cache;
pub mod domain;
pub mod error;
pub mod heuristics;
pub mod intel;
pub mod observation;
pub mod protocol;
pub mod scanner;
pub mod signature;

pub use agent::{Agent, Services};
pub use cache::DetectionCache;
pub use domain::{DefectiveEntry, DetectionSnapshot, Generation, ProcessEntry, RelationshipEntry};
pub use error::Error;
pub use intel::ThreatIntelStore;
pub use observation::{ProcessSample, ProcessSource, SampleError, SysinfoSource, platform_source};
pub use protocol::{Message, MessageCodec, QueryClient, QueryService, RequestKind};
pub use scanner::{CycleOutcome, ProcessScanner};
pub use signature::{
    ImaVerifier, SignatureDefect, SignatureVerifier, TrustVerdict, UnsupportedVerifier,
    VerifyError, WinTrustVerifier, platform_verifier,
};

#[cfg(target_os = "linux")]
pub use observation::ProcfsSource;
