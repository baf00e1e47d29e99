#![forbid(unsafe_code)]

#[cfg(target_os = "linux")]
mod procfs_source;
mod sysinfo_source;

#[cfg(target_os = "linux")]
pub use procfs_source::ProcfsSource;
pub use sysinfo_source::SysinfoSource;

use crate::error::Error;
use std::path::PathBuf;

pub trait ProcessSource: Send {
    /// Enumerate every live process. An `Err` means the process table itself
    /// could not be read; per-process failures are reported inside each
    /// sample.
    fn processes(&mut self) -> Result<Vec<ProcessSample>, Error>;
}

/// One process as observed during a single enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSample {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub name: Result<String, SampleError>,
    /// `Ok(None)` for processes without an executable image, such as kernel
    /// threads.
    pub exe: Result<Option<PathBuf>, SampleError>,
}

impl ProcessSample {
    pub fn new(pid: u32, name: impl Into<String>, exe: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            ppid: None,
            name: Ok(name.into()),
            exe: Ok(Some(exe.into())),
        }
    }

    pub fn with_parent(mut self, ppid: u32) -> Self {
        self.ppid = Some(ppid);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("process exited")]
    Gone,

    #[error("access denied")]
    Denied,

    #[error("not reported by the platform")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}

#[cfg(target_os = "linux")]
impl From<procfs::ProcError> for SampleError {
    fn from(err: procfs::ProcError) -> Self {
        match err {
            procfs::ProcError::NotFound(_) => Self::Gone,
            procfs::ProcError::PermissionDenied(_) => Self::Denied,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The enumeration backend for the build target.
pub fn platform_source() -> Box<dyn ProcessSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcfsSource::default())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(SysinfoSource::new())
    }
}
