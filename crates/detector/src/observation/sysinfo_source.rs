#![forbid(unsafe_code)]

use crate::error::Error;
use crate::observation::{ProcessSample, ProcessSource, SampleError};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::trace;

/// Cross-platform enumeration through `sysinfo`.
pub struct SysinfoSource {
    system: System,
    refresh_kind: ProcessRefreshKind,
}

impl std::fmt::Debug for SysinfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSource")
            .field("refresh_kind", &self.refresh_kind)
            .finish_non_exhaustive()
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            refresh_kind: ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        }
    }
}

impl ProcessSource for SysinfoSource {
    fn processes(&mut self) -> Result<Vec<ProcessSample>, Error> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, self.refresh_kind);

        let mut samples: Vec<ProcessSample> = self
            .system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                ppid: process.parent().map(|ppid| ppid.as_u32()),
                name: Ok(process.name().to_string_lossy().into_owned()),
                exe: process
                    .exe()
                    .map(|path| Some(path.to_path_buf()))
                    .ok_or(SampleError::Unavailable),
            })
            .collect();

        if samples.is_empty() {
            return Err(Error::ProcessTableUnavailable(
                "no processes reported".to_owned(),
            ));
        }

        // Ascending pid, like /proc.
        samples.sort_unstable_by_key(|sample| sample.pid);
        trace!(count = samples.len(), "process table enumerated");
        Ok(samples)
    }
}
