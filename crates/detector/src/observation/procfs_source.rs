#![forbid(unsafe_code)]

use crate::error::Error;
use crate::observation::{ProcessSample, ProcessSource, SampleError};
use tracing::{debug, trace};

/// `PF_KTHREAD` from `include/linux/sched.h`.
const PF_KTHREAD: u32 = 0x0020_0000;

/// Reads the process table from `/proc`.
#[derive(Debug, Default)]
pub struct ProcfsSource;

impl ProcessSource for ProcfsSource {
    fn processes(&mut self) -> Result<Vec<ProcessSample>, Error> {
        let mut samples = Vec::new();
        for process in procfs::process::all_processes()? {
            let process = match process {
                Ok(p) => p,
                Err(err) => {
                    debug!(?err, "process vanished during enumeration");
                    continue;
                }
            };
            let pid = process.pid as u32;

            let (name, ppid, kernel_thread) = match process.stat() {
                Ok(stat) => (
                    Ok(stat.comm),
                    u32::try_from(stat.ppid).ok().filter(|ppid| *ppid != 0),
                    stat.flags & PF_KTHREAD != 0,
                ),
                Err(err) => (Err(SampleError::from(err)), None, false),
            };

            let exe = if kernel_thread {
                Ok(None)
            } else {
                process.exe().map(Some).map_err(SampleError::from)
            };

            samples.push(ProcessSample {
                pid,
                ppid,
                name,
                exe,
            });
        }

        trace!(count = samples.len(), "process table enumerated");
        Ok(samples)
    }
}
