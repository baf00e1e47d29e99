#![forbid(unsafe_code)]

use crate::cache::DetectionCache;
use crate::domain::{
    DefectiveEntry, Generation, ProcessEntry, RelationshipEntry, SnapshotBuilder,
};
use crate::error::Error;
use crate::heuristics::is_suspicious;
use crate::intel::ThreatIntelStore;
use crate::observation::{ProcessSample, ProcessSource, SampleError};
use crate::signature::{SignatureVerifier, TrustVerdict};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot is visible to readers.
    Published {
        generation: Generation,
        processes: usize,
        unsigned: usize,
        malicious: usize,
        defective: usize,
        relationships: usize,
    },
    /// Another cycle held the run-lock; nothing was done.
    Coalesced,
}

struct CycleState {
    source: Box<dyn ProcessSource>,
    generation: Generation,
}

/// Produces one [`crate::DetectionSnapshot`] per cycle.
pub struct ProcessScanner {
    state: Mutex<CycleState>,
    verifier: Arc<dyn SignatureVerifier>,
    intel: Arc<ThreatIntelStore>,
    cache: DetectionCache,
    wake: Notify,
}

impl ProcessScanner {
    pub fn new(
        source: Box<dyn ProcessSource>,
        verifier: Arc<dyn SignatureVerifier>,
        intel: Arc<ThreatIntelStore>,
        cache: DetectionCache,
    ) -> Self {
        Self {
            state: Mutex::new(CycleState {
                source,
                generation: Generation::INITIAL,
            }),
            verifier,
            intel,
            cache,
            wake: Notify::new(),
        }
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    /// Ask the loop started by [`Self::run_until`] for an extra cycle. Repeated
    /// requests before the loop wakes collapse into one.
    pub fn request_scan(&self) {
        self.wake.notify_one();
    }

    /// Run a full enumerate/classify/publish pass. Blocking; at most one pass
    /// runs at a time and concurrent callers get [`CycleOutcome::Coalesced`].
    #[tracing::instrument(skip_all)]
    pub fn run_once(&self) -> Result<CycleOutcome, Error> {
        let Some(mut state) = self.state.try_lock() else {
            debug!("scan already in progress, coalescing");
            return Ok(CycleOutcome::Coalesced);
        };

        let samples = state.source.processes()?;
        let names: FxHashMap<u32, &str> = samples
            .iter()
            .filter_map(|sample| Some((sample.pid, sample.name.as_deref().ok()?)))
            .collect();

        let mut builder = SnapshotBuilder::new();
        for sample in &samples {
            let Some((name, exe)) = resolve(sample) else {
                continue;
            };
            self.classify_signature(&mut builder, sample.pid, name, exe);

            if self.intel.is_malicious(exe) {
                builder.push_malicious(ProcessEntry {
                    pid: sample.pid,
                    name: name.to_owned(),
                    exe_path: exe.to_path_buf(),
                });
            }

            let Some(ppid) = sample.ppid else {
                continue;
            };
            let Some(parent_name) = names.get(&ppid) else {
                debug!(pid = sample.pid, ppid, "parent not resolvable");
                continue;
            };
            if is_suspicious(parent_name, name) {
                warn!(
                    parent = %parent_name,
                    ppid,
                    child = %name,
                    pid = sample.pid,
                    "suspicious process relationship"
                );
            }
            builder.push_relationship(RelationshipEntry {
                parent_pid: ppid,
                parent_name: (*parent_name).to_owned(),
                child_pid: sample.pid,
                child_name: name.to_owned(),
            });
        }

        let generation = state.generation.next();
        state.generation = generation;
        let snapshot = self.cache.publish(builder.finish(generation));

        let outcome = CycleOutcome::Published {
            generation,
            processes: samples.len(),
            unsigned: snapshot.unsigned.len(),
            malicious: snapshot.malicious.len(),
            defective: snapshot.defective.len(),
            relationships: snapshot.relationships.len(),
        };
        info!(?outcome, "scan cycle published");
        Ok(outcome)
    }

    fn classify_signature(&self, builder: &mut SnapshotBuilder, pid: u32, name: &str, exe: &Path) {
        match self.verifier.verify(exe) {
            Ok(TrustVerdict::Trusted) => trace!(pid, ?exe, "signature valid"),
            Ok(TrustVerdict::NoSignature) => {
                builder.push_unsigned(ProcessEntry {
                    pid,
                    name: name.to_owned(),
                    exe_path: exe.to_path_buf(),
                });
            }
            Ok(TrustVerdict::Defective(defect)) => {
                warn!(pid, ?exe, %defect, "defective signature");
                builder.push_defective(DefectiveEntry {
                    pid,
                    name: name.to_owned(),
                    exe_path: exe.to_path_buf(),
                    defect,
                });
            }
            Err(err) => warn!(pid, ?exe, %err, "signature verification failed"),
        }
    }

    /// Scan immediately, then every `period` until `cancel` fires. Ticks that
    /// arrive while a cycle is running are dropped.
    pub async fn run_until(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => debug!("scan requested"),
            }

            let scanner = Arc::clone(&self);
            let cycle = tokio::task::spawn_blocking(move || scanner.run_once());
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = cycle => result,
            };
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(%err, "scan cycle aborted, keeping previous snapshot"),
                Err(err) => error!(%err, "scan task failed"),
            }
        }

        info!("scanner shutting down");
    }
}

/// Name and executable of a sample that can be classified, or `None` if it
/// has to be skipped.
fn resolve(sample: &ProcessSample) -> Option<(&str, &Path)> {
    let name = match &sample.name {
        Ok(name) => name.as_str(),
        Err(err) => {
            log_unresolved(sample.pid, "name", err);
            return None;
        }
    };
    match &sample.exe {
        Ok(Some(exe)) if !exe.as_os_str().is_empty() => Some((name, exe.as_path())),
        Ok(_) => None,
        Err(err) => {
            log_unresolved(sample.pid, "exe", err);
            None
        }
    }
}

fn log_unresolved(pid: u32, field: &str, err: &SampleError) {
    match err {
        SampleError::Gone | SampleError::Denied => debug!(pid, field, %err, "skipping process"),
        _ => warn!(pid, field, %err, "skipping process"),
    }
}
