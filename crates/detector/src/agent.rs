#![forbid(unsafe_code)]

use crate::cache::DetectionCache;
use crate::error::Error;
use crate::intel::ThreatIntelStore;
use crate::observation::{ProcessSource, platform_source};
use crate::protocol::QueryService;
use crate::scanner::ProcessScanner;
use crate::signature::{SignatureVerifier, platform_verifier};
use config::{Config, DEFAULT_SCAN_INTERVAL};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Platform integrations the agent is built from.
pub struct Services {
    pub source: Box<dyn ProcessSource>,
    pub verifier: Arc<dyn SignatureVerifier>,
}

impl Services {
    pub fn platform() -> Self {
        Self {
            source: platform_source(),
            verifier: platform_verifier(),
        }
    }
}

/// Wires the scanner, threat intel and query service together.
pub struct Agent {
    config: Config,
    intel: Arc<ThreatIntelStore>,
    scanner: Arc<ProcessScanner>,
    service: QueryService,
    scan_interval: Duration,
}

impl Agent {
    /// Load threat feeds and build an agent for the current platform.
    pub fn build(config: Config) -> Result<Self, Error> {
        Self::with_services(config, Services::platform())
    }

    pub fn with_services(config: Config, services: Services) -> Result<Self, Error> {
        let intel = Arc::new(ThreatIntelStore::build(
            &config.threat_intel.feeds,
            config.threat_intel.hash_cache_capacity,
        )?);

        if config.monitor.interval_seconds != DEFAULT_SCAN_INTERVAL {
            warn!(
                configured = ?config.monitor.interval_seconds,
                effective = ?DEFAULT_SCAN_INTERVAL,
                "monitor.interval_seconds is not honored"
            );
        }
        if !config.monitor.sensitive_dirs.is_empty() {
            debug!(dirs = ?config.monitor.sensitive_dirs, "sensitive directories configured");
        }

        let cache = DetectionCache::new();
        let scanner = Arc::new(ProcessScanner::new(
            services.source,
            services.verifier,
            Arc::clone(&intel),
            cache.clone(),
        ));

        Ok(Self {
            config,
            intel,
            scanner,
            service: QueryService::new(cache),
            scan_interval: DEFAULT_SCAN_INTERVAL,
        })
    }

    /// Override the scan period, which otherwise is [`DEFAULT_SCAN_INTERVAL`].
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &DetectionCache {
        self.scanner.cache()
    }

    pub fn scanner(&self) -> &Arc<ProcessScanner> {
        &self.scanner
    }

    /// Bind the configured query endpoint.
    pub async fn bind(&self) -> Result<TcpListener, Error> {
        let addr = self.config.monitor.listen_socket();
        bind(addr).await
    }

    /// Scan and serve queries until `cancel` fires.
    pub async fn run(&self, listener: TcpListener, cancel: CancellationToken) -> Result<(), Error> {
        let cancel = cancel.child_token();
        let scanner = tokio::spawn(
            Arc::clone(&self.scanner).run_until(self.scan_interval, cancel.clone()),
        );
        let served = self.service.serve(listener, cancel.clone()).await;

        // Stop the scanner even if serving failed.
        cancel.cancel();
        if let Err(err) = scanner.await {
            warn!(%err, "scanner task failed");
        }
        info!("agent stopped");
        served
    }

    pub fn request_scan(&self) {
        self.scanner.request_scan();
    }

    pub fn dump_status(&self) {
        let snapshot = self.cache().current();
        info!(?self.config, "current config");
        info!(
            generation = %snapshot.generation,
            completed_at = ?snapshot.completed_at,
            unsigned = snapshot.unsigned.len(),
            malicious = snapshot.malicious.len(),
            defective = snapshot.defective.len(),
            relationships = snapshot.relationships.len(),
            known_hashes = self.intel.len(),
            "detection summary"
        );
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::BindFailed { addr, source })?;
    info!(%addr, "query endpoint bound");
    Ok(listener)
}
