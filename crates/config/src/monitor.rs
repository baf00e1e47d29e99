use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Interval the scan loop actually runs at.
///
/// `Monitor::interval_seconds` is parsed and reported but does not override
/// this value.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Monitor {
    /// Requested scan period. **Measured in seconds**.
    ///
    /// ## Note
    ///
    /// The agent currently scans every [`DEFAULT_SCAN_INTERVAL`] regardless
    /// of this value and logs a warning when the two disagree.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub interval_seconds: Duration,

    /// Directories considered sensitive. Accepted for compatibility with
    /// existing deployments; no detection consumes them yet.
    pub sensitive_dirs: Vec<PathBuf>,

    /// Address the query endpoint binds to.
    pub listen_addr: IpAddr,

    /// Port of the query endpoint. Either a TOML integer or a string.
    #[serde(alias = "grpc_port")]
    #[serde_as(as = "serde_with::PickFirst<(_, serde_with::DisplayFromStr)>")]
    pub rpc_port: u16,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_SCAN_INTERVAL,
            sensitive_dirs: Vec::new(),
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            rpc_port: 50051,
        }
    }
}

impl Monitor {
    pub fn listen_socket(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.rpc_port)
    }
}
