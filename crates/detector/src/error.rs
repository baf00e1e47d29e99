use crate::intel::FeedError;
use crate::protocol::CodecError;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(target_os = "linux")]
    #[error("Failed to read procfs info: {0}")]
    ProcfsReadFailed(#[from] procfs::ProcError),

    #[error("Process table is unavailable: {0}")]
    ProcessTableUnavailable(String),

    #[error("Failed to load threat feed {path:?}: {source}")]
    FeedLoadFailed {
        path: PathBuf,
        #[source]
        source: FeedError,
    },

    #[error("Failed to bind query endpoint on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("Session closed by peer")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
