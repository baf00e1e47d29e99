use crate::Error;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Digest memo size used when the config does not set one. Only Unix exposes
/// a status-change time that user space cannot forge, so the memo is off
/// elsewhere.
pub const DEFAULT_HASH_CACHE_CAPACITY: u64 = if cfg!(unix) { 4096 } else { 0 };

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThreatIntel {
    /// Feeds of known-malicious hashes, loaded in order at startup. A feed
    /// that cannot be loaded prevents the agent from starting.
    pub feeds: Vec<FeedDescriptor>,

    /// Maximum number of memoised file digests. On Unix entries are keyed by
    /// path, size, modification time, inode and status-change time, so a
    /// rewritten file is always rehashed. Zero disables memoisation; this is
    /// the default on other platforms.
    pub hash_cache_capacity: u64,
}

impl Default for ThreatIntel {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            hash_cache_capacity: DEFAULT_HASH_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub path: PathBuf,
    pub format: FeedFormat,
}

/// On-disk layout of a threat feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum FeedFormat {
    /// Array of `{md5, sha256, type}` objects.
    Json,
    /// One digest per row in the first column, optional `md5`/`sha256` header.
    Csv,
}

impl FromStr for FeedFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(Error::UnsupportedFeedFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
        }
    }
}
