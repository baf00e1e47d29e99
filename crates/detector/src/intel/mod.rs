#![forbid(unsafe_code)]

mod digest;
mod feed;

pub use digest::{DigestCache, FileDigests};
pub use feed::{FeedError, HashRecord};

use crate::error::Error;
use config::{FeedDescriptor, FeedFormat};
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Known-malicious content hashes. Immutable once built, so lookups need no
/// synchronisation.
#[derive(Debug, Default)]
pub struct ThreatIntelStore {
    hashes: FxHashSet<String>,
    digests: Option<DigestCache>,
}

impl ThreatIntelStore {
    /// Load every feed in order. Any feed that cannot be read or parsed
    /// aborts the whole build.
    #[tracing::instrument(skip_all, fields(feeds = feeds.len()))]
    pub fn build(feeds: &[FeedDescriptor], cache_capacity: u64) -> Result<Self, Error> {
        let mut hashes = FxHashSet::default();
        for feed in feeds {
            let loaded = match feed.format {
                FeedFormat::Json => feed::read_json_feed(&feed.path),
                FeedFormat::Csv => feed::read_csv_feed(&feed.path),
            }
            .map_err(|source| Error::FeedLoadFailed {
                path: feed.path.clone(),
                source,
            })?;

            let count = loaded.len();
            hashes.extend(loaded.into_iter().map(|digest| digest.to_ascii_lowercase()));
            info!(path = ?feed.path, format = %feed.format, count, "threat feed loaded");
        }

        info!(total = hashes.len(), "threat intel ready");
        Ok(Self {
            hashes,
            digests: (cache_capacity > 0).then(|| DigestCache::new(cache_capacity)),
        })
    }

    /// Build a store from literal digests, without digest memoisation.
    pub fn from_hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hashes: hashes
                .into_iter()
                .map(|digest| digest.as_ref().to_ascii_lowercase())
                .collect(),
            digests: None,
        }
    }

    /// Hash the file and report whether either digest is known-bad. A file
    /// that cannot be hashed is reported clean.
    pub fn is_malicious(&self, path: &Path) -> bool {
        if self.hashes.is_empty() {
            return false;
        }
        let digests = match &self.digests {
            Some(cache) => cache.digests(path),
            None => FileDigests::compute(path).map(Arc::new),
        };
        let digests = match digests {
            Ok(digests) => digests,
            Err(err) => {
                warn!(?path, %err, "failed to hash file");
                return false;
            }
        };

        let hit = self.contains(&digests.md5) || self.contains(&digests.sha256);
        if hit {
            warn!(?path, md5 = %digests.md5, sha256 = %digests.sha256, "malicious file detected");
        } else {
            debug!(?path, "file is clean");
        }
        hit
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.hashes.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
