#![forbid(unsafe_code)]

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

const READ_CHUNK: usize = 128 * 1024;

/// Lowercase hex digests of one file's full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub md5: String,
    pub sha256: String,
}

impl FileDigests {
    /// Hash the whole file in a single streaming pass.
    pub fn compute(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut md5 = md5::Context::new();
        let mut sha256 = Sha256::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            md5.consume(&buf[..n]);
            sha256.update(&buf[..n]);
        }

        Ok(Self {
            md5: format!("{:x}", md5.compute()),
            sha256: hex::encode(sha256.finalize()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DigestKey {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
    identity: FileIdentity,
}

/// Inode identity plus status-change time. `ctime` is bumped by the kernel on
/// every content or metadata change and cannot be set from user space, so a
/// rewrite with a restored mtime still produces a new key.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileIdentity {
    dev: u64,
    ino: u64,
    ctime: i64,
    ctime_nsec: i64,
}

#[cfg(unix)]
impl FileIdentity {
    fn of(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            ctime: meta.ctime(),
            ctime_nsec: meta.ctime_nsec(),
        }
    }
}

/// No tamper-proof change marker is available; callers should keep the memo
/// disabled (see [`config::DEFAULT_HASH_CACHE_CAPACITY`]).
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileIdentity;

#[cfg(not(unix))]
impl FileIdentity {
    fn of(_meta: &std::fs::Metadata) -> Self {
        Self
    }
}

/// Memoises digests by path, size, modification time and, on Unix, inode
/// and status-change time.
#[derive(Clone)]
pub struct DigestCache {
    inner: Cache<DigestKey, Arc<FileDigests>>,
}

impl std::fmt::Debug for DigestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl DigestCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
        }
    }

    pub fn digests(&self, path: &Path) -> io::Result<Arc<FileDigests>> {
        let meta = std::fs::metadata(path)?;
        let key = DigestKey {
            path: path.to_path_buf(),
            len: meta.len(),
            modified: meta.modified().ok(),
            identity: FileIdentity::of(&meta),
        };
        if let Some(hit) = self.inner.get(&key) {
            return Ok(hit);
        }
        let digests = Arc::new(FileDigests::compute(path)?);
        self.inner.insert(key, Arc::clone(&digests));
        Ok(digests)
    }
}
