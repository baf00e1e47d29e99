//! Platform trust verification behind a single `verify` capability.
//!
//! Backends own every platform structure they need; callers only ever see a
//! [`TrustVerdict`] or a [`VerifyError`].

mod ima;
mod wintrust;

pub use ima::ImaVerifier;
pub use wintrust::WinTrustVerifier;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub trait SignatureVerifier: Send + Sync {
    /// Ask the platform whether the executable at `path` carries a valid
    /// signature.
    fn verify(&self, path: &Path) -> Result<TrustVerdict, VerifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustVerdict {
    /// The whole trust chain is valid.
    Trusted,
    /// The file carries no signature at all.
    NoSignature,
    /// A signature is present but the platform rejected it.
    Defective(SignatureDefect),
}

impl TrustVerdict {
    pub fn is_signed(&self) -> bool {
        !matches!(self, Self::NoSignature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureDefect {
    Expired,
    BadDigest,
    NotTrusted,
}

impl fmt::Display for SignatureDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("signature is expired"),
            Self::BadDigest => f.write_str("signature digest is invalid"),
            Self::NotTrusted => f.write_str("signature is not trusted"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("unknown trust provider")]
    UnknownProvider,

    #[error("trust verification failed with code {0:#010x}")]
    Platform(u32),

    #[error("path cannot be passed to the platform API: {0:?}")]
    InvalidPath(std::path::PathBuf),

    #[error("failed to read signature metadata: {0}")]
    Io(#[from] std::io::Error),
}

/// Verifier for platforms without a trust backend. Every query fails, so
/// nothing is ever classified as unsigned.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVerifier;

impl SignatureVerifier for UnsupportedVerifier {
    fn verify(&self, _path: &Path) -> Result<TrustVerdict, VerifyError> {
        Err(VerifyError::UnknownProvider)
    }
}

/// The trust backend for the build target.
pub fn platform_verifier() -> Arc<dyn SignatureVerifier> {
    if cfg!(windows) {
        Arc::new(WinTrustVerifier::new())
    } else if cfg!(target_os = "linux") {
        Arc::new(ImaVerifier::new())
    } else {
        Arc::new(UnsupportedVerifier)
    }
}
