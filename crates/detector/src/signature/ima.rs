//! Linux backend: reads the IMA `security.ima` extended attribute.
//!
//! With IMA appraisal enforced the kernel refuses to execute files whose
//! signature does not verify, so the presence of a signature record is the
//! platform's own verdict. Without appraise rules the record is just an
//! attribute anyone with write access could have set, and is not trusted.
//! Hash-only records carry no signature.

use crate::signature::{SignatureVerifier, TrustVerdict, VerifyError};
use std::path::Path;
use tracing::{debug, warn};

const IMA_POLICY_PATH: &str = "/sys/kernel/security/ima/policy";

const IMA_XATTR_DIGEST: u8 = 0x01;
const EVM_IMA_XATTR_DIGSIG: u8 = 0x03;
const IMA_XATTR_DIGEST_NG: u8 = 0x04;
const EVM_XATTR_PORTABLE_DIGSIG: u8 = 0x05;
const IMA_VERITY_DIGSIG: u8 = 0x06;

/// Verifier backed by IMA signature records.
///
/// A signature record only yields [`TrustVerdict::Trusted`] when the active
/// IMA policy contains `appraise` rules; otherwise it is reported as
/// [`VerifyError::UnknownProvider`]. Missing or hash-only records are
/// [`TrustVerdict::NoSignature`] either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImaVerifier {
    appraisal_enforced: bool,
}

impl ImaVerifier {
    /// Probe the kernel policy once. An unreadable policy (no securityfs,
    /// not root, `CONFIG_IMA_READ_POLICY` off) counts as not enforced.
    pub fn new() -> Self {
        let appraisal_enforced = match std::fs::read_to_string(IMA_POLICY_PATH) {
            Ok(policy) => policy_appraises(&policy),
            Err(err) => {
                debug!(%err, "IMA policy unreadable");
                false
            }
        };
        if !appraisal_enforced {
            warn!("IMA appraisal not enforced; signature records will not be trusted");
        }
        Self { appraisal_enforced }
    }

    pub fn with_appraisal(appraisal_enforced: bool) -> Self {
        Self { appraisal_enforced }
    }

    pub fn appraisal_enforced(&self) -> bool {
        self.appraisal_enforced
    }
}

impl SignatureVerifier for ImaVerifier {
    fn verify(&self, path: &Path) -> Result<TrustVerdict, VerifyError> {
        let record = imp::read_ima_xattr(path)?;
        resolve(record.as_deref(), self.appraisal_enforced)
    }
}

fn resolve(record: Option<&[u8]>, appraisal_enforced: bool) -> Result<TrustVerdict, VerifyError> {
    let verdict = match record {
        None => TrustVerdict::NoSignature,
        Some(value) => classify(value)?,
    };
    match verdict {
        TrustVerdict::Trusted if !appraisal_enforced => Err(VerifyError::UnknownProvider),
        verdict => Ok(verdict),
    }
}

/// Whether any policy rule has the `appraise` action.
pub(crate) fn policy_appraises(policy: &str) -> bool {
    policy
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|action| action == "appraise")
}

/// Map the first byte of a `security.ima` value to a verdict.
pub(crate) fn classify(value: &[u8]) -> Result<TrustVerdict, VerifyError> {
    match value.first().copied() {
        Some(EVM_IMA_XATTR_DIGSIG | EVM_XATTR_PORTABLE_DIGSIG | IMA_VERITY_DIGSIG) => {
            Ok(TrustVerdict::Trusted)
        }
        Some(IMA_XATTR_DIGEST | IMA_XATTR_DIGEST_NG) => Ok(TrustVerdict::NoSignature),
        _ => Err(VerifyError::UnknownProvider),
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use crate::signature::VerifyError;
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    const IMA_XATTR_NAME: &std::ffi::CStr = c"security.ima";

    /// Read the raw attribute, `None` when the file has none or the
    /// filesystem does not support extended attributes.
    pub(super) fn read_ima_xattr(path: &Path) -> Result<Option<Vec<u8>>, VerifyError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| VerifyError::InvalidPath(path.to_path_buf()))?;

        // Probe the size first; signatures vary with key type.
        #[allow(unsafe_code)]
        let size = unsafe {
            libc::getxattr(
                c_path.as_ptr(),
                IMA_XATTR_NAME.as_ptr(),
                std::ptr::null_mut(),
                0,
            )
        };
        if size < 0 {
            return absent_or_error(io::Error::last_os_error());
        }

        let mut buf = vec![0u8; size as usize];
        #[allow(unsafe_code)]
        let read = unsafe {
            libc::getxattr(
                c_path.as_ptr(),
                IMA_XATTR_NAME.as_ptr(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        };
        if read < 0 {
            return absent_or_error(io::Error::last_os_error());
        }
        buf.truncate(read as usize);
        Ok(Some(buf))
    }

    fn absent_or_error(err: io::Error) -> Result<Option<Vec<u8>>, VerifyError> {
        match err.raw_os_error() {
            Some(libc::ENODATA) | Some(libc::ENOTSUP) => Ok(None),
            _ => Err(VerifyError::Io(err)),
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use crate::signature::VerifyError;
    use std::path::Path;

    pub(super) fn read_ima_xattr(_path: &Path) -> Result<Option<Vec<u8>>, VerifyError> {
        Err(VerifyError::UnknownProvider)
    }
}
