//! Windows backend: Authenticode verification through `WinVerifyTrust`.

use crate::signature::{SignatureDefect, SignatureVerifier, TrustVerdict, VerifyError};
use std::path::Path;

const TRUST_E_NOSIGNATURE: u32 = 0x800B_0100;
const TRUST_E_EXPIRED: u32 = 0x800B_0101;
const TRUST_E_PROVIDER_UNKNOWN: u32 = 0x800B_0001;
const TRUST_E_BAD_DIGEST: u32 = 0x8009_6010;
const TRUST_E_SUBJECT_NOT_TRUSTED: u32 = 0x800B_0004;

#[derive(Debug, Default, Clone, Copy)]
pub struct WinTrustVerifier;

impl WinTrustVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for WinTrustVerifier {
    fn verify(&self, path: &Path) -> Result<TrustVerdict, VerifyError> {
        let status = imp::win_verify_trust(path)?;
        verdict_from_status(status)
    }
}

/// Translate a `WinVerifyTrust` return code.
pub(crate) fn verdict_from_status(status: u32) -> Result<TrustVerdict, VerifyError> {
    match status {
        0 => Ok(TrustVerdict::Trusted),
        TRUST_E_NOSIGNATURE => Ok(TrustVerdict::NoSignature),
        TRUST_E_EXPIRED => Ok(TrustVerdict::Defective(SignatureDefect::Expired)),
        TRUST_E_BAD_DIGEST => Ok(TrustVerdict::Defective(SignatureDefect::BadDigest)),
        TRUST_E_SUBJECT_NOT_TRUSTED => Ok(TrustVerdict::Defective(SignatureDefect::NotTrusted)),
        TRUST_E_PROVIDER_UNKNOWN => Err(VerifyError::UnknownProvider),
        other => Err(VerifyError::Platform(other)),
    }
}

#[cfg(windows)]
mod imp {
    use crate::signature::VerifyError;
    use std::ffi::c_void;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Security::WinTrust::{
        WINTRUST_ACTION_GENERIC_VERIFY_V2, WINTRUST_DATA, WINTRUST_DATA_0, WINTRUST_FILE_INFO,
        WTD_CHOICE_FILE, WTD_REVOKE_NONE, WTD_STATEACTION_CLOSE, WTD_STATEACTION_VERIFY,
        WTD_UI_NONE, WinVerifyTrust,
    };
    use windows::core::PCWSTR;

    pub(super) fn win_verify_trust(path: &Path) -> Result<u32, VerifyError> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        if wide[..wide.len() - 1].contains(&0) {
            return Err(VerifyError::InvalidPath(path.to_path_buf()));
        }

        let mut file_info = WINTRUST_FILE_INFO {
            cbStruct: std::mem::size_of::<WINTRUST_FILE_INFO>() as u32,
            pcwszFilePath: PCWSTR(wide.as_ptr()),
            ..Default::default()
        };
        let mut data = WINTRUST_DATA {
            cbStruct: std::mem::size_of::<WINTRUST_DATA>() as u32,
            dwUIChoice: WTD_UI_NONE,
            fdwRevocationChecks: WTD_REVOKE_NONE,
            dwUnionChoice: WTD_CHOICE_FILE,
            Anonymous: WINTRUST_DATA_0 {
                pFile: &mut file_info,
            },
            dwStateAction: WTD_STATEACTION_VERIFY,
            ..Default::default()
        };
        let mut action = WINTRUST_ACTION_GENERIC_VERIFY_V2;

        #[allow(unsafe_code)]
        let status = unsafe {
            WinVerifyTrust(
                HWND::default(),
                &mut action,
                (&mut data as *mut WINTRUST_DATA).cast::<c_void>(),
            )
        };

        // Release the provider state allocated by the verify call.
        data.dwStateAction = WTD_STATEACTION_CLOSE;
        #[allow(unsafe_code)]
        unsafe {
            WinVerifyTrust(
                HWND::default(),
                &mut action,
                (&mut data as *mut WINTRUST_DATA).cast::<c_void>(),
            );
        }

        Ok(status as u32)
    }
}

#[cfg(not(windows))]
mod imp {
    use crate::signature::VerifyError;
    use std::path::Path;

    pub(super) fn win_verify_trust(_path: &Path) -> Result<u32, VerifyError> {
        Err(VerifyError::UnknownProvider)
    }
}
