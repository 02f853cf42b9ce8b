//! Native return codes.
//!
//! Every native entry point reports its outcome as an integer return code;
//! zero always means success. The constants below are the codes surfaced by
//! the [`crate::InMemoryGsk`] emulator. The real library has a much larger
//! code space; callers must treat any non-zero value as a failure and resolve
//! its text through [`crate::GskBackend::strerror`] rather than matching on
//! specific codes.

/// Return code from a native call. Zero is success.
pub type ReturnCode = i32;

/// Result type for native calls: `Err` carries the non-zero return code.
pub type NativeResult<T> = Result<T, ReturnCode>;

/// The call completed successfully.
pub const GSK_OK: ReturnCode = 0;

/// The SAF key ring or token could not be opened.
pub const GSK_ERR_KEYRING_OPEN_FAILED: ReturnCode = 2;

/// The key database file does not exist.
pub const GSK_ERR_KEYFILE_NOT_FOUND: ReturnCode = 4;

/// A key database already exists under the requested filename.
pub const GSK_ERR_KEYFILE_EXISTS: ReturnCode = 6;

/// The database password is not correct.
pub const GSK_ERR_BAD_PASSWORD: ReturnCode = 8;

/// No record with the requested label exists.
pub const GSK_ERR_RECORD_NOT_FOUND: ReturnCode = 10;

/// A record with the requested label already exists.
pub const GSK_ERR_DUPLICATE_LABEL: ReturnCode = 12;

/// The import data stream is not a valid PKCS #12 container.
pub const GSK_ERR_BAD_IMPORT_DATA: ReturnCode = 14;

/// The supplied handle does not refer to an open database or ring.
pub const GSK_ERR_BAD_HANDLE: ReturnCode = 16;

/// The record exists but carries no private key material.
pub const GSK_ERR_NO_PRIVATE_KEY: ReturnCode = 18;

/// Canonical message text for a return code.
///
/// Never returns an empty string; unknown codes get a generic description
/// that still names the code.
#[must_use]
pub fn message_for(rc: ReturnCode) -> String {
    match rc {
        GSK_OK => "No error".to_string(),
        GSK_ERR_KEYRING_OPEN_FAILED => "Unable to open SAF key ring or token".to_string(),
        GSK_ERR_KEYFILE_NOT_FOUND => "Key database file not found".to_string(),
        GSK_ERR_KEYFILE_EXISTS => "Key database file already exists".to_string(),
        GSK_ERR_BAD_PASSWORD => "Key database password is not correct".to_string(),
        GSK_ERR_RECORD_NOT_FOUND => "Record not found in key database".to_string(),
        GSK_ERR_DUPLICATE_LABEL => "Record label already exists".to_string(),
        GSK_ERR_BAD_IMPORT_DATA => "Import data stream is not valid".to_string(),
        GSK_ERR_BAD_HANDLE => "Handle is not valid".to_string(),
        GSK_ERR_NO_PRIVATE_KEY => "Record does not contain a private key".to_string(),
        other => format!("Unknown error code {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(GSK_OK, 0);
        assert_eq!(message_for(GSK_OK), "No error");
    }

    #[test]
    fn known_codes_have_text() {
        for rc in [
            GSK_ERR_KEYRING_OPEN_FAILED,
            GSK_ERR_KEYFILE_NOT_FOUND,
            GSK_ERR_KEYFILE_EXISTS,
            GSK_ERR_BAD_PASSWORD,
            GSK_ERR_RECORD_NOT_FOUND,
            GSK_ERR_DUPLICATE_LABEL,
            GSK_ERR_BAD_IMPORT_DATA,
            GSK_ERR_BAD_HANDLE,
            GSK_ERR_NO_PRIVATE_KEY,
        ] {
            assert!(!message_for(rc).is_empty());
            assert!(!message_for(rc).contains("Unknown"));
        }
    }

    #[test]
    fn unknown_code_is_non_empty() {
        let msg = message_for(9999);
        assert!(msg.contains("9999"));
    }
}
