//! Binary content tagging for exported files.
//!
//! Exported PKCS #12 and DER files are later consumed by tooling that
//! trusts the filesystem's content tag, so every file written by an export
//! operation is re-opened in append mode and tagged as untagged binary
//! content before the operation returns.
//!
//! Tagging is only meaningful on z/OS; elsewhere the append-open/close
//! sequence runs and the tag step is a no-op, mirroring how platform-only
//! metadata operations degrade on other systems.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// Tags `path` as carrying untagged binary content.
///
/// The file must already exist; its contents are not touched.
pub fn tag_binary(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().append(true).open(path)?;
    set_binary_tag(path, &file)?;
    drop(file);
    Ok(())
}

#[cfg(target_os = "zos")]
fn set_binary_tag(_path: &Path, file: &std::fs::File) -> io::Result<()> {
    zos::fchattr_filetag(file, zos::FT_BINARY)
}

#[cfg(target_os = "zos")]
mod zos {
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::raw::{c_int, c_ushort};

    /// CCSID marking untagged binary content.
    pub(super) const FT_BINARY: c_ushort = 0xFFFF;

    /// `att_filetagchg` bit in the second attribute-flag byte (BPXYATT).
    const ATT_FILETAGCHG: u8 = 0x02;

    /// `attrib_t` from `<sys/stat.h>`, laid out per the BPXYATT mapping.
    ///
    /// Only the file-tag fields are populated; all-zero elsewhere means
    /// "no change" to `__fchattr`, matching how the C callers memset the
    /// struct before setting the tag.
    #[repr(C)]
    struct Attrib {
        id: [u8; 4],
        version: c_ushort,
        res01: [u8; 2],
        set_flags: [u8; 4],
        mode: u32,
        uid: u32,
        gid: u32,
        auditor_audit: u32,
        user_audit: u32,
        size: u64,
        atime: u32,
        mtime: u32,
        audit_id: [u8; 16],
        ctime: u32,
        reftime: u32,
        filetag_ccsid: c_ushort,
        filetag_flags: c_ushort,
        res02: [u8; 8],
    }

    extern "C" {
        fn __fchattr(fd: c_int, attr: *mut Attrib, size: c_int) -> c_int;
    }

    /// Applies a file tag through an already-open descriptor.
    pub(super) fn fchattr_filetag(file: &std::fs::File, ccsid: c_ushort) -> io::Result<()> {
        let mut attr: Attrib = unsafe { std::mem::zeroed() };
        attr.set_flags[1] = ATT_FILETAGCHG;
        attr.filetag_ccsid = ccsid;
        // ft_txtflag stays clear: pure binary, no text conversion.
        attr.filetag_flags = 0;
        let rc = unsafe {
            __fchattr(
                file.as_raw_fd(),
                &mut attr,
                std::mem::size_of::<Attrib>() as c_int,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "zos"))]
fn set_binary_tag(_path: &Path, _file: &std::fs::File) -> io::Result<()> {
    // No file tagging concept outside z/OS.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn tag_existing_file_succeeds() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("export.der");
        std::fs::write(&path, b"\x30\x03\x02\x01\x01").unwrap();

        tag_binary(&path).unwrap();
        // Contents untouched by the append-open/tag/close sequence.
        assert_eq!(std::fs::read(&path).unwrap(), b"\x30\x03\x02\x01\x01");
    }

    #[test]
    fn tag_missing_file_fails() {
        let temp = tempdir().unwrap();
        assert!(tag_binary(&temp.path().join("missing.der")).is_err());
    }
}
