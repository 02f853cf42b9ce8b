//! Raw bindings to the GSKit CMS library (z/OS).
//!
//! Compiled only with the `gskit` feature. Linking requires the GSKCMS64
//! and GSKSSL64 side-decks from `/usr/lpp/gskssl/lib`; the enum constants
//! below mirror `<gskcms.h>` on the target system.

#![allow(non_camel_case_types)] // C type names kept as-is for the raw decls

use crate::backend::{DatabaseType, GskBackend, RawHandle, TextMode};
use crate::buffer::NativeBuffer;
use crate::rc::{NativeResult, ReturnCode};
use std::os::raw::{c_char, c_int, c_long, c_uint, c_void};

/// `gskdb_database_type` value for a key database.
const GSKDB_DBTYPE_KEY: c_int = 1;
/// `gskdb_export_format` value for a binary DER stream.
const GSKDB_EXPORT_DER_BINARY: c_int = 1;
/// `gskdb_export_format` value for a binary PKCS #12 V3 container.
const GSKDB_EXPORT_PKCS12V3_BINARY: c_int = 5;
/// `x509_algorithm_type` value for pbeWithSha1And3DesCbc.
const X509_ALG_PBE_SHA1_3DES_CBC: c_int = 8;

/// `__ae_thread_swapmode` mode values from `<_Nascii.h>`.
const AE_ASCII_MODE: c_int = 1;
const AE_EBCDIC_MODE: c_int = 2;

#[repr(C)]
struct gsk_buffer {
    length: c_uint,
    data: *mut c_void,
}

type gsk_handle = *mut c_void;

extern "C" {
    fn gsk_open_keyring(
        ring_name: *const c_char,
        handle: *mut gsk_handle,
        num_records: *mut c_int,
    ) -> c_int;
    fn gsk_create_database(
        filename: *const c_char,
        password: *const c_char,
        db_type: c_int,
        record_length: c_int,
        expiration: c_long,
        handle: *mut gsk_handle,
    ) -> c_int;
    fn gsk_open_database(
        filename: *const c_char,
        password: *const c_char,
        update_mode: c_int,
        handle: *mut gsk_handle,
        db_type: *mut c_int,
        num_records: *mut c_int,
    ) -> c_int;
    fn gsk_import_key(
        handle: gsk_handle,
        label: *const c_char,
        password: *const c_char,
        stream: *mut gsk_buffer,
    ) -> c_int;
    fn gsk_export_key(
        handle: gsk_handle,
        label: *const c_char,
        format: c_int,
        algorithm: c_int,
        password: *const c_char,
        stream: *mut gsk_buffer,
    ) -> c_int;
    fn gsk_export_certificate(
        handle: gsk_handle,
        label: *const c_char,
        format: c_int,
        stream: *mut gsk_buffer,
    ) -> c_int;
    fn gsk_close_database(handle: *mut gsk_handle) -> c_int;
    fn gsk_free_buffer(stream: *mut gsk_buffer);
    fn gsk_strerror(rc: c_int) -> *const c_char;
    fn __ae_thread_swapmode(mode: c_int) -> c_int;
}

/// The real GSKit CMS backend.
///
/// Stateless: handles are the library's own opaque pointers, carried as
/// [`RawHandle`] values. Database create/open calls run with the thread
/// swapped to EBCDIC mode for the duration of the native call, as the
/// library requires.
#[derive(Debug, Default)]
pub struct GskKit;

impl GskKit {
    /// Creates the backend. The underlying library needs no per-process
    /// initialization beyond being linked in.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn check(rc: c_int) -> NativeResult<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(rc)
    }
}

/// Copies a native buffer's bytes and releases the native allocation.
///
/// The seam's copy semantics: the returned [`NativeBuffer`] owns an
/// independent Rust allocation, so `free_buffer` on this backend has no
/// native storage left to release.
unsafe fn adopt(stream: &mut gsk_buffer) -> NativeBuffer {
    let bytes = if stream.data.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(stream.data.cast::<u8>(), stream.length as usize).to_vec()
    };
    gsk_free_buffer(stream);
    NativeBuffer::new(0, bytes)
}

/// Runs `f` with the thread swapped to EBCDIC mode, restoring the prior
/// mode afterwards.
fn in_ebcdic_mode<T>(f: impl FnOnce() -> T) -> T {
    let prior = unsafe { __ae_thread_swapmode(AE_EBCDIC_MODE) };
    let out = f();
    unsafe { __ae_thread_swapmode(prior) };
    out
}

impl GskBackend for GskKit {
    fn open_keyring(&self, ring_name: &[u8]) -> NativeResult<(RawHandle, i32)> {
        let mut handle: gsk_handle = std::ptr::null_mut();
        let mut num_records: c_int = 0;
        let rc = in_ebcdic_mode(|| unsafe {
            gsk_open_keyring(
                ring_name.as_ptr().cast(),
                &mut handle,
                &mut num_records,
            )
        });
        check(rc)?;
        Ok((RawHandle::new(handle as u64), num_records))
    }

    fn create_database(
        &self,
        filename: &[u8],
        password: &[u8],
        record_length: i32,
        expiration: i64,
    ) -> NativeResult<RawHandle> {
        let mut handle: gsk_handle = std::ptr::null_mut();
        let rc = in_ebcdic_mode(|| unsafe {
            gsk_create_database(
                filename.as_ptr().cast(),
                password.as_ptr().cast(),
                GSKDB_DBTYPE_KEY,
                record_length,
                expiration as c_long,
                &mut handle,
            )
        });
        check(rc)?;
        Ok(RawHandle::new(handle as u64))
    }

    fn open_database(
        &self,
        filename: &[u8],
        password: &[u8],
        update: bool,
    ) -> NativeResult<(RawHandle, DatabaseType, i32)> {
        let mut handle: gsk_handle = std::ptr::null_mut();
        let mut db_type: c_int = 0;
        let mut num_records: c_int = 0;
        let rc = in_ebcdic_mode(|| unsafe {
            gsk_open_database(
                filename.as_ptr().cast(),
                password.as_ptr().cast(),
                c_int::from(update),
                &mut handle,
                &mut db_type,
                &mut num_records,
            )
        });
        check(rc)?;
        let db_type = if db_type == GSKDB_DBTYPE_KEY {
            DatabaseType::Key
        } else {
            DatabaseType::Request
        };
        Ok((RawHandle::new(handle as u64), db_type, num_records))
    }

    fn import_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
        data: &[u8],
    ) -> NativeResult<()> {
        let caller_data: *mut c_void = data.as_ptr().cast_mut().cast();
        let mut stream = gsk_buffer {
            length: data.len() as c_uint,
            data: caller_data,
        };
        let rc = unsafe {
            gsk_import_key(
                handle.raw() as gsk_handle,
                label.as_ptr().cast(),
                password.as_ptr().cast(),
                &mut stream,
            )
        };
        // The library may replace the stream with its own allocation;
        // release it once it no longer points at the caller's data.
        if stream.data != caller_data {
            unsafe { gsk_free_buffer(&mut stream) };
        }
        check(rc)
    }

    fn export_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
    ) -> NativeResult<NativeBuffer> {
        let mut stream = gsk_buffer {
            length: 0,
            data: std::ptr::null_mut(),
        };
        let rc = unsafe {
            gsk_export_key(
                handle.raw() as gsk_handle,
                label.as_ptr().cast(),
                GSKDB_EXPORT_PKCS12V3_BINARY,
                X509_ALG_PBE_SHA1_3DES_CBC,
                password.as_ptr().cast(),
                &mut stream,
            )
        };
        // The library may leave a partial allocation behind on failure;
        // release it either way.
        let buffer = unsafe { adopt(&mut stream) };
        check(rc)?;
        Ok(buffer)
    }

    fn export_certificate(&self, handle: RawHandle, label: &[u8]) -> NativeResult<NativeBuffer> {
        let mut stream = gsk_buffer {
            length: 0,
            data: std::ptr::null_mut(),
        };
        let rc = unsafe {
            gsk_export_certificate(
                handle.raw() as gsk_handle,
                label.as_ptr().cast(),
                GSKDB_EXPORT_DER_BINARY,
                &mut stream,
            )
        };
        let buffer = unsafe { adopt(&mut stream) };
        check(rc)?;
        Ok(buffer)
    }

    fn close_database(&self, handle: RawHandle) -> NativeResult<()> {
        let mut raw = handle.raw() as gsk_handle;
        check(unsafe { gsk_close_database(&mut raw) })
    }

    fn strerror(&self, rc: ReturnCode) -> Vec<u8> {
        let ptr = unsafe { gsk_strerror(rc) };
        if ptr.is_null() {
            return format!("Unknown error code {rc}").into_bytes();
        }
        unsafe { std::ffi::CStr::from_ptr(ptr) }.to_bytes().to_vec()
    }

    fn swap_text_mode(&self, mode: TextMode) -> TextMode {
        let native = match mode {
            TextMode::Ascii => AE_ASCII_MODE,
            TextMode::Ebcdic => AE_EBCDIC_MODE,
        };
        let prior = unsafe { __ae_thread_swapmode(native) };
        if prior == AE_EBCDIC_MODE {
            TextMode::Ebcdic
        } else {
            TextMode::Ascii
        }
    }

    fn free_buffer(&self, buffer: &mut NativeBuffer) {
        // Native storage was already released when the buffer was adopted;
        // only the Rust-side copy remains.
        drop(buffer.take());
    }
}
