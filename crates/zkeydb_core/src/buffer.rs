//! Deterministic release of transient native buffers.

use zkeydb_native::{GskBackend, NativeBuffer};

/// Scoped owner of one buffer returned by a native export call.
///
/// The guard guarantees the buffer is released through the backend exactly
/// once on every exit path: [`into_bytes`](Self::into_bytes) copies the
/// contents and frees the native storage, and dropping the guard without
/// consuming it frees the storage as well. The returned bytes are an
/// independent allocation with no remaining tie to the native storage.
pub struct ExportGuard<'a> {
    backend: &'a dyn GskBackend,
    buffer: Option<NativeBuffer>,
}

impl<'a> ExportGuard<'a> {
    /// Takes ownership of `buffer` on behalf of `backend`.
    #[must_use]
    pub fn new(backend: &'a dyn GskBackend, buffer: NativeBuffer) -> Self {
        Self {
            backend,
            buffer: Some(buffer),
        }
    }

    /// Borrows the buffered bytes without releasing the buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_ref().map_or(&[], NativeBuffer::as_bytes)
    }

    /// Copies the buffered bytes out and releases the native storage.
    #[must_use]
    pub fn into_bytes(mut self) -> Vec<u8> {
        match self.buffer.take() {
            Some(mut buffer) => {
                let bytes = buffer.as_bytes().to_vec();
                self.backend.free_buffer(&mut buffer);
                bytes
            }
            // The buffer is only vacated by into_bytes or Drop.
            None => Vec::new(),
        }
    }
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            self.backend.free_buffer(&mut buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkeydb_native::{GskBackend, InMemoryGsk};

    fn exported(gsk: &InMemoryGsk) -> NativeBuffer {
        gsk.add_ring_record("R", "l", b"CERT", None);
        let mut name = b"R\0".to_vec();
        zkeydb_native::ebcdic::a2e(&mut name);
        let (handle, _) = gsk.open_keyring(&name).unwrap();
        let mut label = b"l\0".to_vec();
        zkeydb_native::ebcdic::a2e(&mut label);
        gsk.export_certificate(handle, &label).unwrap()
    }

    #[test]
    fn into_bytes_copies_then_frees() {
        let gsk = InMemoryGsk::new();
        let guard = ExportGuard::new(&gsk, exported(&gsk));
        assert_eq!(guard.as_bytes(), b"CERT");

        let bytes = guard.into_bytes();
        assert_eq!(bytes, b"CERT");

        let audit = gsk.buffer_audit();
        assert_eq!(audit.allocated, 1);
        assert_eq!(audit.freed, 1);
        assert_eq!(audit.double_frees, 0);
    }

    #[test]
    fn drop_without_consuming_frees() {
        let gsk = InMemoryGsk::new();
        {
            let _guard = ExportGuard::new(&gsk, exported(&gsk));
        }
        let audit = gsk.buffer_audit();
        assert_eq!(audit.freed, 1);
        assert_eq!(audit.double_frees, 0);
        assert_eq!(gsk.outstanding_buffers(), 0);
    }
}
