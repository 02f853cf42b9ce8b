//! Transient native buffers.

/// A transient buffer returned by a native export call.
///
/// Stands in for the C `gsk_buffer` (length + data pointer) pair. The
/// backing allocation belongs to the backend that produced it and must be
/// released through [`crate::GskBackend::free_buffer`] exactly once; the
/// session core wraps every buffer in a guard that takes care of this on
/// all exit paths.
#[derive(Debug, Default)]
pub struct NativeBuffer {
    id: u64,
    data: Vec<u8>,
}

impl NativeBuffer {
    /// Creates a buffer. For backend implementors; `id` identifies the
    /// allocation for audit purposes (0 means untracked).
    #[must_use]
    pub fn new(id: u64, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// The allocation id assigned by the backend.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length of the buffered data in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the buffered bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Takes the buffered bytes, leaving the buffer empty.
    ///
    /// For backend implementors: `free_buffer` uses this to drop the
    /// backing storage while keeping the audit id intact.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_holds_data() {
        let buf = NativeBuffer::new(7, vec![1, 2, 3]);
        assert_eq!(buf.id(), 7);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
        assert_eq!(buf.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn take_empties_buffer() {
        let mut buf = NativeBuffer::new(1, vec![9, 9]);
        assert_eq!(buf.take(), vec![9, 9]);
        assert!(buf.is_empty());
        assert_eq!(buf.id(), 1);
    }
}
