//! ASCII↔EBCDIC transcoding around native calls.
//!
//! Every string that crosses the native seam passes through this module
//! exactly once: caller strings become owned, NUL-terminated EBCDIC copies
//! ([`TranscodedString`]), and message bytes coming back from the library
//! are recoded for the caller ([`to_caller`]). The underlying byte
//! transform is total over all byte values, so transcoding itself cannot
//! fail.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};
use zkeydb_native::ebcdic;

/// An owned, NUL-terminated EBCDIC copy of a caller string.
///
/// The native calling convention requires its own copy of each string; the
/// buffer is allocated at `len + 1` bytes and recoded in place, leaving the
/// caller's string untouched. Because these buffers routinely carry
/// database and PKCS #12 passwords, the contents are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TranscodedString {
    bytes: Vec<u8>,
}

impl TranscodedString {
    /// Transcodes `s` into a fresh EBCDIC buffer with a trailing NUL.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        // NUL recodes to NUL, so the terminator survives the transform.
        ebcdic::a2e(&mut bytes);
        Self { bytes }
    }

    /// The EBCDIC bytes, including the trailing NUL.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the string in bytes, excluding the trailing NUL.
    ///
    /// Zero after an explicit [`Zeroize::zeroize`], which empties the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len().saturating_sub(1)
    }

    /// Whether the string is empty (terminator only).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TranscodedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // May hold password material; never echo the contents.
        write!(f, "TranscodedString({} bytes)", self.len())
    }
}

/// Recodes native message bytes into a caller string.
///
/// A trailing NUL, if present, is dropped. The EBCDIC→ASCII transform
/// yields ISO-8859-1 bytes, which map one-to-one onto characters, so the
/// conversion is lossless for every input.
#[must_use]
pub fn to_caller(bytes: &[u8]) -> String {
    let mut ascii = bytes.to_vec();
    if ascii.last() == Some(&0) {
        ascii.pop();
    }
    ebcdic::e2a(&mut ascii);
    ascii.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn transcode_appends_terminator() {
        let t = TranscodedString::new("label1");
        assert_eq!(t.len(), 6);
        assert_eq!(t.as_bytes().len(), 7);
        assert_eq!(*t.as_bytes().last().unwrap(), 0);
    }

    #[test]
    fn transcode_produces_ebcdic() {
        let t = TranscodedString::new("A0 ");
        assert_eq!(t.as_bytes(), &[0xC1, 0xF0, 0x40, 0x00]);
    }

    #[test]
    fn empty_string_is_terminator_only() {
        let t = TranscodedString::new("");
        assert!(t.is_empty());
        assert_eq!(t.as_bytes(), &[0x00]);
    }

    #[test]
    fn debug_never_echoes_contents() {
        let t = TranscodedString::new("Passw0rd!");
        let shown = format!("{t:?}");
        assert!(!shown.contains("Passw0rd"));
        assert!(shown.contains("9 bytes"));
    }

    #[test]
    fn zeroize_wipes_contents() {
        let mut t = TranscodedString::new("Passw0rd!");
        t.zeroize();
        assert!(t.is_empty());
        assert!(t.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn to_caller_drops_terminator() {
        let t = TranscodedString::new("hello");
        assert_eq!(to_caller(t.as_bytes()), "hello");
    }

    proptest! {
        // String-level inversion holds exactly for single-byte (ASCII)
        // characters; chars above U+007F encode as multiple UTF-8 bytes,
        // each of which transcodes independently.
        #[test]
        fn transcode_round_trips(s in "[\\x00-\\x7F]{0,64}") {
            let t = TranscodedString::new(&s);
            prop_assert_eq!(to_caller(t.as_bytes()), s);
        }

        #[test]
        fn byte_transform_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut buf = bytes.clone();
            ebcdic::a2e(&mut buf);
            ebcdic::e2a(&mut buf);
            prop_assert_eq!(buf, bytes);
        }
    }
}
