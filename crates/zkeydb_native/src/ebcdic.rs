//! ASCII↔EBCDIC byte tables.
//!
//! The native calling convention expects strings in the platform character
//! set (IBM-1047 EBCDIC), while callers work in ASCII/ISO-8859-1. These are
//! the byte-wise transforms the z/OS runtime provides as `__a2e_l` and
//! `__e2a_l`: total over all 256 byte values, and exact inverses of each
//! other.
//!
//! The tables use the z/OS pairing of ISO-8859-1 with IBM-1047 (LF 0x0A maps
//! to EBCDIC NL 0x15), matching what the runtime conversion services do.

/// ISO-8859-1 → IBM-1047, indexed by the ASCII byte value.
pub const A2E: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x37, 0x2D, 0x2E, 0x2F, 0x16, 0x05, 0x15, 0x0B,
    0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x3C, 0x3D, 0x32, 0x26,
    0x18, 0x19, 0x3F, 0x27, 0x1C, 0x1D, 0x1E, 0x1F, 0x40, 0x5A, 0x7F, 0x7B,
    0x5B, 0x6C, 0x50, 0x7D, 0x4D, 0x5D, 0x5C, 0x4E, 0x6B, 0x60, 0x4B, 0x61,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0x7A, 0x5E,
    0x4C, 0x7E, 0x6E, 0x6F, 0x7C, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
    0xC8, 0xC9, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xAD, 0xE0, 0xBD, 0x5F, 0x6D,
    0x79, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x91, 0x92,
    0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6,
    0xA7, 0xA8, 0xA9, 0xC0, 0x4F, 0xD0, 0xA1, 0x07, 0x20, 0x21, 0x22, 0x23,
    0x24, 0x25, 0x06, 0x17, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x09, 0x0A, 0x1B,
    0x30, 0x31, 0x1A, 0x33, 0x34, 0x35, 0x36, 0x08, 0x38, 0x39, 0x3A, 0x3B,
    0x04, 0x14, 0x3E, 0xFF, 0x41, 0xAA, 0x4A, 0xB1, 0x9F, 0xB2, 0x6A, 0xB5,
    0xBB, 0xB4, 0x9A, 0x8A, 0xB0, 0xCA, 0xAF, 0xBC, 0x90, 0x8F, 0xEA, 0xFA,
    0xBE, 0xA0, 0xB6, 0xB3, 0x9D, 0xDA, 0x9B, 0x8B, 0xB7, 0xB8, 0xB9, 0xAB,
    0x64, 0x65, 0x62, 0x66, 0x63, 0x67, 0x9E, 0x68, 0x74, 0x71, 0x72, 0x73,
    0x78, 0x75, 0x76, 0x77, 0xAC, 0x69, 0xED, 0xEE, 0xEB, 0xEF, 0xEC, 0xBF,
    0x80, 0xFD, 0xFE, 0xFB, 0xFC, 0xBA, 0xAE, 0x59, 0x44, 0x45, 0x42, 0x46,
    0x43, 0x47, 0x9C, 0x48, 0x54, 0x51, 0x52, 0x53, 0x58, 0x55, 0x56, 0x57,
    0x8C, 0x49, 0xCD, 0xCE, 0xCB, 0xCF, 0xCC, 0xE1, 0x70, 0xDD, 0xDE, 0xDB,
    0xDC, 0x8D, 0x8E, 0xDF,
];

/// IBM-1047 → ISO-8859-1, derived as the exact inverse of [`A2E`].
pub const E2A: [u8; 256] = invert(&A2E);

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut out = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        out[table[i] as usize] = i as u8;
        i += 1;
    }
    out
}

/// Recodes a byte slice from ASCII to EBCDIC in place.
pub fn a2e(bytes: &mut [u8]) {
    for b in bytes {
        *b = A2E[*b as usize];
    }
}

/// Recodes a byte slice from EBCDIC to ASCII in place.
pub fn e2a(bytes: &mut [u8]) {
    for b in bytes {
        *b = E2A[*b as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_characters() {
        assert_eq!(A2E[b'A' as usize], 0xC1);
        assert_eq!(A2E[b'a' as usize], 0x81);
        assert_eq!(A2E[b'0' as usize], 0xF0);
        assert_eq!(A2E[b' ' as usize], 0x40);
        assert_eq!(A2E[b'/' as usize], 0x61);
        assert_eq!(A2E[0], 0x00);
    }

    #[test]
    fn tables_are_inverses() {
        for i in 0..=255u8 {
            assert_eq!(E2A[A2E[i as usize] as usize], i);
            assert_eq!(A2E[E2A[i as usize] as usize], i);
        }
    }

    #[test]
    fn in_place_round_trip() {
        let original = b"/tmp/test.kdb".to_vec();
        let mut buf = original.clone();
        a2e(&mut buf);
        assert_ne!(buf, original);
        e2a(&mut buf);
        assert_eq!(buf, original);
    }
}
