//! Rendering of raw binary ledger fields as grouped textual identifiers

use crate::{Result, RuntimeError};
use tracing::warn;
use uuid::Uuid;

/// Number of leading bytes an identifier is built from
pub const IDENTIFIER_BYTES: usize = 16;

/// Identifier produced for an all-zero prefix
pub const NIL_IDENTIFIER: &str = "00000000-0000-0000-0000-000000000000";

const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Render the first 16 bytes of `bytes` as an 8-4-4-4-12 lowercase hex identifier.
///
/// An all-zero prefix yields [`NIL_IDENTIFIER`]. Such a value may stand for
/// uninitialized data, so it is logged but not rejected.
pub fn bytes_to_identifier(bytes: &[u8]) -> Result<String> {
    if bytes.len() < IDENTIFIER_BYTES {
        return Err(RuntimeError::ArrayTooShort(bytes.len()));
    }

    let mut prefix = [0u8; IDENTIFIER_BYTES];
    prefix.copy_from_slice(&bytes[..IDENTIFIER_BYTES]);

    if prefix.iter().all(|b| *b == 0) {
        warn!("All-zero identifier decoded, returning nil identifier");
        return Ok(NIL_IDENTIFIER.to_string());
    }

    let identifier = Uuid::from_bytes(prefix).hyphenated().to_string();
    if !is_grouped_identifier(&identifier) {
        return Err(RuntimeError::InvalidIdentifierFormat(identifier));
    }

    Ok(identifier)
}

/// Whether `s` has the exact 8-4-4-4-12 lowercase hex shape
pub fn is_grouped_identifier(s: &str) -> bool {
    let mut groups = s.split('-');
    for expected in GROUPS {
        match groups.next() {
            Some(group)
                if group.len() == expected
                    && group
                        .bytes()
                        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) => {}
            _ => return false,
        }
    }
    groups.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_input_rejected() {
        let err = bytes_to_identifier(&[1u8; 15]).unwrap_err();
        assert!(matches!(err, RuntimeError::ArrayTooShort(15)));

        assert!(matches!(
            bytes_to_identifier(&[]),
            Err(RuntimeError::ArrayTooShort(0))
        ));
    }

    #[test]
    fn test_zero_prefix_is_nil() {
        let mut bytes = [0u8; 32];
        bytes[20] = 0xff;

        assert_eq!(bytes_to_identifier(&bytes).unwrap(), NIL_IDENTIFIER);
    }

    #[test]
    fn test_known_rendering() {
        let bytes: Vec<u8> = (0u8..32).collect();

        assert_eq!(
            bytes_to_identifier(&bytes).unwrap(),
            "00010203-0405-0607-0809-0a0b0c0d0e0f"
        );
    }

    #[test]
    fn test_shape_check() {
        assert!(is_grouped_identifier(NIL_IDENTIFIER));
        assert!(is_grouped_identifier("deadbeef-0000-1111-2222-abcdefabcdef"));
        assert!(!is_grouped_identifier("DEADBEEF-0000-1111-2222-abcdefabcdef"));
        assert!(!is_grouped_identifier("deadbeef-0000-1111-2222-abcdefabcde"));
        assert!(!is_grouped_identifier("deadbeef-0000-1111-2222-abcdefabcdef-00"));
        assert!(!is_grouped_identifier("deadbeef00001111-2222-abcdefabcdef"));
        assert!(!is_grouped_identifier("deadbeeg-0000-1111-2222-abcdefabcdef"));
    }

    proptest! {
        #[test]
        fn prop_long_inputs_render_grouped_shape(bytes in proptest::collection::vec(any::<u8>(), 16..64)) {
            let identifier = bytes_to_identifier(&bytes).unwrap();
            prop_assert!(is_grouped_identifier(&identifier));
            prop_assert_eq!(identifier.len(), 36);
        }

        #[test]
        fn prop_decoding_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 16..48)) {
            prop_assert_eq!(bytes_to_identifier(&bytes).unwrap(), bytes_to_identifier(&bytes).unwrap());
        }

        #[test]
        fn prop_only_prefix_matters(prefix in proptest::array::uniform16(any::<u8>()), tail_a in any::<u64>(), tail_b in any::<u64>()) {
            let mut a = prefix.to_vec();
            a.extend_from_slice(&tail_a.to_le_bytes());
            let mut b = prefix.to_vec();
            b.extend_from_slice(&tail_b.to_le_bytes());
            prop_assert_eq!(bytes_to_identifier(&a).unwrap(), bytes_to_identifier(&b).unwrap());
        }

        #[test]
        fn prop_short_inputs_fail(bytes in proptest::collection::vec(any::<u8>(), 0..16)) {
            prop_assert!(matches!(bytes_to_identifier(&bytes), Err(RuntimeError::ArrayTooShort(n)) if n == bytes.len()));
        }
    }
}
