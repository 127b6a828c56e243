//! Id helpers: the nil "virtual root" id, and the deterministic reversal
//! used to derive stable mirror-twin ids.

use uuid::Uuid;

/// The virtual root id. Always present in the dirty closure so the final
/// combine proceeds even when nothing else changed.
pub fn nil_id() -> String {
    Uuid::nil().to_string()
}

/// Derives a twin id from a source id, deterministically and stably across
/// regenerations. For a parseable UUID this reverses the 16 underlying
/// bytes; for any other identifier string it reverses the characters.
///
/// A palindromic id would reverse to itself, which would violate the
/// "distinct from the source id" contract; such an id gets a trailing
/// marker byte/character flipped instead so the twin id is always distinct.
pub fn mirror_id(source: &str) -> String {
    if let Ok(uuid) = Uuid::parse_str(source) {
        let mut bytes = *uuid.as_bytes();
        bytes.reverse();
        let mut twin = Uuid::from_bytes(bytes);
        if twin == uuid {
            let mut b = *twin.as_bytes();
            b[15] ^= 0xFF;
            twin = Uuid::from_bytes(b);
        }
        twin.to_string()
    } else {
        let mut reversed: String = source.chars().rev().collect();
        if reversed == source {
            reversed.push('\u{2032}');
        }
        reversed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_id_is_distinct_and_stable() {
        let id = Uuid::new_v4().to_string();
        let twin1 = mirror_id(&id);
        let twin2 = mirror_id(&id);
        assert_ne!(twin1, id);
        assert_eq!(twin1, twin2);
    }

    #[test]
    fn mirror_id_handles_palindromic_uuid() {
        let palindrome = Uuid::from_bytes([0u8; 16]).to_string();
        let twin = mirror_id(&palindrome);
        assert_ne!(twin, palindrome);
    }

    #[test]
    fn mirror_id_handles_non_uuid_strings() {
        let twin = mirror_id("abc");
        assert_eq!(twin, "cba");
        assert_ne!(twin, "abc");
    }
}
