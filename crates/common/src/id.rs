//! ID generation utilities.

use rand::Rng;
use ulid::Ulid;
use uuid::Uuid;

/// Alphabet used for short codes. No look-alike pruning; codes are checked
/// for uniqueness against the catalog on insert.
const SHORT_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated short codes.
const SHORT_CODE_LEN: usize = 8;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable
    /// - Monotonically increasing within the same millisecond
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a new random UUID v4.
    #[must_use]
    pub fn generate_uuid_v4(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a compact short code for direct links.
    ///
    /// Short codes are independent of the relay object reference, so a link
    /// survives the catalog row being re-pointed at different storage.
    #[must_use]
    pub fn generate_short_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..SHORT_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..SHORT_CODE_ALPHABET.len());
                SHORT_CODE_ALPHABET[idx] as char
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_short_code() {
        let id_gen = IdGenerator::new();
        let code = id_gen.generate_short_code();

        assert_eq!(code.len(), 8);
        assert!(code.chars().all(char::is_alphanumeric));
    }

    #[test]
    fn test_short_codes_differ() {
        let id_gen = IdGenerator::new();
        let a = id_gen.generate_short_code();
        let b = id_gen.generate_short_code();
        // 62^8 code space; a collision here would indicate a broken RNG.
        assert_ne!(a, b);
    }
}
