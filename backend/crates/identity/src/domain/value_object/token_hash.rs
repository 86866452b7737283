//! Token digest
//!
//! SHA-256 of the plaintext token. The only token representation that is
//! ever stored or compared.

use std::fmt;

use platform::crypto::constant_time_eq;

const TOKEN_HASH_LEN: usize = 32;

#[derive(Clone, Copy, Eq)]
pub struct TokenHash([u8; TOKEN_HASH_LEN]);

impl TokenHash {
    pub fn from_bytes(bytes: [u8; TOKEN_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for TokenHash {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl std::hash::Hash for TokenHash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A short prefix is enough to correlate log lines.
        write!(
            f,
            "TokenHash({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality() {
        let a = TokenHash::from_bytes([7u8; 32]);
        let mut other = [7u8; 32];
        assert_eq!(a, TokenHash::from_bytes(other));
        other[31] = 8;
        assert_ne!(a, TokenHash::from_bytes(other));
    }

    #[test]
    fn test_debug_is_truncated() {
        let hash = TokenHash::from_bytes([0xab; 32]);
        assert_eq!(format!("{:?}", hash), "TokenHash(abababab..)");
    }
}
