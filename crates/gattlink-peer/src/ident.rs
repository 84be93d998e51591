use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{PeerError, Result};

/// HKDF info label for the ident characteristic value.
pub const IDENT_INFO: &[u8] = b"BLEIdent";

/// Length of the ident value in bytes.
pub const IDENT_LEN: usize = 16;

/// Value served on (and checked against) the ident characteristic.
///
/// Derived from the session's ephemeral key material so a reader can tell it
/// reached the device that showed the engagement. Not a secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentToken([u8; IDENT_LEN]);

impl IdentToken {
    /// HKDF-SHA256(ikm, salt = empty, info = `"BLEIdent"`, L = 16).
    pub fn derive(ikm: &[u8]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, ikm);
        let mut okm = [0u8; IDENT_LEN];
        hk.expand(IDENT_INFO, &mut okm)
            .map_err(|e| PeerError::IdentDerivation(e.to_string()))?;
        Ok(Self(okm))
    }

    pub fn from_bytes(bytes: [u8; IDENT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENT_LEN] {
        &self.0
    }

    /// Byte-for-byte comparison against a value read from the peer.
    pub fn matches(&self, value: &[u8]) -> bool {
        self.0.as_slice() == value
    }
}

impl fmt::Debug for IdentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdentToken")
            .field(&format_args!("{}", hex::encode(self.0)))
            .finish()
    }
}

impl fmt::Display for IdentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 5869 test case 3 (empty salt, empty info) pins the HKDF wiring;
    // with info = "BLEIdent" the same IKM must produce a different value.
    #[test]
    fn rfc5869_empty_salt_wiring() {
        let ikm = [0x0bu8; 22];
        let hk = Hkdf::<Sha256>::new(None, &ikm);
        let mut okm = [0u8; 42];
        hk.expand(&[], &mut okm).expect("expand should succeed");
        assert_eq!(
            hex::encode(okm),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
        );

        let token = IdentToken::derive(&ikm).unwrap();
        assert_ne!(token.as_bytes()[..], okm[..IDENT_LEN]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = IdentToken::derive(b"device engagement key").unwrap();
        let b = IdentToken::derive(b"device engagement key").unwrap();
        let c = IdentToken::derive(b"another key").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_bytes().len(), IDENT_LEN);
    }

    #[test]
    fn matches_requires_exact_bytes() {
        let token = IdentToken::derive(b"k").unwrap();
        assert!(token.matches(token.as_bytes()));
        assert!(!token.matches(&token.as_bytes()[..15]));

        let mut flipped = *token.as_bytes();
        flipped[0] ^= 0xFF;
        assert!(!token.matches(&flipped));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let token = IdentToken::from_bytes([0xAB; IDENT_LEN]);
        assert_eq!(token.to_string(), "ab".repeat(IDENT_LEN));
        assert!(format!("{token:?}").starts_with("IdentToken(abab"));
    }
}
