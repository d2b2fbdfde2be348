//! SHA-256 digests for sprite provenance and seed derivation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

const PREFIX: &str = "sha256:";
const DIGEST_LEN: usize = 32;

/// Digest of a pixel payload or of a structured generation input.
///
/// Written to sidecars as `sha256:<hex>`; `to_seed` turns it into the
/// deterministic seed a provider receives.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; DIGEST_LEN]);

impl ContentHash {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Digest several fields, each preceded by its length as a u64 so
    /// that field boundaries are part of the input.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let digest = parts
            .iter()
            .fold(Sha256::new(), |hasher, part| {
                hasher
                    .chain_update((part.len() as u64).to_le_bytes())
                    .chain_update(part)
            })
            .finalize();
        Self(digest.into())
    }

    /// Low eight bytes, little-endian, shifted right once.
    ///
    /// Result is at most `i64::MAX`, which TOML integers can carry.
    pub fn to_seed(&self) -> u64 {
        let head: [u8; 8] = std::array::from_fn(|i| self.0[i]);
        u64::from_le_bytes(head) >> 1
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(DIGEST_LEN * 2);
        for b in self.0 {
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Sidecar form, `sha256:` followed by 64 lowercase hex digits
    pub fn to_prefixed_hex(&self) -> String {
        format!("{PREFIX}{}", self.to_hex())
    }

    /// Inverse of [`to_prefixed_hex`](Self::to_prefixed_hex); `None` for
    /// another algorithm tag, a wrong length, or non-hex digits.
    pub fn from_prefixed_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix(PREFIX)?.as_bytes();
        if digits.len() != DIGEST_LEN * 2 {
            return None;
        }
        let mut out = [0u8; DIGEST_LEN];
        for (slot, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
            *slot = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        }
        Some(Self(out))
    }

    fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

fn nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentHash").field(&self.short()).finish()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_payload_same_digest() {
        let pixels = [10u8, 20, 30, 255].repeat(16);
        assert_eq!(ContentHash::from_bytes(&pixels), ContentHash::from_bytes(&pixels));
        assert_ne!(
            ContentHash::from_str("fire dragon"),
            ContentHash::from_str("ice dragon")
        );
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = ContentHash::from_parts(&[b"knight", b"walk"]);
        let b = ContentHash::from_parts(&[b"knightw", b"alk"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_seed_fits_toml_integer() {
        let frame = 3u64.to_le_bytes();
        let seed = ContentHash::from_parts(&[b"slime", &frame]).to_seed();
        assert_eq!(seed, ContentHash::from_parts(&[b"slime", &frame]).to_seed());
        assert!(seed <= i64::MAX as u64);
    }

    #[test]
    fn test_sidecar_form_parses_back() {
        let hash = ContentHash::from_str("slime_idle.png");
        let text = hash.to_prefixed_hex();
        assert_eq!(text.len(), PREFIX.len() + 64);
        assert_eq!(ContentHash::from_prefixed_hex(&text), Some(hash));
        assert_eq!(format!("{hash}").len(), 16);
    }

    #[test]
    fn test_rejects_malformed_sidecar_hash() {
        let hex = ContentHash::from_str("x").to_hex();
        assert!(ContentHash::from_prefixed_hex(&format!("md5:{hex}")).is_none());
        assert!(ContentHash::from_prefixed_hex("sha256:beef").is_none());
        let bad = format!("sha256:zz{}", &hex[2..]);
        assert!(ContentHash::from_prefixed_hex(&bad).is_none());
    }
}
