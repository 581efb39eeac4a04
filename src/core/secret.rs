//! The signing secret value.
//!
//! Held in zeroizing memory; `Debug` shows a fingerprint, never the value.

use crate::constants;
use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Generate `length` characters from the secret alphabet using the OS RNG.
    pub fn generate(length: usize) -> Self {
        let charset = constants::SECRET_CHARSET;
        let value: String = (0..length)
            .map(|_| char::from(charset[OsRng.gen_range(0..charset.len())]))
            .collect();
        Self(Zeroizing::new(value))
    }

    /// Wrap file contents, trimming surrounding whitespace.
    pub(crate) fn from_stored(raw: String) -> Self {
        let raw = Zeroizing::new(raw);
        Self(Zeroizing::new(raw.trim().to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short SHA-256 prefix, safe to log and to compare across hosts.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let hex = format!("{:064x}", digest);
        hex[..constants::FINGERPRINT_LEN].to_string()
    }

    /// Rough entropy estimate from length and the character classes in use.
    pub fn estimated_entropy_bits(&self) -> f64 {
        let s = self.expose();
        let mut pool = 0u32;
        if s.chars().any(|c| c.is_ascii_lowercase()) {
            pool += 26;
        }
        if s.chars().any(|c| c.is_ascii_uppercase()) {
            pool += 26;
        }
        if s.chars().any(|c| c.is_ascii_digit()) {
            pool += 10;
        }
        if s.chars().any(|c| !c.is_ascii_alphanumeric()) {
            pool += 33;
        }
        if pool == 0 {
            return 0.0;
        }
        s.chars().count() as f64 * f64::from(pool).log2()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(sha256:{})", self.fingerprint())
    }
}
