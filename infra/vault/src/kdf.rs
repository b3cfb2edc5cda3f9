//! Password-based key derivation (PBKDF2-HMAC-SHA256).
//!
//! The derived key is deterministic in `(password, salt, iterations)` so decryption can
//! reproduce it from the container header. The password is only borrowed and never logged.

use crate::error::VaultError;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Lowest accepted iteration count.
pub const MIN_ITERATIONS: u32 = 10_000;

/// Highest accepted iteration count. Bounds the work a forged header can demand.
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Iteration count used for new containers unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 65_536;

pub type Salt = [u8; SALT_LEN];

/// A 32-byte symmetric key, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Wraps existing key material, e.g. a known-answer test key.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        crate::buffer::constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for DerivedKey {}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Rejects iteration counts outside `[MIN_ITERATIONS, MAX_ITERATIONS]`.
///
/// # Errors
/// [`VaultError::WeakParameters`] when the count is out of range.
pub fn check_iterations(iterations: u32) -> Result<(), VaultError> {
    if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        return Err(VaultError::WeakParameters {
            message: format!(
                "iteration count {iterations} outside [{MIN_ITERATIONS}, {MAX_ITERATIONS}]"
            )
            .into(),
            context: None,
        });
    }
    Ok(())
}

/// Derives a 32-byte key from `password` and `salt`.
///
/// # Errors
/// [`VaultError::WeakParameters`] if `iterations` is out of range.
pub fn derive(password: &[u8], salt: &Salt, iterations: u32) -> Result<DerivedKey, VaultError> {
    check_iterations(iterations)?;
    Ok(stretch(password, salt, iterations))
}

/// Draws a fresh salt from the operating system CSPRNG.
///
/// # Errors
/// [`VaultError::Entropy`] if the RNG is unavailable.
pub fn generate_salt() -> Result<Salt, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::fill(&mut salt)?;
    Ok(salt)
}

fn stretch(password: &[u8], salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = DerivedKey([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key.0);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const SALT: Salt = *b"0123456789abcdef";

    #[test]
    fn matches_pbkdf2_sha256_reference_vectors() {
        let key = stretch(b"password", b"salt", 1);
        assert_eq!(
            key.as_bytes(),
            &hex!("120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b")
        );

        let key = stretch(b"password", b"salt", 4096);
        assert_eq!(
            key.as_bytes(),
            &hex!("c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a")
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive(b"Sunshine1!", &SALT, MIN_ITERATIONS).unwrap();
        let b = derive(b"Sunshine1!", &SALT, MIN_ITERATIONS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_input_changes_the_key() {
        let base = derive(b"Sunshine1!", &SALT, MIN_ITERATIONS).unwrap();

        let mut other_salt = SALT;
        other_salt[0] ^= 1;

        assert_ne!(base, derive(b"Sunshine1?", &SALT, MIN_ITERATIONS).unwrap());
        assert_ne!(base, derive(b"Sunshine1!", &other_salt, MIN_ITERATIONS).unwrap());
        assert_ne!(base, derive(b"Sunshine1!", &SALT, MIN_ITERATIONS + 1).unwrap());
    }

    #[test]
    fn rejects_out_of_range_iterations() {
        let err = derive(b"pw", &SALT, MIN_ITERATIONS - 1).unwrap_err();
        assert!(matches!(err, VaultError::WeakParameters { .. }));

        let err = derive(b"pw", &SALT, MAX_ITERATIONS + 1).unwrap_err();
        assert!(matches!(err, VaultError::WeakParameters { .. }));
    }

    #[test]
    fn salts_are_fresh() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = derive(b"pw", &SALT, MIN_ITERATIONS).unwrap();
        assert_eq!(format!("{key:?}"), "DerivedKey(<redacted>)");
    }
}
