use crate::error::VaultError;
use zeroize::Zeroizing;

/// Heap buffer that is wiped when dropped. Used for anything that holds plaintext.
pub type SecretBuffer = Zeroizing<Vec<u8>>;

/// Reserves exactly `len` bytes, reporting exhaustion instead of aborting.
pub(crate) fn reserve(len: usize) -> Result<Vec<u8>, VaultError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| VaultError::Allocation {
        message: e.to_string().into(),
        context: Some(format!("{len} bytes requested").into()),
    })?;
    Ok(buf)
}

/// Copies `bytes` into a fresh [`SecretBuffer`].
pub(crate) fn secret_copy(bytes: &[u8]) -> Result<SecretBuffer, VaultError> {
    let mut buf = Zeroizing::new(reserve(bytes.len())?);
    buf.extend_from_slice(bytes);
    Ok(buf)
}

/// Compares two byte strings without an early exit on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_detects_single_bit() {
        let a = [0x5au8; 16];
        let mut b = a;
        assert!(constant_time_eq(&a, &b));
        b[15] ^= 0x01;
        assert!(!constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &b[..8]));
    }

    #[test]
    fn secret_copy_preserves_contents() {
        let copy = secret_copy(b"hello vault").unwrap();
        assert_eq!(copy.as_slice(), b"hello vault");
    }
}
