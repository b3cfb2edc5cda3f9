//! AES-256-GCM, incrementally.
//!
//! [`GcmStream`] splits the AEAD into its two halves (CTR keystream and GHASH) so that the
//! session can feed the payload in chunks and check for cancellation in between. The
//! result is bit-identical to a one-shot AES-256-GCM call with a 96-bit nonce, regardless
//! of where the chunk boundaries fall.

use crate::buffer::{self, SecretBuffer};
use crate::error::VaultError;
use crate::kdf::DerivedKey;
use aes::Aes256;
use ctr::Ctr32BE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ghash::GHash;
use ghash::universal_hash::{KeyInit, UniversalHash};
use zeroize::Zeroizing;

/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Default number of bytes processed between progress reports.
pub const CHUNK_SIZE: usize = 64 * 1024;

const BLOCK_LEN: usize = 16;

pub type Nonce = [u8; NONCE_LEN];
pub type Tag = [u8; TAG_LEN];

type Aes256Ctr = Ctr32BE<Aes256>;

/// Draws a fresh nonce from the operating system CSPRNG.
///
/// # Errors
/// [`VaultError::Entropy`] if the RNG is unavailable.
pub fn generate_nonce() -> Result<Nonce, VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce)?;
    Ok(nonce)
}

/// Incremental AES-256-GCM state for one (key, nonce) pair.
///
/// Feed the whole payload through either [`GcmStream::encrypt_chunk`] or
/// [`GcmStream::decrypt_chunk`], then call [`GcmStream::finalize`] or [`GcmStream::verify`].
pub struct GcmStream {
    keystream: Aes256Ctr,
    ghash: GHash,
    tag_mask: Zeroizing<[u8; BLOCK_LEN]>,
    pending: Zeroizing<[u8; BLOCK_LEN]>,
    pending_len: usize,
    aad_len: u64,
    data_len: u64,
}

impl std::fmt::Debug for GcmStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcmStream")
            .field("aad_len", &self.aad_len)
            .field("data_len", &self.data_len)
            .finish_non_exhaustive()
    }
}

impl GcmStream {
    /// Starts a stream, authenticating `aad` up front.
    ///
    /// # Errors
    /// [`VaultError::Internal`] if the primitives reject the key material.
    pub fn new(key: &DerivedKey, nonce: &Nonce, aad: &[u8]) -> Result<Self, VaultError> {
        // H = E_K(0^128)
        let mut h = Zeroizing::new([0u8; BLOCK_LEN]);
        let mut zero_ctr = Aes256Ctr::new_from_slices(key.as_bytes(), &[0u8; BLOCK_LEN])
            .map_err(|e| VaultError::Internal {
                message: e.to_string().into(),
                context: Some("AES-CTR key setup".into()),
            })?;
        zero_ctr.apply_keystream(h.as_mut_slice());

        let mut ghash = GHash::new_from_slice(h.as_slice()).map_err(|e| VaultError::Internal {
            message: e.to_string().into(),
            context: Some("GHASH key setup".into()),
        })?;
        ghash.update_padded(aad);

        // J0 = nonce || 0^31 || 1; its keystream block masks the tag, data starts at J0 + 1.
        let mut j0 = [0u8; BLOCK_LEN];
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_LEN - 1] = 1;
        let mut keystream = Aes256Ctr::new_from_slices(key.as_bytes(), &j0).map_err(|e| {
            VaultError::Internal {
                message: e.to_string().into(),
                context: Some("AES-CTR nonce setup".into()),
            }
        })?;
        let mut tag_mask = Zeroizing::new([0u8; BLOCK_LEN]);
        keystream.apply_keystream(tag_mask.as_mut_slice());

        Ok(Self {
            keystream,
            ghash,
            tag_mask,
            pending: Zeroizing::new([0u8; BLOCK_LEN]),
            pending_len: 0,
            aad_len: aad.len() as u64,
            data_len: 0,
        })
    }

    /// Bytes fed through the stream so far.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.data_len
    }

    /// Encrypts `chunk` in place.
    ///
    /// # Errors
    /// [`VaultError::Internal`] once the 32-bit block counter would wrap.
    pub fn encrypt_chunk(&mut self, chunk: &mut [u8]) -> Result<(), VaultError> {
        self.apply_keystream(chunk)?;
        self.absorb(chunk);
        Ok(())
    }

    /// Decrypts `chunk` in place. The output is unauthenticated until [`GcmStream::verify`].
    ///
    /// # Errors
    /// [`VaultError::Internal`] once the 32-bit block counter would wrap.
    pub fn decrypt_chunk(&mut self, chunk: &mut [u8]) -> Result<(), VaultError> {
        self.absorb(chunk);
        self.apply_keystream(chunk)
    }

    /// Produces the authentication tag over everything fed so far.
    #[must_use]
    pub fn finalize(mut self) -> Tag {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
        }

        let mut lengths = [0u8; BLOCK_LEN];
        lengths[..8].copy_from_slice(&(self.aad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(self.data_len * 8).to_be_bytes());
        self.ghash.update_padded(&lengths);

        let digest = self.ghash.finalize();
        let mut tag = [0u8; TAG_LEN];
        for ((out, s), m) in tag.iter_mut().zip(digest.iter()).zip(self.tag_mask.iter()) {
            *out = s ^ m;
        }
        tag
    }

    /// Compares the computed tag against `expected` in constant time.
    ///
    /// # Errors
    /// [`VaultError::AuthenticationFailure`] on mismatch.
    pub fn verify(self, expected: &Tag) -> Result<(), VaultError> {
        let computed = self.finalize();
        if buffer::constant_time_eq(&computed, expected) {
            Ok(())
        } else {
            Err(VaultError::AuthenticationFailure { context: None })
        }
    }

    fn apply_keystream(&mut self, chunk: &mut [u8]) -> Result<(), VaultError> {
        self.keystream.try_apply_keystream(chunk).map_err(|_| VaultError::Internal {
            message: "keystream exhausted".into(),
            context: Some(format!("after {} bytes", self.data_len).into()),
        })
    }

    fn absorb(&mut self, mut data: &[u8]) {
        self.data_len += data.len() as u64;

        if self.pending_len > 0 {
            let take = (BLOCK_LEN - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len < BLOCK_LEN {
                return;
            }
            self.ghash.update_padded(self.pending.as_slice());
            self.pending_len = 0;
        }

        let whole = data.len() - data.len() % BLOCK_LEN;
        if whole > 0 {
            self.ghash.update_padded(&data[..whole]);
        }

        let rest = &data[whole..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }
}

/// One-shot encryption; returns the ciphertext and its tag.
///
/// # Errors
/// * [`VaultError::Allocation`] if the output buffer cannot be reserved.
/// * [`VaultError::Internal`] if the primitives fail.
pub fn encrypt(
    key: &DerivedKey,
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<(Vec<u8>, Tag), VaultError> {
    let mut out = buffer::reserve(plaintext.len())?;
    out.extend_from_slice(plaintext);

    let mut stream = GcmStream::new(key, nonce, &[])?;
    for chunk in out.chunks_mut(CHUNK_SIZE) {
        stream.encrypt_chunk(chunk)?;
    }
    Ok((out, stream.finalize()))
}

/// One-shot decryption; plaintext is released only after the tag verifies.
///
/// # Errors
/// * [`VaultError::AuthenticationFailure`] on a wrong key or tampered input.
/// * [`VaultError::Allocation`] if the output buffer cannot be reserved.
pub fn decrypt(
    key: &DerivedKey,
    nonce: &Nonce,
    ciphertext: &[u8],
    tag: &Tag,
) -> Result<SecretBuffer, VaultError> {
    let mut out = buffer::secret_copy(ciphertext)?;

    let mut stream = GcmStream::new(key, nonce, &[])?;
    for chunk in out.chunks_mut(CHUNK_SIZE) {
        stream.decrypt_chunk(chunk)?;
    }
    stream.verify(tag)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{MIN_ITERATIONS, derive};
    use hex_literal::hex;

    fn zero_key() -> DerivedKey {
        DerivedKey::from_bytes([0u8; 32])
    }

    #[test]
    fn empty_plaintext_matches_nist_vector() {
        let (ct, tag) = encrypt(&zero_key(), &[0u8; NONCE_LEN], b"").unwrap();
        assert!(ct.is_empty());
        assert_eq!(tag, hex!("530f8afbc74536b9a963b4f1c4cb738b"));
    }

    #[test]
    fn single_block_matches_nist_vector() {
        let (ct, tag) = encrypt(&zero_key(), &[0u8; NONCE_LEN], &[0u8; 16]).unwrap();
        assert_eq!(ct, hex!("cea7403d4d606b6e074ec5d3baf39d18"));
        assert_eq!(tag, hex!("d0d1c8a799996bf0265b98b5d48ab919"));
    }

    #[test]
    fn chunk_boundaries_do_not_change_output() {
        let key = derive(b"Sunshine1!", &[7u8; 16], MIN_ITERATIONS).unwrap();
        let nonce = [9u8; NONCE_LEN];
        let plaintext: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        let (expected_ct, expected_tag) = encrypt(&key, &nonce, &plaintext).unwrap();

        for step in [1usize, 3, 15, 16, 17, 100, 999] {
            let mut buf = plaintext.clone();
            let mut stream = GcmStream::new(&key, &nonce, &[]).unwrap();
            for chunk in buf.chunks_mut(step) {
                stream.encrypt_chunk(chunk).unwrap();
            }
            assert_eq!(stream.processed(), plaintext.len() as u64);
            assert_eq!(buf, expected_ct, "step {step}");
            assert_eq!(stream.finalize(), expected_tag, "step {step}");
        }
    }

    #[test]
    fn decrypt_reverses_encrypt() {
        let key = derive(b"Sunshine1!", &[1u8; 16], MIN_ITERATIONS).unwrap();
        let nonce = generate_nonce().unwrap();
        let (ct, tag) = encrypt(&key, &nonce, b"hello vault").unwrap();

        assert_eq!(ct.len(), 11);
        assert_eq!(decrypt(&key, &nonce, &ct, &tag).unwrap().as_slice(), b"hello vault");
    }

    #[test]
    fn tampering_is_rejected() {
        let key = derive(b"Sunshine1!", &[1u8; 16], MIN_ITERATIONS).unwrap();
        let nonce = [3u8; NONCE_LEN];
        let (mut ct, mut tag) = encrypt(&key, &nonce, b"hello vault").unwrap();

        ct[4] ^= 0x80;
        let err = decrypt(&key, &nonce, &ct, &tag).unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure { .. }));

        ct[4] ^= 0x80;
        tag[0] ^= 0x01;
        let err = decrypt(&key, &nonce, &ct, &tag).unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure { .. }));
    }

    #[test]
    fn aad_is_authenticated() {
        let key = zero_key();
        let nonce = [0u8; NONCE_LEN];

        let mut stream = GcmStream::new(&key, &nonce, b"header").unwrap();
        let mut data = *b"payload";
        stream.encrypt_chunk(&mut data).unwrap();
        let tag = stream.finalize();

        let mut stream = GcmStream::new(&key, &nonce, b"Header").unwrap();
        stream.decrypt_chunk(&mut data).unwrap();
        assert!(stream.verify(&tag).is_err());
    }

    #[test]
    fn nonces_are_fresh() {
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }
}
