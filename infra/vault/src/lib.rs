//! Password-based file vault engine.
//!
//! Turns a password and a byte buffer into a self-contained encrypted container and back.
//! Keys are stretched with PBKDF2-HMAC-SHA256, payloads are sealed with AES-256-GCM and
//! framed in a versioned binary container that carries everything decryption needs
//! except the password.
//!
//! ## Container Format
//!
//! ```text
//! [MAGIC "FVLT"(4)][VERSION(1)][ITERATIONS(4)][SALT(16)][NONCE(12)][CT_LEN(4)][CIPHERTEXT(N)][TAG(16)]
//! ```
//!
//! See [`container`] for the parsing rules.
//!
//! ## Nonce and Salt Policy
//!
//! Every encryption draws a fresh 16-byte salt and a fresh 96-bit nonce from the operating
//! system CSPRNG. Since the key itself is derived from a per-container salt, a (key, nonce)
//! pair never repeats in practice.
//!
//! ## Authentication
//!
//! The GCM tag is the only integrity mechanism. Decryption is all-or-nothing: a wrong
//! password and a tampered container both yield [`VaultError::AuthenticationFailure`] and
//! no plaintext byte is released.
//!
//! ## Layers
//!
//! * [`kdf`], [`cipher`] and [`container`] are the stateless building blocks.
//! * [`VaultSession`] runs one operation as a state machine with chunked progress and
//!   cooperative cancellation.
//! * [`Boundary`] exposes the engine through pointer/length pairs over a [`LinearMemory`],
//!   with logging and the clock injected via [`Host`].
//!
//! ## Examples
//!
//! ```rust
//! use fv_vault::prelude::*;
//!
//! # fn main() -> Result<(), VaultError> {
//! let container = fv_vault::encrypt(b"Sunshine1!", b"hello vault")?;
//! assert_eq!(container.len(), 68);
//!
//! let plaintext = fv_vault::decrypt(b"Sunshine1!", &container)?;
//! assert_eq!(plaintext.as_slice(), b"hello vault");
//!
//! let err = fv_vault::decrypt(b"wrong", &container).unwrap_err();
//! assert_eq!(err.code(), ErrorCode::AuthenticationFailure);
//! # Ok(())
//! # }
//! ```

pub mod boundary;
mod buffer;
pub mod cipher;
mod config;
pub mod container;
mod error;
pub mod kdf;
mod session;

pub use boundary::{Boundary, Host, LinearMemory, LogLevel, Region, TracingHost};
pub use buffer::SecretBuffer;
pub use config::{EngineConfig, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use container::{ContainerHeader, ContainerView, VaultContainer};
pub use error::{ErrorCode, VaultError, VaultErrorExt};
pub use session::{CancelToken, SessionState, VaultSession};

pub mod prelude {
    pub use crate::boundary::{Boundary, Host, LogLevel, Region, TracingHost};
    pub use crate::config::EngineConfig;
    pub use crate::container::{ContainerHeader, VaultContainer};
    pub use crate::error::{ErrorCode, VaultError, VaultErrorExt};
    pub use crate::session::{CancelToken, SessionState, VaultSession};
    pub use crate::SecretBuffer;
}

/// Encrypts `plaintext` with default settings, logging through `tracing`.
///
/// # Errors
/// See [`VaultSession::encrypt`].
pub fn encrypt(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut host = TracingHost::new();
    VaultSession::new(password, &mut host).encrypt(plaintext)
}

/// Decrypts `container` with default settings, logging through `tracing`.
///
/// # Errors
/// See [`VaultSession::decrypt`].
pub fn decrypt(password: &[u8], container: &[u8]) -> Result<SecretBuffer, VaultError> {
    let mut host = TracingHost::new();
    VaultSession::new(password, &mut host).decrypt(container)
}
