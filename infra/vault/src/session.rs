//! # Vault Session
//!
//! One encrypt or decrypt call, run as an explicit state machine:
//!
//! ```text
//! Idle -> Deriving -> Processing -> Finalizing -> Done
//!            \____________\______________\______-> Failed(code)
//! ```
//!
//! A session is created per operation and cannot be restarted; a second call on the same
//! session fails with an internal error and leaves the recorded outcome untouched. The
//! payload is processed in chunks of [`EngineConfig::chunk_size`] bytes. Before each chunk
//! the session polls the [`CancelToken`] and the host; after each chunk it reports progress.
//! Key material and plaintext copies live in zeroize-on-drop buffers, so every exit path
//! (success, failure or cancellation) wipes them.

use crate::boundary::{Host, LogLevel};
use crate::buffer::{self, SecretBuffer};
use crate::cipher::{GcmStream, generate_nonce};
use crate::config::EngineConfig;
use crate::container::{ContainerView, VaultContainer};
use crate::error::{ErrorCode, VaultError};
use crate::kdf::{check_iterations, derive, generate_salt};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Where a [`VaultSession`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Deriving,
    Processing,
    Finalizing,
    Done,
    Failed(ErrorCode),
}

impl SessionState {
    /// `Done` and `Failed` are final.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Deriving => f.write_str("deriving"),
            Self::Processing => f.write_str("processing"),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed(code) => write!(f, "failed({code:?})"),
        }
    }
}

/// Cooperative cancellation flag, cheap to clone and share with another thread.
///
/// Setting it takes effect at the next chunk boundary of the session that holds it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

/// Single-use orchestrator of one encryption or decryption.
///
/// ```rust
/// use fv_vault::prelude::*;
///
/// # fn main() -> Result<(), VaultError> {
/// let config = EngineConfig { iterations: 10_000, ..EngineConfig::default() };
/// let mut host = TracingHost::new();
///
/// let container = {
///     let mut session = VaultSession::new(b"Sunshine1!", &mut host).with_config(config);
///     let container = session.encrypt(b"hello vault")?;
///     assert_eq!(session.state(), SessionState::Done);
///     container
/// };
/// assert_eq!(container.len(), 68);
///
/// let mut session = VaultSession::new(b"Sunshine1!", &mut host).with_config(config);
/// assert_eq!(session.decrypt(&container)?.as_slice(), b"hello vault");
/// # Ok(())
/// # }
/// ```
pub struct VaultSession<'a> {
    password: &'a [u8],
    host: &'a mut dyn Host,
    config: EngineConfig,
    cancel: CancelToken,
    state: SessionState,
    progress: u8,
    started_at: u64,
}

impl fmt::Debug for VaultSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSession")
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> VaultSession<'a> {
    pub fn new(password: &'a [u8], host: &'a mut dyn Host) -> Self {
        Self {
            password,
            host,
            config: EngineConfig::default(),
            cancel: CancelToken::default(),
            state: SessionState::Idle,
            progress: 0,
            started_at: 0,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a token that another thread can use to abort the session.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Last reported progress, `0..=100`.
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.progress
    }

    /// Encrypts `plaintext` into a serialized container.
    ///
    /// # Errors
    /// * [`VaultError::WeakParameters`] for an empty password or weak iteration count.
    /// * [`VaultError::Cancelled`] if cancellation was observed between chunks.
    /// * [`VaultError::Entropy`] if salt or nonce cannot be generated.
    /// * [`VaultError::Internal`] if the session was already used.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        self.begin(Direction::Encrypt)?;
        let result = self.run_encrypt(plaintext);
        self.settle(Direction::Encrypt, result)
    }

    /// Decrypts a serialized container. Nothing is returned unless the tag verifies.
    ///
    /// # Errors
    /// * [`VaultError::WeakParameters`] for an empty password or weak stored iteration count.
    /// * [`VaultError::Corruption`] / [`VaultError::UnsupportedVersion`] for a bad container.
    /// * [`VaultError::AuthenticationFailure`] for a wrong password or tampered data.
    /// * [`VaultError::Cancelled`] if cancellation was observed between chunks.
    /// * [`VaultError::Internal`] if the session was already used.
    pub fn decrypt(&mut self, container: &[u8]) -> Result<SecretBuffer, VaultError> {
        self.begin(Direction::Decrypt)?;
        let result = self.run_decrypt(container);
        self.settle(Direction::Decrypt, result)
    }

    fn run_encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        self.transition(SessionState::Deriving);
        self.check_password()?;
        self.config.validate()?;
        if u32::try_from(plaintext.len()).is_err() {
            return Err(VaultError::InvalidBuffer {
                message: "plaintext does not fit a container".into(),
                context: Some(format!("{} bytes", plaintext.len()).into()),
            });
        }

        let iterations = self.config.iterations;
        let salt = generate_salt()?;
        let key = derive(self.password, &salt, iterations)?;
        let nonce = generate_nonce()?;

        self.transition(SessionState::Processing);
        let mut data = buffer::secret_copy(plaintext)?;
        let mut stream = GcmStream::new(&key, &nonce, &[])?;
        self.process(&mut stream, &mut data, GcmStream::encrypt_chunk)?;

        self.transition(SessionState::Finalizing);
        let tag = stream.finalize();
        let ciphertext = std::mem::take(&mut *data);
        VaultContainer::new(iterations, salt, nonce, ciphertext, tag).serialize()
    }

    fn run_decrypt(&mut self, container: &[u8]) -> Result<SecretBuffer, VaultError> {
        self.transition(SessionState::Deriving);
        self.check_password()?;
        self.config.validate_processing()?;

        let view = ContainerView::parse(container)?;
        check_iterations(view.header.iterations)?;
        let key = derive(self.password, &view.header.salt, view.header.iterations)?;

        self.transition(SessionState::Processing);
        let mut data = buffer::secret_copy(view.ciphertext)?;
        let mut stream = GcmStream::new(&key, &view.header.nonce, &[])?;
        self.process(&mut stream, &mut data, GcmStream::decrypt_chunk)?;

        self.transition(SessionState::Finalizing);
        stream.verify(&view.tag)?;
        Ok(data)
    }

    fn process(
        &mut self,
        stream: &mut GcmStream,
        data: &mut [u8],
        op: fn(&mut GcmStream, &mut [u8]) -> Result<(), VaultError>,
    ) -> Result<(), VaultError> {
        let total = data.len();
        if total == 0 {
            self.report(100);
            return Ok(());
        }

        let mut done = 0usize;
        for chunk in data.chunks_mut(self.config.chunk_size) {
            if self.cancel_requested() {
                return Err(VaultError::Cancelled {
                    context: Some(format!("after {done} of {total} bytes").into()),
                });
            }
            op(stream, chunk)?;
            done += chunk.len();
            self.report(percent(done, total));
        }
        Ok(())
    }

    fn begin(&mut self, direction: Direction) -> Result<(), VaultError> {
        if self.state != SessionState::Idle {
            return Err(VaultError::Internal {
                message: "vault sessions are single-use".into(),
                context: Some(
                    format!("{} requested in state {}", direction.as_str(), self.state).into(),
                ),
            });
        }
        self.started_at = self.host.monotonic_millis();
        Ok(())
    }

    fn settle<T>(
        &mut self,
        direction: Direction,
        result: Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let elapsed_ms = self.host.monotonic_millis().saturating_sub(self.started_at);
        let operation = direction.as_str();
        match &result {
            Ok(_) => {
                self.transition(SessionState::Done);
                info!(operation, elapsed_ms, "Vault operation complete");
            },
            Err(err) => {
                self.transition(SessionState::Failed(err.code()));
                warn!(operation, elapsed_ms, error = %err, "Vault operation failed");
                if !self.host.is_tracing_sink() {
                    let line = format!("{operation} failed: {err}");
                    self.host.log(LogLevel::Warn, line.as_bytes());
                }
            },
        }
        result
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session transition");
        if !self.host.is_tracing_sink() {
            let line = format!("session {} -> {next}", self.state);
            self.host.log(LogLevel::Debug, line.as_bytes());
        }
        self.state = next;
    }

    fn check_password(&self) -> Result<(), VaultError> {
        if self.password.is_empty() {
            return Err(VaultError::WeakParameters {
                message: "password must not be empty".into(),
                context: None,
            });
        }
        Ok(())
    }

    fn cancel_requested(&mut self) -> bool {
        self.cancel.is_cancelled() || self.host.cancel_requested()
    }

    fn report(&mut self, percent: u8) {
        self.progress = self.progress.max(percent);
        self.host.progress(self.progress);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent(done: usize, total: usize) -> u8 {
    (done as u128 * 100 / total as u128) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::TracingHost;

    fn fast() -> EngineConfig {
        EngineConfig { iterations: 10_000, chunk_size: 16, ..EngineConfig::default() }
    }

    #[test]
    fn percent_reaches_100_exactly_at_the_end() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(usize::MAX, usize::MAX), 100);
    }

    #[test]
    fn fresh_session_is_idle() {
        let mut host = TracingHost::new();
        let session = VaultSession::new(b"pw", &mut host);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.progress(), 0);
        assert!(!session.state().is_terminal());
    }

    #[test]
    fn empty_password_fails_before_crypto() {
        let mut host = TracingHost::new();
        let mut session = VaultSession::new(b"", &mut host).with_config(fast());
        let err = session.encrypt(b"data").unwrap_err();

        assert!(matches!(err, VaultError::WeakParameters { .. }));
        assert_eq!(session.state(), SessionState::Failed(ErrorCode::WeakParameters));
        assert_eq!(session.progress(), 0);
    }

    #[test]
    fn sessions_are_single_use() {
        let mut host = TracingHost::new();
        let mut session = VaultSession::new(b"pw", &mut host).with_config(fast());
        session.encrypt(b"data").unwrap();

        let err = session.encrypt(b"data").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(session.state(), SessionState::Done);
    }

    #[test]
    fn pre_cancelled_token_stops_at_first_chunk() {
        let token = CancelToken::new();
        token.cancel();

        let mut host = TracingHost::new();
        let mut session =
            VaultSession::new(b"pw", &mut host).with_config(fast()).with_cancel(token.clone());
        let err = session.encrypt(&[0u8; 64]).unwrap_err();

        assert!(matches!(err, VaultError::Cancelled { .. }));
        assert_eq!(session.state(), SessionState::Failed(ErrorCode::Cancelled));
        assert!(token.is_cancelled());
    }

    #[test]
    fn display_names_states() {
        assert_eq!(SessionState::Processing.to_string(), "processing");
        assert_eq!(SessionState::Failed(ErrorCode::Cancelled).to_string(), "failed(Cancelled)");
    }
}
