#![allow(dead_code, unreachable_pub)]

use fv_vault::prelude::*;

pub const PASSWORD: &[u8] = b"Sunshine1!";

/// Lowest accepted iteration count and tiny chunks, so tests stay fast and multi-chunk.
#[must_use]
pub fn fast_config() -> EngineConfig {
    EngineConfig { iterations: 10_000, chunk_size: 1024, ..EngineConfig::default() }
}

/// Host that records everything the engine tells it and can cancel on demand.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub logs: Vec<(LogLevel, String)>,
    pub progress: Vec<u8>,
    pub clock: u64,
    /// Request cancellation once this many progress reports have been received.
    pub cancel_after: Option<usize>,
    /// Claim to feed the engine's own `tracing` subscriber.
    pub tracing_sink: bool,
}

impl RecordingHost {
    #[must_use]
    pub fn cancelling_after(reports: usize) -> Self {
        Self { cancel_after: Some(reports), ..Self::default() }
    }

    #[must_use]
    pub fn tracing_sink() -> Self {
        Self { tracing_sink: true, ..Self::default() }
    }

    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.logs.iter().map(|(_, line)| line.as_str()).collect()
    }
}

impl Host for RecordingHost {
    fn log(&mut self, level: LogLevel, message: &[u8]) {
        self.logs.push((level, String::from_utf8_lossy(message).into_owned()));
    }

    fn monotonic_millis(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn progress(&mut self, percent: u8) {
        self.progress.push(percent);
    }

    fn cancel_requested(&mut self) -> bool {
        self.cancel_after.is_some_and(|limit| self.progress.len() >= limit)
    }

    fn is_tracing_sink(&self) -> bool {
        self.tracing_sink
    }
}

/// Encrypts with [`fast_config`] through a throwaway host.
#[must_use]
pub fn seal(password: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let mut host = RecordingHost::default();
    VaultSession::new(password, &mut host)
        .with_config(fast_config())
        .encrypt(plaintext)
        .expect("encryption failed")
}

/// Decrypts with [`fast_config`] through a throwaway host.
///
/// # Errors
/// Whatever the session reports.
pub fn open(password: &[u8], container: &[u8]) -> Result<SecretBuffer, VaultError> {
    let mut host = RecordingHost::default();
    VaultSession::new(password, &mut host).with_config(fast_config()).decrypt(container)
}
