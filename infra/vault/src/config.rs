use crate::cipher::CHUNK_SIZE;
use crate::error::VaultError;
use crate::kdf::{DEFAULT_ITERATIONS, check_iterations};
use serde::Deserialize;

/// Smallest accepted chunk (one cipher block).
pub const MIN_CHUNK_SIZE: usize = 16;

/// Largest accepted chunk.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Linear memory pages reserved when a boundary is created.
pub const DEFAULT_INITIAL_PAGES: u32 = 10;

/// Upper bound on linear memory pages.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Tunables of the vault engine.
///
/// Deserializable so hosts can load it from their own configuration files; every field
/// falls back to its default when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PBKDF2 iterations written into new containers.
    pub iterations: u32,
    /// Bytes processed between progress reports and cancellation checks.
    pub chunk_size: usize,
    /// Pages (64 KiB each) the boundary memory starts with.
    pub initial_memory_pages: u32,
    /// Pages the boundary memory may grow to.
    pub max_memory_pages: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            chunk_size: CHUNK_SIZE,
            initial_memory_pages: DEFAULT_INITIAL_PAGES,
            max_memory_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl EngineConfig {
    /// Checks every field against its accepted range.
    ///
    /// # Errors
    /// * [`VaultError::WeakParameters`] for an out-of-range iteration count.
    /// * [`VaultError::InvalidConfiguration`] for a bad chunk size or page limits.
    pub fn validate(&self) -> Result<(), VaultError> {
        check_iterations(self.iterations)?;
        self.validate_processing()
    }

    /// Checks the fields decryption depends on; `iterations` only applies to new containers.
    ///
    /// # Errors
    /// [`VaultError::InvalidConfiguration`] for a bad chunk size or page limits.
    pub fn validate_processing(&self) -> Result<(), VaultError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(VaultError::InvalidConfiguration {
                message: format!(
                    "chunk_size {} outside [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]",
                    self.chunk_size
                )
                .into(),
                context: None,
            });
        }

        if self.initial_memory_pages == 0 || self.initial_memory_pages > self.max_memory_pages {
            return Err(VaultError::InvalidConfiguration {
                message: format!(
                    "memory pages must satisfy 0 < initial ({}) <= max ({})",
                    self.initial_memory_pages, self.max_memory_pages
                )
                .into(),
                context: None,
            });
        }

        if self.max_memory_pages > crate::boundary::MAX_ADDRESSABLE_PAGES {
            return Err(VaultError::InvalidConfiguration {
                message: format!(
                    "max_memory_pages {} exceeds the 32-bit address space",
                    self.max_memory_pages
                )
                .into(),
                context: None,
            });
        }

        Ok(())
    }
}
