//! # Memory Boundary
//!
//! The calling contract for running the engine as an isolated unit. The host and the engine
//! share nothing but a [`LinearMemory`]: the host allocates regions, writes the password and
//! payload into them, calls [`Boundary::vault_encrypt`] or [`Boundary::vault_decrypt`] with
//! pointer/length pairs and gets a result region (or an [`ErrorCode`]) back. The engine only
//! reads and writes inside the regions it was given or allocated itself, and keeps no
//! reference to them once the call returns.
//!
//! Everything else the engine needs from the outside (log sink, clock, progress and
//! cancellation) goes through the [`Host`] trait.
//!
//! ```rust
//! use fv_vault::prelude::*;
//!
//! let config = EngineConfig { iterations: 10_000, ..EngineConfig::default() };
//! let mut boundary = Boundary::new(TracingHost::new(), config).unwrap();
//!
//! let password = boundary.alloc(10).unwrap();
//! boundary.write(password, b"Sunshine1!").unwrap();
//! let data = boundary.alloc(11).unwrap();
//! boundary.write(data, b"hello vault").unwrap();
//!
//! let container = boundary.vault_encrypt(password.ptr, password.len, data.ptr, data.len).unwrap();
//! assert_eq!(container.len, 68);
//!
//! let plain =
//!     boundary.vault_decrypt(password.ptr, password.len, container.ptr, container.len).unwrap();
//! assert_eq!(boundary.read(plain).unwrap(), b"hello vault");
//! ```

mod host;
mod memory;

pub use host::{Host, LogLevel, TracingHost};
pub use memory::{LinearMemory, MAX_ADDRESSABLE_PAGES, PAGE_SIZE, Region};

use crate::config::EngineConfig;
use crate::error::{ErrorCode, VaultError};
use crate::session::VaultSession;
use tracing::warn;

/// Engine instance bound to one host and one linear memory.
#[derive(Debug)]
pub struct Boundary<H: Host = TracingHost> {
    memory: LinearMemory,
    host: H,
    config: EngineConfig,
}

impl<H: Host> Boundary<H> {
    /// Validates chunk size and page limits of `config` and sets up the linear memory.
    ///
    /// The iteration count is checked by each `vault_encrypt` call, so a boundary
    /// configured with a weak count can still open existing containers.
    ///
    /// # Errors
    /// * [`VaultError::InvalidConfiguration`] for a bad chunk size or page limits.
    /// * [`VaultError::Allocation`] if the initial pages cannot be reserved.
    pub fn new(host: H, config: EngineConfig) -> Result<Self, VaultError> {
        config.validate_processing()?;
        let memory = LinearMemory::new(config.initial_memory_pages, config.max_memory_pages)?;
        Ok(Self { memory, host, config })
    }

    #[must_use]
    pub const fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reserves a region for the host to fill.
    ///
    /// # Errors
    /// [`ErrorCode::AllocationFailure`] when the memory limit is reached.
    pub fn alloc(&mut self, len: u32) -> Result<Region, ErrorCode> {
        let result = self.memory.alloc(len);
        result.map_err(|e| self.fail("alloc", &e))
    }

    /// Zeroes and frees a region returned by [`Boundary::alloc`] or a vault call.
    ///
    /// # Errors
    /// [`ErrorCode::InvalidBuffer`] for an unknown or already released region.
    pub fn release(&mut self, region: Region) -> Result<(), ErrorCode> {
        let result = self.memory.release(region);
        result.map_err(|e| self.fail("release", &e))
    }

    /// Copies host bytes into `region`.
    ///
    /// # Errors
    /// [`ErrorCode::InvalidBuffer`] on a length mismatch or an out-of-bounds region.
    pub fn write(&mut self, region: Region, data: &[u8]) -> Result<(), ErrorCode> {
        let result = self.memory.write(region, data);
        result.map_err(|e| self.fail("write", &e))
    }

    /// Borrows the bytes of `region`.
    ///
    /// # Errors
    /// [`ErrorCode::InvalidBuffer`] for an out-of-bounds region.
    pub fn read(&self, region: Region) -> Result<&[u8], ErrorCode> {
        self.memory.read(region).map_err(|e| e.code())
    }

    /// Encrypts the payload at `data_ptr` under the password at `password_ptr`.
    ///
    /// On success the container is placed in a freshly allocated region owned by the host.
    ///
    /// # Errors
    /// The [`ErrorCode`] of whatever failed: reading the input regions, the session itself
    /// or allocating the result.
    pub fn vault_encrypt(
        &mut self,
        password_ptr: u32,
        password_len: u32,
        data_ptr: u32,
        data_len: u32,
    ) -> Result<Region, ErrorCode> {
        let output = {
            let password = self.memory.read(Region::new(password_ptr, password_len));
            let data = self.memory.read(Region::new(data_ptr, data_len));
            match (password, data) {
                (Ok(password), Ok(data)) => VaultSession::new(password, &mut self.host)
                    .with_config(self.config)
                    .encrypt(data),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        };

        let result = output.and_then(|container| self.deliver(&container));
        result.map_err(|e| self.fail("vault_encrypt", &e))
    }

    /// Decrypts the container at `container_ptr` under the password at `password_ptr`.
    ///
    /// On success the plaintext is placed in a freshly allocated region owned by the host;
    /// the engine's own copy is zeroed before returning.
    ///
    /// # Errors
    /// The [`ErrorCode`] of whatever failed. No region is allocated on failure.
    pub fn vault_decrypt(
        &mut self,
        password_ptr: u32,
        password_len: u32,
        container_ptr: u32,
        container_len: u32,
    ) -> Result<Region, ErrorCode> {
        let output = {
            let password = self.memory.read(Region::new(password_ptr, password_len));
            let container = self.memory.read(Region::new(container_ptr, container_len));
            match (password, container) {
                (Ok(password), Ok(container)) => VaultSession::new(password, &mut self.host)
                    .with_config(self.config)
                    .decrypt(container),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        };

        let result = output.and_then(|plaintext| self.deliver(&plaintext));
        result.map_err(|e| self.fail("vault_decrypt", &e))
    }

    fn deliver(&mut self, bytes: &[u8]) -> Result<Region, VaultError> {
        let len = u32::try_from(bytes.len()).map_err(|_| VaultError::Allocation {
            message: "result does not fit a 32-bit region".into(),
            context: Some(format!("{} bytes", bytes.len()).into()),
        })?;
        let region = self.memory.alloc(len)?;
        self.memory.write(region, bytes)?;
        Ok(region)
    }

    fn fail(&mut self, call: &'static str, err: &VaultError) -> ErrorCode {
        let code = err.code();
        warn!(call, code = code.as_u32(), error = %err, "Boundary call failed");
        if !self.host.is_tracing_sink() {
            let line = format!("{call} -> {code:?}: {err}");
            self.host.log(LogLevel::Error, line.as_bytes());
        }
        code
    }
}

/// Flattens a boundary result into one `u64` for hosts limited to scalar returns.
///
/// Success is the packed region. Failure is `ptr = 0` with the error code in the length
/// half; this never collides with a real region because address 0 is never allocated and
/// [`Region::EMPTY`] has length 0.
#[must_use]
pub const fn encode_result(result: Result<Region, ErrorCode>) -> u64 {
    match result {
        Ok(region) => region.pack(),
        Err(code) => Region::new(0, code.as_u32()).pack(),
    }
}

/// Inverse of [`encode_result`]. Unknown codes decode as [`ErrorCode::Internal`].
///
/// # Errors
/// The decoded [`ErrorCode`] when `raw` encodes a failure.
pub const fn decode_result(raw: u64) -> Result<Region, ErrorCode> {
    let region = Region::unpack(raw);
    if region.ptr == 0 && region.len != 0 {
        return Err(match ErrorCode::from_u32(region.len) {
            Some(code) => code,
            None => ErrorCode::Internal,
        });
    }
    Ok(region)
}
