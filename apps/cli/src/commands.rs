use crate::args::Transform;
use anyhow::{Context, Result, anyhow, bail};
use fv_vault::boundary::{MAX_ADDRESSABLE_PAGES, PAGE_SIZE};
use fv_vault::container::{OVERHEAD, inspect};
use fv_vault::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Forwards engine logs to `tracing` and surfaces progress in quarter steps.
#[derive(Debug, Default)]
struct CliHost {
    inner: TracingHost,
    last_step: u8,
}

impl Host for CliHost {
    fn log(&mut self, level: LogLevel, message: &[u8]) {
        self.inner.log(level, message);
    }

    fn monotonic_millis(&mut self) -> u64 {
        self.inner.monotonic_millis()
    }

    fn progress(&mut self, percent: u8) {
        let step = percent / 25;
        if step > self.last_step {
            self.last_step = step;
            info!(percent, "Progress");
        }
    }

    fn is_tracing_sink(&self) -> bool {
        self.inner.is_tracing_sink()
    }
}

pub(crate) fn encrypt(args: &Transform, engine: EngineConfig) -> Result<()> {
    let output = args.encrypted_output();
    ensure_writable(&output, args.force)?;

    let password = read_password(&args.password_env)?;
    let plaintext = Zeroizing::new(read_input(&args.input)?);

    let container = run_boundary(engine, &password, &plaintext, Boundary::vault_encrypt)
        .with_context(|| format!("Failed to encrypt {}", args.input.display()))?;

    fs::write(&output, container.as_slice())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(input = %args.input.display(), output = %output.display(), bytes = container.len(), "Encrypted");
    Ok(())
}

pub(crate) fn decrypt(args: &Transform, engine: EngineConfig) -> Result<()> {
    let output = args.decrypted_output();
    ensure_writable(&output, args.force)?;

    let password = read_password(&args.password_env)?;
    let container = read_input(&args.input)?;

    let plaintext = run_boundary(engine, &password, &container, Boundary::vault_decrypt)
        .with_context(|| format!("Failed to decrypt {}", args.input.display()))?;

    fs::write(&output, plaintext.as_slice())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(input = %args.input.display(), output = %output.display(), bytes = plaintext.len(), "Decrypted");
    Ok(())
}

pub(crate) fn inspect_file(input: &Path, out: &mut impl Write) -> Result<()> {
    let bytes = read_input(input)?;
    let header =
        inspect(&bytes).with_context(|| format!("{} is not a valid container", input.display()))?;

    writeln!(out, "version:        {}", header.version)?;
    writeln!(out, "iterations:     {}", header.iterations)?;
    writeln!(out, "salt:           {}", hex::encode(header.salt))?;
    writeln!(out, "nonce:          {}", hex::encode(header.nonce))?;
    writeln!(out, "ciphertext_len: {}", header.ciphertext_len)?;
    Ok(())
}

type VaultCall = fn(&mut Boundary<CliHost>, u32, u32, u32, u32) -> Result<Region, ErrorCode>;

/// Copies both inputs into a fresh boundary, runs `call` and copies the result out.
fn run_boundary(
    mut engine: EngineConfig,
    password: &[u8],
    input: &[u8],
    call: VaultCall,
) -> Result<Zeroizing<Vec<u8>>> {
    engine.max_memory_pages = engine.max_memory_pages.max(pages_for(password.len(), input.len())?);
    let mut boundary = Boundary::new(CliHost::default(), engine)?;

    let password_region = place(&mut boundary, password)?;
    let input_region = place(&mut boundary, input)?;
    debug!(pages = boundary.memory().pages(), "Inputs placed in linear memory");

    let result = call(
        &mut boundary,
        password_region.ptr,
        password_region.len,
        input_region.ptr,
        input_region.len,
    );

    boundary.release(password_region).map_err(code_error)?;
    boundary.release(input_region).map_err(code_error)?;

    let region = result.map_err(code_error)?;
    let output = Zeroizing::new(boundary.read(region).map_err(code_error)?.to_vec());
    boundary.release(region).map_err(code_error)?;
    Ok(output)
}

fn place(boundary: &mut Boundary<CliHost>, bytes: &[u8]) -> Result<Region> {
    let len = u32::try_from(bytes.len()).context("Input larger than 4 GiB")?;
    let region = boundary.alloc(len).map_err(code_error)?;
    boundary.write(region, bytes).map_err(code_error)?;
    Ok(region)
}

/// Pages needed to hold password, input and the larger of the two possible outputs.
fn pages_for(password_len: usize, input_len: usize) -> Result<u32> {
    let bytes = password_len + 2 * input_len + OVERHEAD + 3 * 8;
    let pages = u32::try_from(bytes.div_ceil(PAGE_SIZE) + 1).unwrap_or(u32::MAX);
    if pages > MAX_ADDRESSABLE_PAGES {
        bail!("Input too large for the engine's 32-bit address space");
    }
    Ok(pages)
}

fn code_error(code: ErrorCode) -> anyhow::Error {
    let reason = match code {
        ErrorCode::WeakParameters => "weak parameters (empty password or too few iterations)",
        ErrorCode::Corruption => "the container is corrupted or truncated",
        ErrorCode::UnsupportedVersion => "the container was written by a newer format version",
        ErrorCode::AuthenticationFailure => "wrong password or the container was tampered with",
        ErrorCode::Cancelled => "operation cancelled",
        ErrorCode::AllocationFailure => "out of engine memory",
        ErrorCode::InvalidBuffer => "invalid buffer passed to the engine",
        ErrorCode::Entropy => "the system random number generator is unavailable",
        ErrorCode::InvalidConfiguration => "invalid engine configuration",
        ErrorCode::Internal => "internal engine error",
    };
    anyhow!("{reason} (code {})", code.as_u32())
}

fn read_password(var: &str) -> Result<Zeroizing<Vec<u8>>> {
    let value = std::env::var_os(var)
        .ok_or_else(|| anyhow!("Password not provided: set the {var} environment variable"))?;
    Ok(Zeroizing::new(value.into_encoded_bytes()))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_budget_covers_both_directions() {
        let pages = pages_for(10, 11).unwrap();
        assert_eq!(pages, 2);

        let big = 3 * PAGE_SIZE;
        let pages = pages_for(10, big).unwrap() as usize;
        assert!(pages * PAGE_SIZE >= 2 * big + OVERHEAD);
    }

    #[test]
    fn codes_become_readable_errors() {
        let err = code_error(ErrorCode::AuthenticationFailure);
        assert_eq!(err.to_string(), "wrong password or the container was tampered with (code 4)");
    }

    #[test]
    fn boundary_round_trip() {
        let engine = EngineConfig { iterations: 10_000, ..EngineConfig::default() };
        let container =
            run_boundary(engine, b"Sunshine1!", b"hello vault", Boundary::vault_encrypt).unwrap();
        assert_eq!(container.len(), 68);

        let plain =
            run_boundary(engine, b"Sunshine1!", &container, Boundary::vault_decrypt).unwrap();
        assert_eq!(plain.as_slice(), b"hello vault");

        let err = run_boundary(engine, b"wrong", &container, Boundary::vault_decrypt).unwrap_err();
        assert!(err.to_string().contains("code 4"));
    }
}
