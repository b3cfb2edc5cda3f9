//! # Container Format
//!
//! Self-contained, versioned framing of an encrypted payload. All integers are big-endian
//! and fields follow each other without padding:
//!
//! ```text
//! [MAGIC(4)][VERSION(1)][ITERATIONS(4)][SALT(16)][NONCE(12)][CT_LEN(4)][CIPHERTEXT(N)][TAG(16)]
//! ```
//!
//! Parsing is a single forward pass over a bounds-checked reader. The magic is checked
//! first, then the version, then that the buffer holds exactly the declared ciphertext
//! plus tag.

use crate::cipher::{NONCE_LEN, Nonce, TAG_LEN, Tag};
use crate::error::VaultError;
use crate::kdf::{SALT_LEN, Salt};
use std::borrow::Cow;

/// Format identifier at offset 0.
pub const MAGIC: [u8; 4] = *b"FVLT";

/// Current (and only) format version.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the fixed header preceding the ciphertext.
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 4 + SALT_LEN + NONCE_LEN + 4;

/// Bytes a container adds on top of the plaintext.
pub const OVERHEAD: usize = HEADER_LEN + TAG_LEN;

/// Decoded fixed-width header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub iterations: u32,
    pub salt: Salt,
    pub nonce: Nonce,
    pub ciphertext_len: u32,
}

impl ContainerHeader {
    /// Total size of a container carrying this header.
    ///
    /// `u64` so the sum cannot wrap where `usize` is 32 bits wide.
    #[must_use]
    pub const fn container_len(&self) -> u64 {
        OVERHEAD as u64 + self.ciphertext_len as u64
    }
}

/// Borrowed, validated view over serialized container bytes.
#[derive(Debug, Clone, Copy)]
pub struct ContainerView<'a> {
    pub header: ContainerHeader,
    pub ciphertext: &'a [u8],
    pub tag: Tag,
}

impl<'a> ContainerView<'a> {
    /// Validates `bytes` and splits it into its fields without copying the ciphertext.
    ///
    /// # Errors
    /// * [`VaultError::Corruption`] for a wrong magic, a truncated buffer or a length mismatch.
    /// * [`VaultError::UnsupportedVersion`] for a known magic with an unknown version.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, VaultError> {
        let mut reader = Reader::new(bytes);

        if reader.array::<4>("magic")? != MAGIC {
            return Err(corruption("magic mismatch"));
        }

        let [version] = reader.array::<1>("version")?;
        if version != FORMAT_VERSION {
            return Err(VaultError::UnsupportedVersion { version, context: None });
        }

        let iterations = reader.u32_be("iterations")?;
        let salt = reader.array::<SALT_LEN>("salt")?;
        let nonce = reader.array::<NONCE_LEN>("nonce")?;
        let ciphertext_len = reader.u32_be("ciphertext length")?;

        let declared = ciphertext_len as usize;
        if declared.checked_add(TAG_LEN) != Some(reader.remaining()) {
            return Err(VaultError::Corruption {
                message: "declared length does not match buffer".into(),
                context: Some(
                    format!(
                        "ciphertext_len={declared}, bytes after header={}",
                        reader.remaining()
                    )
                    .into(),
                ),
            });
        }

        let ciphertext = reader.take(declared, "ciphertext")?;
        let tag = reader.array::<TAG_LEN>("tag")?;

        Ok(Self {
            header: ContainerHeader { version, iterations, salt, nonce, ciphertext_len },
            ciphertext,
            tag,
        })
    }

    /// Copies the view into an owned [`VaultContainer`].
    #[must_use]
    pub fn to_container(&self) -> VaultContainer {
        VaultContainer {
            version: self.header.version,
            iterations: self.header.iterations,
            salt: self.header.salt,
            nonce: self.header.nonce,
            ciphertext: self.ciphertext.to_vec(),
            tag: self.tag,
        }
    }
}

/// The persisted artifact of an encryption. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultContainer {
    pub version: u8,
    pub iterations: u32,
    pub salt: Salt,
    pub nonce: Nonce,
    pub ciphertext: Vec<u8>,
    pub tag: Tag,
}

impl VaultContainer {
    /// Assembles a current-version container.
    #[must_use]
    pub const fn new(
        iterations: u32,
        salt: Salt,
        nonce: Nonce,
        ciphertext: Vec<u8>,
        tag: Tag,
    ) -> Self {
        Self { version: FORMAT_VERSION, iterations, salt, nonce, ciphertext, tag }
    }

    /// Encodes the container.
    ///
    /// # Errors
    /// * [`VaultError::Corruption`] if the ciphertext does not fit the 32-bit length field.
    /// * [`VaultError::Allocation`] if the output buffer cannot be reserved.
    pub fn serialize(&self) -> Result<Vec<u8>, VaultError> {
        let ciphertext_len = u32::try_from(self.ciphertext.len()).map_err(|_| {
            VaultError::Corruption {
                message: "ciphertext exceeds the 32-bit length field".into(),
                context: Some(format!("{} bytes", self.ciphertext.len()).into()),
            }
        })?;

        let mut out = crate::buffer::reserve(OVERHEAD + self.ciphertext.len())?;
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.iterations.to_be_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&ciphertext_len.to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        Ok(out)
    }

    /// Decodes and validates serialized bytes. See [`ContainerView::parse`].
    ///
    /// # Errors
    /// Same as [`ContainerView::parse`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self, VaultError> {
        ContainerView::parse(bytes).map(|view| view.to_container())
    }

    /// Header fields of this container.
    #[must_use]
    pub fn header(&self) -> ContainerHeader {
        ContainerHeader {
            version: self.version,
            iterations: self.iterations,
            salt: self.salt,
            nonce: self.nonce,
            ciphertext_len: u32::try_from(self.ciphertext.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Validates `bytes` and returns only its header, e.g. for display.
///
/// # Errors
/// Same as [`ContainerView::parse`].
pub fn inspect(bytes: &[u8]) -> Result<ContainerHeader, VaultError> {
    ContainerView::parse(bytes).map(|view| view.header)
}

fn corruption(message: &'static str) -> VaultError {
    VaultError::Corruption { message: Cow::Borrowed(message), context: None }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], VaultError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len()).ok_or_else(
            || VaultError::Corruption {
                message: "truncated container".into(),
                context: Some(format!("reading {field} at offset {}", self.offset).into()),
            },
        )?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], VaultError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u32_be(&mut self, field: &'static str) -> Result<u32, VaultError> {
        self.array::<4>(field).map(u32::from_be_bytes)
    }
}
