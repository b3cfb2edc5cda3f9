use crate::error::{VaultError, VaultErrorExt};
use std::collections::BTreeMap;
use zeroize::Zeroize;

/// Size of one linear memory page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Largest page count whose every offset still fits into a `u32`.
pub const MAX_ADDRESSABLE_PAGES: u32 = 65_535;

/// Addresses below this are never handed out, so `ptr == 0` always means "no buffer".
const NULL_GUARD: u32 = 8;

const ALIGN: u32 = 8;

/// A byte range inside [`LinearMemory`], addressed by offset.
///
/// This is the only thing exchanged with the host: a pointer/length pair with no
/// ownership attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub ptr: u32,
    pub len: u32,
}

impl Region {
    /// The zero-length region; valid for every read and write of zero bytes.
    pub const EMPTY: Self = Self { ptr: 0, len: 0 };

    #[must_use]
    pub const fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packs into a single `u64` (`ptr << 32 | len`) for hosts that return one scalar.
    #[must_use]
    pub const fn pack(self) -> u64 {
        ((self.ptr as u64) << 32) | self.len as u64
    }

    /// Inverse of [`Region::pack`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn unpack(raw: u64) -> Self {
        Self { ptr: (raw >> 32) as u32, len: raw as u32 }
    }

    const fn end(self) -> u64 {
        self.ptr as u64 + self.len as u64
    }
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    len: u32,
    size: u32,
}

/// Page-granular byte arena shared between the engine and its host.
///
/// Allocation is first-fit over an address-ordered free list; released blocks are zeroed
/// and coalesced with their neighbours. The arena grows a page at a time up to a fixed
/// maximum and never shrinks.
pub struct LinearMemory {
    bytes: Vec<u8>,
    max_pages: u32,
    free: BTreeMap<u32, u32>,
    live: BTreeMap<u32, Allocation>,
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("pages", &self.pages())
            .field("max_pages", &self.max_pages)
            .field("live", &self.live.len())
            .field("free_blocks", &self.free.len())
            .finish()
    }
}

impl Drop for LinearMemory {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl LinearMemory {
    /// Creates an arena of `initial_pages`, allowed to grow to `max_pages`.
    ///
    /// # Errors
    /// * [`VaultError::InvalidConfiguration`] if the page counts are inconsistent.
    /// * [`VaultError::Allocation`] if the initial pages cannot be reserved.
    pub fn new(initial_pages: u32, max_pages: u32) -> Result<Self, VaultError> {
        if initial_pages == 0 || initial_pages > max_pages || max_pages > MAX_ADDRESSABLE_PAGES {
            return Err(VaultError::InvalidConfiguration {
                message: format!("invalid page limits: initial={initial_pages}, max={max_pages}")
                    .into(),
                context: None,
            });
        }

        let mut memory =
            Self { bytes: Vec::new(), max_pages, free: BTreeMap::new(), live: BTreeMap::new() };
        memory.grow(initial_pages)?;
        Ok(memory)
    }

    /// Current number of pages.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    /// Current size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of regions handed out and not yet released.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Reserves `len` bytes, growing the arena if no free block is large enough.
    ///
    /// A zero-length request yields [`Region::EMPTY`].
    ///
    /// # Errors
    /// [`VaultError::Allocation`] when the request cannot be met within `max_pages`.
    pub fn alloc(&mut self, len: u32) -> Result<Region, VaultError> {
        if len == 0 {
            return Ok(Region::EMPTY);
        }

        let size = len.checked_next_multiple_of(ALIGN).ok_or_else(|| exhausted(len))?;

        let ptr = match self.first_fit(size) {
            Some(ptr) => ptr,
            None => {
                self.grow_for(size).map_err(|_| exhausted(len))?;
                self.first_fit(size).ok_or_else(|| exhausted(len))?
            },
        };

        self.live.insert(ptr, Allocation { len, size });
        Ok(Region { ptr, len })
    }

    /// Returns `region` to the free list after zeroing it.
    ///
    /// Releasing [`Region::EMPTY`] is a no-op.
    ///
    /// # Errors
    /// [`VaultError::InvalidBuffer`] if `region` was not returned by [`LinearMemory::alloc`]
    /// or was already released.
    pub fn release(&mut self, region: Region) -> Result<(), VaultError> {
        if region.is_empty() {
            return Ok(());
        }

        let allocation = match self.live.get(&region.ptr) {
            Some(allocation) if allocation.len == region.len => *allocation,
            _ => {
                return Err(VaultError::InvalidBuffer {
                    message: "release of an unknown region".into(),
                    context: Some(format!("ptr={}, len={}", region.ptr, region.len).into()),
                });
            },
        };

        self.live.remove(&region.ptr);
        let start = region.ptr as usize;
        self.bytes[start..start + allocation.size as usize].fill(0);
        self.insert_free(region.ptr, allocation.size);
        Ok(())
    }

    /// Borrows the bytes of `region`.
    ///
    /// # Errors
    /// [`VaultError::InvalidBuffer`] if the region is not fully inside the arena.
    pub fn read(&self, region: Region) -> Result<&[u8], VaultError> {
        let range = self.checked_range(region)?;
        Ok(&self.bytes[range])
    }

    /// Mutably borrows the bytes of `region`.
    ///
    /// # Errors
    /// [`VaultError::InvalidBuffer`] if the region is not fully inside the arena.
    pub fn read_mut(&mut self, region: Region) -> Result<&mut [u8], VaultError> {
        let range = self.checked_range(region)?;
        Ok(&mut self.bytes[range])
    }

    /// Copies `data` into `region`; the lengths must match.
    ///
    /// # Errors
    /// [`VaultError::InvalidBuffer`] on a length mismatch or an out-of-bounds region.
    pub fn write(&mut self, region: Region, data: &[u8]) -> Result<(), VaultError> {
        if data.len() != region.len as usize {
            return Err(VaultError::InvalidBuffer {
                message: "write length does not match region".into(),
                context: Some(format!("region={}, data={}", region.len, data.len()).into()),
            });
        }
        self.read_mut(region)?.copy_from_slice(data);
        Ok(())
    }

    fn checked_range(&self, region: Region) -> Result<std::ops::Range<usize>, VaultError> {
        if region.is_empty() {
            return Ok(0..0);
        }
        if region.ptr < NULL_GUARD || region.end() > self.bytes.len() as u64 {
            return Err(VaultError::InvalidBuffer {
                message: "region outside linear memory".into(),
                context: Some(
                    format!(
                        "ptr={}, len={}, memory={}",
                        region.ptr,
                        region.len,
                        self.bytes.len()
                    )
                    .into(),
                ),
            });
        }
        let start = region.ptr as usize;
        Ok(start..start + region.len as usize)
    }

    fn first_fit(&mut self, size: u32) -> Option<u32> {
        let (&ptr, &block) = self.free.iter().find(|(_, block)| **block >= size)?;
        self.free.remove(&ptr);
        if block > size {
            self.free.insert(ptr + size, block - size);
        }
        Some(ptr)
    }

    /// Grows just enough for a `size`-byte block at the end of the arena.
    fn grow_for(&mut self, size: u32) -> Result<(), VaultError> {
        let end = self.bytes.len() as u64;
        let tail_free = self
            .free
            .iter()
            .next_back()
            .filter(|(ptr, block)| u64::from(**ptr) + u64::from(**block) == end)
            .map_or(0, |(_, block)| *block);

        let missing = (size - tail_free) as usize;
        let pages = u32::try_from(missing.div_ceil(PAGE_SIZE)).map_err(|_| exhausted(size))?;
        self.grow(pages)
    }

    /// Zeroes the whole arena, live regions included.
    fn wipe(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }

    fn grow(&mut self, pages: u32) -> Result<(), VaultError> {
        let target = self.pages().checked_add(pages).filter(|total| *total <= self.max_pages);
        let Some(target) = target else {
            return Err(VaultError::Allocation {
                message: "linear memory limit reached".into(),
                context: Some(
                    format!("{} + {pages} pages exceeds {}", self.pages(), self.max_pages).into(),
                ),
            });
        };

        let old_len = self.bytes.len();
        let new_len = (target as usize).checked_mul(PAGE_SIZE).ok_or_else(|| exhausted(pages))?;

        // Moved rather than reallocated in place, so the old block can be wiped.
        let mut grown = crate::buffer::reserve(new_len)
            .context(format!("growing linear memory to {target} pages"))?;
        grown.extend_from_slice(&self.bytes);
        grown.resize(new_len, 0);
        std::mem::replace(&mut self.bytes, grown).zeroize();

        let start = u32::try_from(old_len).map_err(|_| exhausted(pages))?.max(NULL_GUARD);
        let end = u32::try_from(new_len).map_err(|_| exhausted(pages))?;
        self.insert_free(start, end - start);
        Ok(())
    }

    fn insert_free(&mut self, mut ptr: u32, mut size: u32) {
        if let Some((&prev, &prev_size)) = self.free.range(..ptr).next_back()
            && prev + prev_size == ptr
        {
            self.free.remove(&prev);
            ptr = prev;
            size += prev_size;
        }

        if let Some(next_size) = ptr.checked_add(size).and_then(|end| self.free.remove(&end)) {
            size += next_size;
        }

        self.free.insert(ptr, size);
    }
}

fn exhausted(len: u32) -> VaultError {
    VaultError::Allocation {
        message: "linear memory exhausted".into(),
        context: Some(format!("{len} bytes requested").into()),
    }
}
