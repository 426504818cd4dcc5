//! Bitmap physical frame allocator.
//!
//! One bit per 4 KiB frame (`1` = used) in 32-bit words. Allocation scans
//! word by word for the first word that is not all ones, then bit by bit for
//! the first clear bit, so frames are always handed out lowest index first.

use kernel_info::memory::FRAME_BITMAP_WORDS;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};
use kernel_vmem::FrameAlloc;

/// Returned when every tracked frame is in use.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("no free physical frame")]
    OutOfMemory,
}

/// Allocation counters; never reset.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    pub allocations: u64,
    pub deallocations: u64,
}

/// Bitmap over `WORDS * 32` frames starting at physical address 0.
///
/// Frame 0 is marked used on construction and is never handed out; a
/// `free` of frame 0 is ignored.
pub struct BitmapFrameAlloc<const WORDS: usize = FRAME_BITMAP_WORDS> {
    bitmap: [u32; WORDS],
    stats: FrameStats,
}

impl<const WORDS: usize> Default for BitmapFrameAlloc<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORDS: usize> BitmapFrameAlloc<WORDS> {
    /// Number of frames tracked.
    pub const FRAMES: u32 = (WORDS * 32) as u32;

    #[must_use]
    pub const fn new() -> Self {
        assert!(WORDS > 0);
        let mut bitmap = [0u32; WORDS];
        bitmap[0] = 1;
        Self {
            bitmap,
            stats: FrameStats {
                allocations: 0,
                deallocations: 0,
            },
        }
    }

    #[inline]
    const fn locate(frame: PhysicalFrame) -> Option<(usize, u32)> {
        let idx = frame.index();
        if idx >= Self::FRAMES {
            return None;
        }
        Some(((idx / 32) as usize, 1 << (idx % 32)))
    }

    /// Mark every frame overlapping `[start, end)` as used.
    ///
    /// Frames beyond the tracked range are skipped. Returns how many frames
    /// changed from free to used. Reservations do not count as allocations.
    pub fn reserve_range(&mut self, start: PhysicalAddress, end: PhysicalAddress) -> u32 {
        let first = start.frame().index();
        let last = end.as_u32().div_ceil(PAGE_SIZE).min(Self::FRAMES);
        let mut newly = 0;
        for idx in first..last {
            if let Some((word, bit)) = Self::locate(PhysicalFrame::new(idx))
                && self.bitmap[word] & bit == 0
            {
                self.bitmap[word] |= bit;
                newly += 1;
            }
        }
        newly
    }

    /// Hand out the lowest free frame.
    ///
    /// # Errors
    /// [`FrameAllocError::OutOfMemory`] when every frame is used.
    pub fn allocate(&mut self) -> Result<PhysicalFrame, FrameAllocError> {
        let (word, bits) = self
            .bitmap
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u32::MAX)
            .map(|(i, w)| (i, *w))
            .ok_or(FrameAllocError::OutOfMemory)?;

        let bit = bits.trailing_ones();
        self.bitmap[word] |= 1 << bit;
        self.stats.allocations += 1;
        Ok(PhysicalFrame::new(word as u32 * 32 + bit))
    }

    /// Return `frame` to the pool.
    ///
    /// Freeing an already free frame, frame 0, or a frame outside the
    /// tracked range is ignored.
    pub fn free(&mut self, frame: PhysicalFrame) {
        if frame.index() == 0 {
            return;
        }
        let Some((word, bit)) = Self::locate(frame) else {
            return;
        };
        if self.bitmap[word] & bit != 0 {
            self.bitmap[word] &= !bit;
            self.stats.deallocations += 1;
        }
    }

    /// Whether `frame` is currently marked used. Untracked frames report `false`.
    #[must_use]
    pub fn is_allocated(&self, frame: PhysicalFrame) -> bool {
        Self::locate(frame).is_some_and(|(word, bit)| self.bitmap[word] & bit != 0)
    }

    #[must_use]
    pub fn free_frames(&self) -> u32 {
        self.bitmap.iter().map(|w| w.count_zeros()).sum()
    }

    #[must_use]
    pub fn used_frames(&self) -> u32 {
        Self::FRAMES - self.free_frames()
    }

    #[must_use]
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }
}

impl<const WORDS: usize> FrameAlloc for BitmapFrameAlloc<WORDS> {
    fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
        self.allocate().ok()
    }
}
