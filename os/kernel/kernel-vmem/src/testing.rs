//! Host-side stand-ins for physical memory.
//!
//! Only compiled for tests and with the `testing` feature, so dependent
//! crates can exercise real page-table walks on the host.

use crate::{FrameAlloc, PhysMapper};
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};

/// A 4 KiB-aligned raw frame.
#[repr(C, align(4096))]
struct Frame4K([u8; PAGE_SIZE as usize]);

/// A window of simulated physical memory starting at `base`.
///
/// Physical addresses inside `base .. base + count * 4096` resolve to the
/// matching byte of the backing buffer; anything else panics.
pub struct FramePool {
    base: PhysicalAddress,
    frames: Vec<UnsafeCell<Frame4K>>,
}

impl FramePool {
    #[must_use]
    pub fn new(base: PhysicalAddress, count: usize) -> Self {
        assert!(base.is_page_aligned());
        let frames = (0..count)
            .map(|_| UnsafeCell::new(Frame4K([0; PAGE_SIZE as usize])))
            .collect();
        Self { base, frames }
    }

    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// One past the last simulated byte.
    #[must_use]
    pub fn end(&self) -> PhysicalAddress {
        self.base + (self.frames.len() as u32) * PAGE_SIZE
    }

    #[must_use]
    pub fn contains(&self, pa: PhysicalAddress) -> bool {
        pa >= self.base && pa < self.end()
    }
}

impl PhysMapper for FramePool {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert!(self.contains(pa), "{pa:?} outside the simulated pool");
        let rel = (pa.as_u32() - self.base.as_u32()) as usize;
        let idx = rel / PAGE_SIZE as usize;
        let off = rel % PAGE_SIZE as usize;
        debug_assert!(off + size_of::<T>() <= PAGE_SIZE as usize);

        // SAFETY: the caller promises `T` matches the bytes and is not aliased.
        unsafe { &mut *self.frames[idx].get().cast::<u8>().add(off).cast::<T>() }
    }
}

/// Hands out the frames of a [`FramePool`] in order, never reusing any.
pub struct BumpAlloc {
    next: u32,
    end: u32,
}

impl BumpAlloc {
    #[must_use]
    pub fn over(pool: &FramePool) -> Self {
        Self {
            next: pool.base().as_u32(),
            end: pool.end().as_u32(),
        }
    }

    /// Frames still available.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        (self.end - self.next) / PAGE_SIZE
    }
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
        if self.next + PAGE_SIZE > self.end {
            return None;
        }
        let frame = PhysicalAddress::new(self.next).frame();
        self.next += PAGE_SIZE;
        Some(frame)
    }
}
