//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for 32-bit addresses used by the paging, frame
//! allocator and heap code. They are zero-cost `#[repr(transparent)]`
//! wrappers around `u32` that keep virtual and physical addresses from being
//! mixed up at compile time.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory. |
//! | [`VirtualAddress`] | A byte address as seen through the page tables. |
//! | [`PhysicalFrame`] | The index of a 4 KiB physical frame (`address / 4096`). |
//!
//! ## Two-Level Split
//!
//! A virtual address decomposes into a page directory index, a page table
//! index and an in-page offset:
//!
//! ```text
//!  31            22 21            12 11             0
//! ┌────────────────┬────────────────┬────────────────┐
//! │ directory (10) │   table (10)   │  offset (12)   │
//! └────────────────┴────────────────┴────────────────┘
//! ```
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_3123);
//! assert_eq!(va.directory_index(), 1);
//! assert_eq!(va.table_index(), 3);
//! assert_eq!(va.page_offset(), 0x123);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_frame;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use virtual_address::VirtualAddress;

/// Size of a 4 KiB page or frame in bytes.
pub use kernel_info::memory::PAGE_SIZE;

/// Round `x` up to the next multiple of `align` (a power of two).
///
/// Saturates to the highest aligned value instead of wrapping.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(13, 4), 16);
/// assert_eq!(align_up(16, 4), 16);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    match x.checked_add(align - 1) {
        Some(v) => v & !(align - 1),
        None => u32::MAX & !(align - 1),
    }
}

/// Round `x` down to the previous multiple of `align` (a power of two).
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0x1FFF, 0x1000), 0x1000);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    x & !(align - 1)
}
