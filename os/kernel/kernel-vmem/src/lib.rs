//! # Virtual Memory Support
//!
//! Two-level 32-bit x86 paging for the kernel.
//!
//! ## What you get
//! - An [`AddressSpace`] rooted at a page directory, with
//!   [`map_one`](AddressSpace::map_one), [`unmap_one`](AddressSpace::unmap_one),
//!   [`query`](AddressSpace::query) and a separate, explicit
//!   [`activate`](AddressSpace::activate).
//! - [`PageEntryBits`], the raw entry layout that is also used as the flag set.
//! - 4 KiB-aligned [`PageDirectory`] and [`PageTable`] wrappers.
//! - The small capability traits the paging code needs from its environment:
//!   [`FrameAlloc`] (where table frames come from), [`PhysMapper`] (how a
//!   physical frame is reached before and after paging is on) and
//!   [`PagingControl`] (loading `CR3` and setting `CR0.PG`).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  Dir  | Table | Offset |
//! ```
//!
//! The directory entry selected by bits 31‒22 links to a page table; the
//! table entry selected by bits 21‒12 holds the frame number; bits 11‒0 pick
//! the byte inside the frame. Each table is 1024 entries of 4 bytes, so one
//! directory entry covers 4 MiB.
//!
//! ## Construction vs. activation
//!
//! Tables are built and can be inspected with [`AddressSpace::query`] long
//! before the CPU ever walks them. Loading the root and enabling paging is a
//! separate `unsafe` step so a kernel can validate its tables first.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_entry_bits;
pub mod page_table;
mod paging;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(any(test, feature = "testing"))]
extern crate alloc;

pub use crate::address_space::{AddressSpace, MappedTable, VmemError};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry};
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use crate::paging::X86Paging;
pub use crate::paging::PagingControl;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Source of **physical** 4 KiB frames for page tables.
///
/// The implementation decides where frames come from (bitmap, bump pool).
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB physical frame.
    fn alloc_4k(&mut self) -> Option<PhysicalFrame>;
}

/// Converts physical addresses to usable references in the current address
/// space.
///
/// Before paging is enabled (and afterwards, inside the identity-mapped low
/// region) this is the identity. Tests substitute a Vec-backed pool.
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference.
    ///
    /// # Safety
    /// - `pa` must be reachable and writable through this mapper.
    /// - `T` must match the bytes at `pa`, and no other live reference may
    ///   alias them for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Borrow the page directory stored in `frame`.
///
/// # Safety
/// `frame` must hold a page directory reachable through `m`.
#[inline]
unsafe fn directory_mut<'a, M: PhysMapper>(m: &M, frame: PhysicalFrame) -> &'a mut PageDirectory {
    unsafe { m.phys_to_mut::<PageDirectory>(frame.base()) }
}

/// Borrow the page table stored in `frame`.
///
/// # Safety
/// `frame` must hold a page table reachable through `m`.
#[inline]
unsafe fn table_mut<'a, M: PhysMapper>(m: &M, frame: PhysicalFrame) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(frame.base()) }
}
