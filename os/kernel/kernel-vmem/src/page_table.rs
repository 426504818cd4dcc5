//! # Page Directory and Page Table
//!
//! Both levels are 4 KiB-aligned arrays of 1024 [`PageEntryBits`]:
//!
//! ```text
//!  CR3 ──► PageDirectory[dir] ──► PageTable[table] ──► 4 KiB frame + offset
//! ```
//!
//! A present directory entry always links to a page table; 4 MiB pages
//! (`PS=1`) are never created.

pub mod pd;
pub mod pt;

use crate::page_table::pd::DirectoryIndex;
use crate::page_table::pt::TableIndex;
use kernel_memory_addresses::VirtualAddress;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirectoryIndex, TableIndex) {
    (DirectoryIndex::from(va), TableIndex::from(va))
}
