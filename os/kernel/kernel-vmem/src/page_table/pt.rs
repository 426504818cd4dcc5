//! Page table (leaf level).
//!
//! Every present entry maps exactly one 4 KiB frame. After modifying active
//! mappings the caller must perform any required TLB maintenance.

use crate::PageEntryBits;
use kernel_info::memory::PAGE_TABLE_ENTRIES;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Index into a page table (VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.table_index() as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < PAGE_TABLE_ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A page table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

impl PtEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Leaf entry for the frame containing `pa`.
    ///
    /// `flags` is taken verbatim (only its flag bits); a flag set without
    /// `present` yields a not-present entry that still records the frame.
    #[inline]
    #[must_use]
    pub const fn make_4k(pa: PhysicalAddress, flags: PageEntryBits) -> Self {
        Self(flags.flags_only().with_large_page(false).with_physical_address(pa))
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// If present, the mapped frame base and the entry flags.
    #[inline]
    #[must_use]
    pub const fn page_4k(self) -> Option<(PhysicalAddress, PageEntryBits)> {
        if self.is_present() {
            Some((self.0.physical_address(), self.0))
        } else {
            None
        }
    }

    /// Same entry with the present bit cleared; frame and flags stay.
    #[inline]
    #[must_use]
    pub const fn without_present(self) -> Self {
        Self(self.0.with_present(false))
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> PageEntryBits {
        self.0
    }
}

/// A page table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; PAGE_TABLE_ENTRIES],
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); PAGE_TABLE_ENTRIES],
        }
    }

    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Number of present leaves.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_present()).count()
    }
}

const _: () = assert!(size_of::<PageTable>() == 4096);
