//! # Address Space (32-bit x86, directory-rooted)
//!
//! Helpers to build and inspect a **single** virtual address space: a page
//! directory plus the page tables it links to.
//!
//! ## Highlights
//!
//! - [`AddressSpace::map_one`] installs one 4 KiB mapping, creating the page
//!   table for the directory slot on first use.
//! - [`AddressSpace::map_region`] maps a run of pages (identity and kernel
//!   image maps at boot).
//! - [`AddressSpace::unmap_one`] clears the present bit of one leaf.
//! - [`AddressSpace::query`] translates a VA to a PA.
//! - [`AddressSpace::activate`] hands the directory to the CPU.
//!
//! ## Design
//!
//! - Directory links are created present + writable + user; leaf flags come
//!   from the mapping call verbatim.
//! - Unmapping never frees page tables; their frames stay owned by the
//!   address space.
//! - `unsafe` is confined to turning a frame into a typed table through the
//!   [`PhysMapper`].
//!
//! ## Safety
//!
//! - Mutating active mappings requires TLB maintenance (`invlpg` or a `CR3`
//!   reload) by the caller.
//! - The provided `PhysMapper` must yield **writable** references to table
//!   frames.

use crate::page_table::pd::{DirectoryIndex, PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry};
use crate::page_table::split_indices;
use crate::{FrameAlloc, PageEntryBits, PagingControl, PhysMapper, directory_mut, table_mut};
use kernel_info::memory::{BYTES_PER_TABLE, PAGE_TABLE_ENTRIES};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame, VirtualAddress};

/// Failures of address-space operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmemError {
    #[error("no physical frame left for a page table")]
    OutOfMemory,
    #[error("{0} is not mapped")]
    NotMapped(VirtualAddress),
}

/// One page table linked from the directory.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MappedTable {
    /// First virtual address the table covers.
    pub base: VirtualAddress,
    /// Frame holding the table.
    pub frame: PhysicalFrame,
    /// Present leaves in the table.
    pub present_pages: usize,
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalFrame,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Allocate and zero a fresh page directory.
    ///
    /// # Errors
    /// [`VmemError::OutOfMemory`] if `alloc` has no frame left.
    pub fn new<A: FrameAlloc>(mapper: &'m M, alloc: &mut A) -> Result<Self, VmemError> {
        let root = alloc.alloc_4k().ok_or(VmemError::OutOfMemory)?;
        // SAFETY: the frame was just handed to us and nothing else refers to it.
        unsafe { directory_mut(mapper, root) }.zero();
        log::trace!("page directory at {:?}", root.base());
        Ok(Self { root, mapper })
    }

    /// Wrap an existing page directory.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalFrame) -> Self {
        Self { root, mapper }
    }

    /// Frame holding the page directory.
    #[inline]
    pub const fn root(&self) -> PhysicalFrame {
        self.root
    }

    #[inline]
    fn directory(&self) -> &mut PageDirectory {
        // SAFETY: `root` always holds a page directory owned by this space.
        unsafe { directory_mut(self.mapper, self.root) }
    }

    #[inline]
    fn table(&self, frame: PhysicalFrame) -> &mut PageTable {
        // SAFETY: only frames linked from our directory are passed here.
        unsafe { table_mut(self.mapper, frame) }
    }

    /// Return the page table for `va`'s directory slot, creating it if needed.
    fn ensure_table<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<&mut PageTable, VmemError> {
        let (di, _) = split_indices(va);
        let dir = self.directory();
        if let Some(frame) = dir.get(di).next_table() {
            return Ok(self.table(frame));
        }

        let frame = alloc.alloc_4k().ok_or(VmemError::OutOfMemory)?;
        let table = self.table(frame);
        table.zero();
        dir.set(di, PdEntry::table_link(frame));
        Ok(table)
    }

    /// Map **one** 4 KiB page at `va → pa` with `flags`.
    ///
    /// Offsets within the page are ignored for both addresses. Remapping an
    /// already mapped page overwrites the leaf.
    ///
    /// # Errors
    /// [`VmemError::OutOfMemory`] if a page table was needed and `alloc` is
    /// exhausted. Nothing is modified in that case.
    pub fn map_one<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
    ) -> Result<(), VmemError> {
        let (_, ti) = split_indices(va);
        let table = self.ensure_table(alloc, va)?;
        table.set(ti, PtEntry::make_4k(pa, flags));
        Ok(())
    }

    /// Map `len` bytes starting at `va → pa`, page by page.
    ///
    /// Returns the number of pages mapped.
    ///
    /// # Errors
    /// Stops at the first failing page and propagates its error; pages
    /// mapped before it remain mapped.
    pub fn map_region<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        len: u32,
        flags: PageEntryBits,
    ) -> Result<u32, VmemError> {
        let pages = len.div_ceil(PAGE_SIZE);
        for i in 0..pages {
            let off = i * PAGE_SIZE;
            self.map_one(alloc, va + off, pa + off, flags)?;
        }
        Ok(pages)
    }

    /// Clear the present bit of the leaf that maps `va`.
    ///
    /// The page table itself is kept.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if no page table covers `va` or the leaf is
    /// not present.
    pub fn unmap_one(&self, va: VirtualAddress) -> Result<(), VmemError> {
        let (di, ti) = split_indices(va);
        let frame = self
            .directory()
            .get(di)
            .next_table()
            .ok_or(VmemError::NotMapped(va))?;

        let table = self.table(frame);
        let entry = table.get(ti);
        if !entry.is_present() {
            return Err(VmemError::NotMapped(va));
        }
        table.set(ti, entry.without_present());
        Ok(())
    }

    /// The leaf entry for `va`, present or not, if a page table covers it.
    #[must_use]
    pub fn leaf(&self, va: VirtualAddress) -> Option<PageEntryBits> {
        let (di, ti) = split_indices(va);
        let frame = self.directory().get(di).next_table()?;
        Some(self.table(frame).get(ti).bits())
    }

    /// Translate a `VirtualAddress` to a `PhysicalAddress` if mapped.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (di, ti) = split_indices(va);
        let frame = self.directory().get(di).next_table()?;
        let (base, _) = self.table(frame).get(ti).page_4k()?;
        Some(base + va.page_offset())
    }

    /// Number of page tables linked from the directory.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.directory().present_count()
    }

    /// Page tables linked from the directory, lowest address first.
    pub fn tables(&self) -> impl Iterator<Item = MappedTable> + use<'m, M> {
        let space = Self::from_root(self.mapper, self.root);
        (0..PAGE_TABLE_ENTRIES).filter_map(move |i| {
            let index = u16::try_from(i).ok()?;
            let frame = space.directory().get(DirectoryIndex::new(index)).next_table()?;
            Some(MappedTable {
                base: VirtualAddress::new(u32::from(index) * BYTES_PER_TABLE),
                frame,
                present_pages: space.table(frame).present_count(),
            })
        })
    }

    /// Load this directory and turn paging on.
    ///
    /// # Safety
    /// The tables must map the executing code, its stack and everything the
    /// kernel touches afterwards; see [`PagingControl`].
    pub unsafe fn activate<P: PagingControl>(&self, paging: &mut P) {
        log::debug!("activating page directory at {:?}", self.root.base());
        unsafe {
            paging.load_directory(self.root.base());
            paging.enable_paging();
        }
    }
}
