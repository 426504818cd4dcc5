//! Minimal virtual memory manager for the kernel's single address space.
//!
//! Bundles an [`AddressSpace`] with the frame allocator that feeds its page
//! tables, and knows the boot-time layout: a global identity map of the low
//! 4 MiB and a kernel-image map of 1 MiB..2 MiB.
//!
//! # Example
//! ```
//! use kernel_alloc::frame_alloc::BitmapFrameAlloc;
//! use kernel_alloc::vmm::Vmm;
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_vmem::testing::FramePool;
//!
//! let pool = FramePool::new(PhysicalAddress::new(0x4000), 4);
//! let mut frames = BitmapFrameAlloc::<1>::new();
//! frames.reserve_range(PhysicalAddress::new(0), PhysicalAddress::new(0x4000));
//!
//! let mut vmm = Vmm::new(&pool, &mut frames).unwrap();
//! vmm.build_kernel_mappings().unwrap();
//! assert_eq!(
//!     vmm.translate(VirtualAddress::new(0x0012_3456)),
//!     Some(PhysicalAddress::new(0x0012_3456))
//! );
//! ```

use kernel_info::memory::{IDENTITY_MAP_BYTES, KERNEL_SIZE, KERNEL_START};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
use kernel_vmem::{AddressSpace, FrameAlloc, PageEntryBits, PagingControl, PhysMapper, VmemError};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmmError {
    #[error("out of physical frames for page tables")]
    OutOfMemory,
    #[error("access to unmapped memory at {0}")]
    Unmapped(VirtualAddress),
    #[error("{0} is not page aligned")]
    Unaligned(VirtualAddress),
}

impl From<VmemError> for VmmError {
    fn from(e: VmemError) -> Self {
        match e {
            VmemError::OutOfMemory => Self::OutOfMemory,
            VmemError::NotMapped(va) => Self::Unmapped(va),
        }
    }
}

/// Minimal kernel virtual memory manager.
pub struct Vmm<'m, M: PhysMapper, A: FrameAlloc> {
    aspace: AddressSpace<'m, M>,
    alloc: &'m mut A,
}

impl<'m, M: PhysMapper, A: FrameAlloc> Vmm<'m, M, A> {
    /// Start a new address space with an empty page directory.
    ///
    /// # Errors
    /// [`VmmError::OutOfMemory`] if no frame is left for the directory.
    pub fn new(mapper: &'m M, alloc: &'m mut A) -> Result<Self, VmmError> {
        let aspace = AddressSpace::new(mapper, alloc)?;
        Ok(Self { aspace, alloc })
    }

    /// Reopen the address space rooted at `root`.
    pub const fn from_root(mapper: &'m M, alloc: &'m mut A, root: PhysicalFrame) -> Self {
        Self {
            aspace: AddressSpace::from_root(mapper, root),
            alloc,
        }
    }

    #[must_use]
    pub const fn root(&self) -> PhysicalFrame {
        self.aspace.root()
    }

    /// Map one page `va → pa` with `flags`.
    ///
    /// # Errors
    /// - [`VmmError::Unaligned`] if `va` is not page aligned.
    /// - [`VmmError::OutOfMemory`] if a page table could not be allocated.
    pub fn map(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
    ) -> Result<(), VmmError> {
        if !va.is_page_aligned() {
            return Err(VmmError::Unaligned(va));
        }
        Ok(self.aspace.map_one(self.alloc, va, pa, flags)?)
    }

    /// Unmap one page; the backing frame is not freed.
    ///
    /// # Errors
    /// [`VmmError::Unmapped`] if `va` is not mapped.
    pub fn unmap(&mut self, va: VirtualAddress) -> Result<(), VmmError> {
        Ok(self.aspace.unmap_one(va)?)
    }

    /// Translate VA→PA if mapped.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.aspace.query(va)
    }

    /// Flags of the leaf for `va`, present or not.
    #[must_use]
    pub fn leaf_flags(&self, va: VirtualAddress) -> Option<PageEntryBits> {
        self.aspace.leaf(va).map(PageEntryBits::flags_only)
    }

    /// Identity map `[0, 4 MiB)` as present + writable + global.
    ///
    /// # Errors
    /// [`VmmError::OutOfMemory`] if a page table could not be allocated.
    pub fn identity_map_low_memory(&mut self) -> Result<u32, VmmError> {
        Ok(self.aspace.map_region(
            self.alloc,
            VirtualAddress::new(0),
            PhysicalAddress::new(0),
            IDENTITY_MAP_BYTES,
            PageEntryBits::new_kernel_rw_global(),
        )?)
    }

    /// Map the kernel image `[1 MiB, 2 MiB)` as present + writable.
    ///
    /// # Errors
    /// [`VmmError::OutOfMemory`] if a page table could not be allocated.
    pub fn map_kernel_image(&mut self) -> Result<u32, VmmError> {
        Ok(self.aspace.map_region(
            self.alloc,
            VirtualAddress::new(KERNEL_START),
            PhysicalAddress::new(KERNEL_START),
            KERNEL_SIZE,
            PageEntryBits::new_kernel_rw(),
        )?)
    }

    /// Build both boot regions. The kernel image map is applied last, so
    /// its pages end up non-global.
    ///
    /// # Errors
    /// [`VmmError::OutOfMemory`] if a page table could not be allocated.
    pub fn build_kernel_mappings(&mut self) -> Result<(), VmmError> {
        let identity = self.identity_map_low_memory()?;
        let kernel = self.map_kernel_image()?;
        log::debug!(
            "kernel mappings built: {identity} identity pages, {kernel} kernel pages, {} tables",
            self.aspace.table_count()
        );
        Ok(())
    }

    /// Load the directory and enable paging.
    ///
    /// # Safety
    /// See [`AddressSpace::activate`].
    pub unsafe fn activate<P: PagingControl>(&self, paging: &mut P) {
        unsafe { self.aspace.activate(paging) }
    }
}
