use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// A single 32-bit x86 paging entry in its raw bitfield form.
///
/// The same layout serves page directory entries (pointing at a page table)
/// and page table entries (mapping one 4 KiB frame). It doubles as the flag
/// set passed to [`AddressSpace::map_one`](crate::AddressSpace::map_one):
/// only the low 12 bits of a flag value are used, the frame field is filled
/// in by the mapping code.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `P`             | Present |
/// | 1     | `RW`            | Writable |
/// | 2     | `US`            | User-mode accessible |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Cache disabled |
/// | 5     | `A`             | Accessed (set by the CPU) |
/// | 6     | `D`             | Dirty (set by the CPU, leaf only) |
/// | 7     | `PS`            | 4 MiB page (directory only, unused here) |
/// | 8     | `G`             | Global (leaf only) |
/// | 9–11  | available       | Reserved for OS use |
/// | 12–31 | `frame`         | Physical frame number |
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// # use kernel_memory_addresses::PhysicalAddress;
/// let e = PageEntryBits::new_kernel_rw().with_physical_address(PhysicalAddress::new(0x0030_0000));
/// assert!(e.present() && e.writable());
/// assert_eq!(e.physical_address().as_u32(), 0x0030_0000);
/// assert_eq!(u32::from(e), 0x0030_0003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    pub accessed: bool,

    /// Dirty (D, bit 6), leaf only.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Always clear: only 4 KiB pages are mapped.
    pub large_page: bool,

    /// Global (G, bit 8), leaf only.
    ///
    /// Survives a page directory reload when `CR4.PGE` is set.
    pub global: bool,

    /// Available to the OS (bits 9..11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame number (bits 12..31).
    #[bits(20)]
    frame: u32,
}

impl PageEntryBits {
    /// Mask of the flag bits (everything but the frame number).
    pub const FLAGS_MASK: u32 = 0x0000_0FFF;

    /// Present + writable, supervisor only.
    #[must_use]
    pub const fn new_kernel_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// Present + writable + global, for the low identity map.
    #[must_use]
    pub const fn new_kernel_rw_global() -> Self {
        Self::new_kernel_rw().with_global(true)
    }

    /// Present + writable + user, for user pages and directory links.
    #[must_use]
    pub const fn new_user_rw() -> Self {
        Self::new_kernel_rw().with_user(true)
    }

    /// The frame this entry points at.
    #[inline]
    #[must_use]
    pub const fn physical_frame(self) -> PhysicalFrame {
        PhysicalFrame::new(self.frame())
    }

    /// The base address of the frame this entry points at.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        self.physical_frame().base()
    }

    /// Replace the frame field; the page offset of `pa` is discarded.
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, pa: PhysicalAddress) -> Self {
        self.with_frame(pa.frame().index())
    }

    #[inline]
    pub fn set_physical_address(&mut self, pa: PhysicalAddress) {
        self.set_frame(pa.frame().index());
    }

    /// Only the flag bits; the frame field is cleared.
    #[inline]
    #[must_use]
    pub const fn flags_only(self) -> Self {
        Self::from_bits(self.into_bits() & Self::FLAGS_MASK)
    }
}
