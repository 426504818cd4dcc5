//! # Memory Layout

/// Size of a page and of a physical frame.
pub const PAGE_SIZE: u32 = 4096;

/// Number of `log2(PAGE_SIZE)` bits in a page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Entries in a page directory and in a page table.
pub const PAGE_TABLE_ENTRIES: usize = 1024;

/// Bytes covered by one page directory entry (one full page table).
pub const BYTES_PER_TABLE: u32 = PAGE_SIZE * PAGE_TABLE_ENTRIES as u32;

/// Physical (and virtual) load address of the kernel image.
pub const KERNEL_START: u32 = 0x0010_0000; // 1 MiB

/// Bytes reserved for the kernel image.
pub const KERNEL_SIZE: u32 = 0x0010_0000; // 1 MiB

/// Start of the kernel heap window.
pub const KERNEL_HEAP_START: u32 = 0x0020_0000; // 2 MiB

/// Size of the kernel heap window.
pub const KERNEL_HEAP_SIZE: u32 = 0x0010_0000; // 1 MiB

/// Low memory that is identity mapped with global pages at boot.
pub const IDENTITY_MAP_BYTES: u32 = 0x0040_0000; // 4 MiB

/// Frames below this address are permanently marked used at boot.
///
/// Covers the kernel image, the heap window and the memory the early
/// boot code scribbles into before the frame allocator takes over.
pub const RESERVED_LOW_MEMORY: u32 = 0x0060_0000; // 6 MiB

/// Frames just above [`RESERVED_LOW_MEMORY`] that are identity mapped when
/// paging is turned on, so page tables stay reachable afterwards.
///
/// The frame allocator hands out lowest-first, so the boot page tables land
/// here.
pub const PAGE_TABLE_POOL_BYTES: u32 = 0x0001_0000; // 64 KiB

/// Upper bound of physical memory tracked by the frame bitmap.
pub const PHYSICAL_MEMORY_CEILING: u32 = 0x1000_0000; // 256 MiB

/// Number of physical frames tracked by the frame bitmap.
pub const PHYSICAL_FRAMES: usize = (PHYSICAL_MEMORY_CEILING / PAGE_SIZE) as usize;

/// Number of 32-bit words in the frame bitmap.
pub const FRAME_BITMAP_WORDS: usize = PHYSICAL_FRAMES / 32;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(KERNEL_START.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_HEAP_START >= KERNEL_START + KERNEL_SIZE);
    assert!(KERNEL_HEAP_START.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_HEAP_START + KERNEL_HEAP_SIZE <= IDENTITY_MAP_BYTES);
    assert!(IDENTITY_MAP_BYTES.is_multiple_of(BYTES_PER_TABLE));
    assert!(RESERVED_LOW_MEMORY >= KERNEL_HEAP_START + KERNEL_HEAP_SIZE);
    assert!(RESERVED_LOW_MEMORY < PHYSICAL_MEMORY_CEILING);
    assert!(PAGE_TABLE_POOL_BYTES.is_multiple_of(PAGE_SIZE));
    assert!(PHYSICAL_FRAMES.is_multiple_of(32));
};
