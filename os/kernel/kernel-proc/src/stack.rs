use crate::MemoryRegion;
use kernel_alloc::HeapAllocator;

/// Source of process stacks and per-process heap regions.
pub trait RegionAllocator {
    /// A region of at least `size` bytes, or `None` if memory is exhausted.
    fn allocate_region(&mut self, size: u32) -> Option<MemoryRegion>;

    /// Give a region back. Regions are only released once.
    fn release_region(&mut self, region: MemoryRegion);
}

/// Regions are reserved blocks, so a stray `free` of a stack base fails
/// instead of pulling the stack out from under its process.
impl<const N: usize> RegionAllocator for HeapAllocator<N> {
    fn allocate_region(&mut self, size: u32) -> Option<MemoryRegion> {
        let base = self.reserve(size).ok()?;
        // Report the size the block actually holds; it may have been rounded.
        let size = self.block_at(base).map_or(size, |block| block.size);
        Some(MemoryRegion::new(base, size))
    }

    fn release_region(&mut self, region: MemoryRegion) {
        if let Err(e) = self.release(region.base) {
            log::error!("Failed to release region at {}: {e}", region.base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::HeapError;
    use kernel_memory_addresses::VirtualAddress;

    #[test]
    fn heap_regions_round_trip() {
        let mut heap = HeapAllocator::<16>::new(VirtualAddress::new(0x20_0000), 0x2000).unwrap();
        let before = heap.free_bytes();

        let region = heap.allocate_region(4096).unwrap();
        assert_eq!(region.size, 4096);
        assert_eq!(region.top().as_u32(), region.base.as_u32() + 4096);
        assert!(heap.free_bytes() < before);

        assert_eq!(
            heap.free(region.base),
            Err(HeapError::Reserved(region.base))
        );

        heap.release_region(region);
        assert_eq!(heap.free_bytes(), before);
    }

    #[test]
    fn exhaustion_is_none() {
        let mut heap = HeapAllocator::<16>::new(VirtualAddress::new(0x20_0000), 0x1000).unwrap();
        assert!(heap.allocate_region(0x2000).is_none());
        assert!(heap.allocate_region(0).is_none());
    }
}
