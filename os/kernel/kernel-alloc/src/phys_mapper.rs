//! # Identity PhysMapper
//!
//! Before paging is enabled every physical address is also a valid pointer,
//! and afterwards the low identity map keeps that true for the first 4 MiB
//! (see [`Vmm::identity_map_low_memory`](crate::vmm::Vmm::identity_map_low_memory)).
//! Page-table frames come from the frame allocator above the reserved low
//! memory, so this mapper is only valid while paging is still off, which is
//! where the kernel builds its tables.

use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] that treats a physical address as a pointer.
///
/// # Safety
/// Only sound while the referenced range is identity mapped (or paging is
/// disabled).
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_u32() as usize as *mut T;
        // SAFETY: caller guarantees the address is reachable untranslated.
        unsafe { &mut *ptr }
    }
}
