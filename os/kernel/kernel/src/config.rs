//! Boot-time knobs. Defaults come from `kernel_info`.

use kernel_info::memory::{KERNEL_HEAP_SIZE, KERNEL_HEAP_START, RESERVED_LOW_MEMORY};
use kernel_info::process::{DEFAULT_STACK_SIZE, DEFAULT_TIME_SLICE};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_proc::{Preemption, TableConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelConfig {
    /// Start of the kernel heap window. Must be identity mapped.
    pub heap_start: VirtualAddress,
    pub heap_size: u32,
    /// Physical memory below this is never handed out by the frame allocator.
    pub reserved_memory: PhysicalAddress,
    /// Time-slice quantum in scheduler ticks.
    pub time_slice: u32,
    pub stack_size: u32,
    /// Private heap region given to every spawned process; `0` for none.
    pub process_heap_size: u32,
    pub preemption: Preemption,
    /// Where a process's entry function returns to.
    pub exit_handler: u32,
    /// Load the page directory and turn paging on at boot.
    pub enable_paging: bool,
}

impl KernelConfig {
    #[must_use]
    pub const fn table_config(&self) -> TableConfig {
        TableConfig {
            time_slice: self.time_slice,
            stack_size: self.stack_size,
            exit_handler: self.exit_handler,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            heap_start: VirtualAddress::new(KERNEL_HEAP_START),
            heap_size: KERNEL_HEAP_SIZE,
            reserved_memory: PhysicalAddress::new(RESERVED_LOW_MEMORY),
            time_slice: DEFAULT_TIME_SLICE,
            stack_size: DEFAULT_STACK_SIZE,
            process_heap_size: 0,
            preemption: Preemption::Cooperative,
            exit_handler: 0,
            enable_paging: false,
        }
    }
}
