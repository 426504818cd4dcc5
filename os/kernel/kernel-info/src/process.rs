//! # Process Defaults

/// Capacity of the process table, idle process included.
pub const MAX_PROCESSES: usize = 64;

/// Longest process name in bytes; longer names are truncated.
pub const PROCESS_NAME_MAX: usize = 31;

/// Stack size handed to processes created without an explicit size.
pub const DEFAULT_STACK_SIZE: u32 = 4096;

/// Scheduler ticks a process may run before it is preempted.
pub const DEFAULT_TIME_SLICE: u32 = 10;

/// Bytes reserved at the top of every process stack for the exit frame
/// (return address, exit handler, argument, padding).
pub const EXIT_FRAME_SIZE: u32 = 16;

/// Flat kernel code segment selector.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

/// Flat kernel data segment selector.
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;

/// `EFLAGS` of a fresh process: reserved bit 1 plus `IF`.
pub const INITIAL_EFLAGS: u32 = 0x0202;

const _: () = {
    // The process table tracks slot occupancy in a single `u64`.
    assert!(MAX_PROCESSES <= 64);
    assert!(DEFAULT_STACK_SIZE > EXIT_FRAME_SIZE);
    assert!(DEFAULT_STACK_SIZE.is_multiple_of(16));
    assert!(DEFAULT_TIME_SLICE > 0);
};
