//! # Kernel Core
//!
//! Brings the memory manager and the process manager up in order and
//! exposes them through one context object:
//!
//! ```text
//!   Kernel::boot
//!     ├─ BitmapFrameAlloc   reserve low memory
//!     ├─ Vmm                page directory, identity + kernel image maps
//!     ├─ HeapAllocator      kernel heap window
//!     ├─ ProcessTable       idle process (PID 0)
//!     └─ Scheduler          round robin over the ready queue
//!
//!   syscall::handle ──┐
//!   shell::execute  ──┼──► &mut Kernel
//!   trap stubs      ──┘
//! ```
//!
//! Everything except [`entry`] is plain Rust over injected capabilities
//! (`PhysMapper`, `ContextSwitch`, `UserMemory`, `FrameMemory`) and runs
//! in host tests.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod config;
pub mod context;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod entry;
pub mod error;
pub mod kernel;
pub mod ports;
pub mod shell;
pub mod syscall;
mod trap;

pub use config::KernelConfig;
pub use context::{DirectFrameMemory, FrameMemory, TrapFrame, TrapFrameSwitch};
pub use error::BootError;
pub use kernel::{Kernel, MemoryReport};
