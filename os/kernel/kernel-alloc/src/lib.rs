//! # Kernel Memory Allocation
//!
//! The three allocators the kernel core is built on:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Kernel Heap ([`heap`])              │
//! │    • first-fit block list over a fixed window       │
//! │    • split on allocate, coalesce on free            │
//! │    • process stacks, kmalloc/kfree                  │
//! └─────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────┐
//! │         Virtual Memory Manager ([`vmm`])            │
//! │    • page directory + page tables                   │
//! │    • identity and kernel image maps                 │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ table frames
//! ┌─────────────────▼───────────────────────────────────┐
//! │        Physical Frame Allocator ([`frame_alloc`])   │
//! │    • one bit per 4 KiB frame, lowest index first    │
//! │    • low memory reserved at boot                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The heap is independent of the other two: it manages a window that the
//! boot code already identity maps, and it never touches the memory it hands
//! out. None of the allocators block or retry; exhaustion is reported as an
//! error and the caller decides what to do.
//!
//! ## Concurrency
//!
//! The allocators are plain `&mut self` state. The kernel keeps them inside
//! its context object behind a `kernel_sync::SpinLock`, locked with
//! interrupts disabled, so a timer interrupt never observes a half-finished
//! bitmap update or block split.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_alloc;
pub mod heap;
pub mod phys_mapper;
pub mod vmm;

pub use frame_alloc::{BitmapFrameAlloc, FrameAllocError, FrameStats};
pub use heap::{BlockTag, HeapAllocator, HeapBlock, HeapError, HeapStats};
pub use phys_mapper::IdentityPhysMapper;
pub use vmm::{Vmm, VmmError};
