//! # Kernel Configuration
//!
//! Compile-time layout and sizing constants shared by every kernel crate.
//! Nothing here is computed at runtime; the runtime knobs that can be
//! overridden at boot live in `kernel::config` and default to these values.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1 MiB)        │  frame 0 never handed out
//! KERNEL_START├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │  mapped PRESENT | WRITABLE
//! HEAP_START  ├─────────────────────────────────┤ 0x0020_0000 (2 MiB)
//!             │       Kernel Heap               │  block-list heap window
//!             ├─────────────────────────────────┤ 0x0030_0000 (3 MiB)
//!             │       (identity mapped)         │
//! IDENTITY_END├─────────────────────────────────┤ 0x0040_0000 (4 MiB)
//!             │       Reserved Boot Memory      │
//! RESERVED    ├─────────────────────────────────┤ 0x0060_0000 (6 MiB)
//!             │       Frame Allocator Pool      │  handed out by the bitmap
//! CEILING     └─────────────────────────────────┘ 0x1000_0000 (256 MiB)
//! ```
//!
//! ## Modules
//!
//! * [`memory`]: page geometry, physical layout and paging windows.
//! * [`process`]: process table capacity, stack and time-slice defaults,
//!   initial register values for freshly created processes.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod process;
