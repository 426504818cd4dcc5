//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock around a value.
//! * [`IrqGuard`]: disables interrupts for a scope and restores the previous
//!   state on drop. On hosted targets it only tracks state, so host tests
//!   never execute privileged instructions.
//! * [`SpinLock::lock_irq`]: both at once, for kernel state that interrupt
//!   handlers also touch (the scheduler and the heap).
//! * [`SyncOnceCell`]: one-shot initialization of a `static`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::IrqGuard;
pub use spin_lock::{IrqSpinLockGuard, SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
