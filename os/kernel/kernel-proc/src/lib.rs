//! # Process Management
//!
//! Process control blocks, the fixed process table and the round-robin
//! scheduler built on it.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   syscalls ───► │      Scheduler<C>            │ ──► C: ContextSwitch
//!   shell    ───► │  tick / dispatch / yield     │     (save / restore)
//!   timer    ───► │  terminate / block / unblock │
//!                 └──────────────┬───────────────┘
//!                                │
//!                 ┌──────────────▼───────────────┐
//!                 │        ProcessTable          │
//!                 │  64 PCB slots, in-use mask   │
//!                 │  ready / blocked / terminated│ ──► RegionAllocator
//!                 │  running slot, PID counter   │     (process stacks)
//!                 └──────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//!   New ──► Ready ◄──► Running ──► Terminated
//!             ▲           │
//!             └─ Blocked ◄┘
//! ```
//!
//! A PCB is either running or on exactly one queue. The idle process (PID 0)
//! lives in slot 0, is never queued and runs whenever the ready queue is
//! empty.
//!
//! The ready queue is FIFO: processes join at the tail and dispatch pops the
//! head, so equal processes take turns.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod context;
mod error;
mod pcb;
mod queue;
mod scheduler;
mod stack;
mod table;

pub use context::{ContextSwitch, NoContextSwitch};
pub use error::ProcessError;
pub use pcb::{
    ExitFrame, MemoryRegion, Pid, Priority, ProcessControlBlock, ProcessInfo, ProcessName,
    ProcessState, RegisterContext,
};
pub use queue::QueueKind;
pub use scheduler::{Preemption, Scheduler, SchedulerStats};
pub use stack::RegionAllocator;
pub use table::{ProcessTable, Retired, TableConfig};
