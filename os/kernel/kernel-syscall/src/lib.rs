//! # System Call Interface
//!
//! Numbers, argument decoding and error codes of the `int 0x80` interface.
//! Executing a call is the kernel's job; this crate turns six registers into
//! a typed [`Syscall`] and a [`SyscallError`] back into the negative `i32`
//! the caller sees in `eax`.
//!
//! ```text
//!   eax = number   ebx, ecx, edx, esi, edi = arguments
//!   eax ← result   (>= 0 payload, < 0 error code)
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod request;
mod sysno;
mod user_ptr;

pub use error::SyscallError;
pub use request::{Syscall, SyscallArgs};
pub use sysno::Sysno;
pub use user_ptr::{DirectUserMemory, UserMemory, UserPtr};

/// Interrupt vector of the system call gate.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Outcome of a handler; `Ok` carries the non-negative payload.
pub type SyscallResult = Result<i32, SyscallError>;

/// Fold a handler outcome into the value returned in `eax`.
#[must_use]
pub const fn to_return_value(result: SyscallResult) -> i32 {
    match result {
        Ok(value) => value,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_values() {
        assert_eq!(to_return_value(Ok(42)), 42);
        assert_eq!(to_return_value(Err(SyscallError::NotFound)), -3);
        assert_eq!(to_return_value(Err(SyscallError::NoMemory)), -5);
    }
}
