//! # QEMU Debug Console
//!
//! Kernel log output through QEMU's debug port (`0x402`), captured on the
//! host with `-debugcon stdio` or `-debugcon file:debug.log`.
//!
//! ```text
//! log::info!(…) ──► QemuLogger ──┐
//!                                ├──► QemuSink (fmt::Write) ──► out 0x402, al
//! qemu_trace!(…) ────────────────┘
//! ```
//!
//! Port I/O only exists on a freestanding x86 target. Everywhere else the
//! sink swallows its input, so code that logs can be tested on the host.
//!
//! With the `enabled` feature turned off every write is a no-op.
//!
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::LevelFilter;
//!
//! QemuLogger::new(LevelFilter::Debug).init().ok();
//! log::info!("heap ready");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, write_record};

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// QEMU's debug console port.
    pub const QEMU_DEBUG_PORT: u16 = 0x402;

    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none"))]
        // SAFETY: writing the debug port has no side effects besides output.
        unsafe {
            outb(QEMU_DEBUG_PORT, c);
        }
        #[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none")))]
        let _ = c;
    }

    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none"))]
    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
            );
        }
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// `format!`-style output straight to the debug port, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
