//! # x86 I/O Port Access
//!
//! Thin wrappers around `in`/`out` for the legacy devices the kernel core
//! talks to: the master PIC (end of interrupt) and, through `kernel-qemu`,
//! the debug console.
//!
//! ```text
//! 0x0020-0x0021   Programmable Interrupt Controller (PIC) #1
//! 0x0040-0x0043   Programmable Interval Timer (PIT)
//! 0x00A0-0x00A1   PIC #2
//! ```
//!
//! On hosted targets the functions are inert (`inb` reads `0xFF`, like an
//! undecoded port), so code that calls them stays host testable.

/// Command port of the master PIC.
pub const PIC1_COMMAND: u16 = 0x20;

/// Non-specific end-of-interrupt command.
pub const PIC_EOI: u8 = 0x20;

/// Write one byte to an I/O port (`out dx, al`).
///
/// # Safety
/// - **Privilege:** CPL0 or an I/O permission that covers `port`, otherwise
///   the CPU raises `#GP`.
/// - **Correct port:** `port` must belong to the intended device and the
///   device must be in a state that accepts `val`.
/// - **Ordering:** `out` is not a memory fence.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
    #[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
    let _ = (port, val);
}

/// Read one byte from an I/O port (`in al, dx`).
///
/// # Safety
/// Same as [`outb`]; additionally, reading some device registers has side
/// effects (e.g. acknowledging a pending byte).
#[inline]
#[must_use]
pub unsafe fn inb(port: u16) -> u8 {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    {
        let mut v: u8;
        unsafe {
            core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
        }
        v
    }
    #[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
    {
        let _ = port;
        0xFF
    }
}

/// Acknowledge the interrupt currently in service at the master PIC.
///
/// # Safety
/// Must only be called from an IRQ handler routed through the master PIC,
/// once per interrupt.
#[inline]
pub unsafe fn end_of_interrupt() {
    unsafe { outb(PIC1_COMMAND, PIC_EOI) };
}
