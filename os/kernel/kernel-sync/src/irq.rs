//! Interrupt-disable scopes.
//!
//! On freestanding x86 targets (`target_os = "none"`) the guard issues
//! `cli`/`sti` and reads `IF` (bit 9 of `EFLAGS`/`RFLAGS`). On every other
//! target the primitives are inert so that the kernel crates can be unit
//! tested as ordinary host processes.

/// Bit 9 of the flags register.
pub const INTERRUPT_FLAG: usize = 1 << 9;

/// Reads the flags register.
///
/// # Platform
///
/// Returns `0` (interrupts reported disabled) on hosted targets.
#[inline]
#[must_use]
pub fn flags() -> usize {
    #[cfg(all(target_os = "none", target_arch = "x86"))]
    {
        let r: usize;
        unsafe { core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
    #[cfg(all(target_os = "none", target_arch = "x86_64"))]
    {
        let r: usize;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
    #[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
    {
        0
    }
}

/// Whether maskable interrupts are currently enabled.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    flags() & INTERRUPT_FLAG != 0
}

/// Disables maskable interrupts (`cli`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `cli` is permitted (ring 0).
#[inline]
pub fn disable() {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack, preserves_flags));
    }
}

/// Enables maskable interrupts (`sti`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `sti` is permitted (ring 0).
#[inline]
pub fn enable() {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    unsafe {
        core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Interrupts are re-enabled on drop **only** if they were enabled when the
/// guard was created, so guards nest.
///
/// ```no_run
/// use kernel_sync::IrqGuard;
///
/// {
///     let _g = IrqGuard::new();
///     // process table and heap are safe from the timer handler here
/// }
/// ```
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let were_enabled = interrupts_enabled();
        if were_enabled {
            disable();
        }
        Self { were_enabled }
    }

    /// Whether this guard will re-enable interrupts when dropped.
    #[inline]
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_guard_is_inert() {
        assert!(!interrupts_enabled());
        let outer = IrqGuard::new();
        let inner = IrqGuard::new();
        assert!(!outer.restores_interrupts());
        assert!(!inner.restores_interrupts());
    }
}
