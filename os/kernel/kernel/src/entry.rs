//! Freestanding i386 glue: the global kernel instance, boot sequence and the
//! interrupt stubs.
//!
//! The boot loader jumps to the binary's `kernel_main`, which calls
//! [`run`]. The vector table is set up outside the core; it points the timer
//! IRQ at [`timer_entry`] and `int 0x80` at [`syscall_entry`].

use crate::config::KernelConfig;
use crate::context::{DirectFrameMemory, TrapFrameSwitch};
use crate::error::BootError;
use crate::kernel::Kernel;
use crate::ports;
use crate::shell;
use core::arch::naked_asm;
use core::fmt;
use core::hint::spin_loop;
use kernel_alloc::IdentityPhysMapper;
use kernel_qemu::QemuLogger;
use kernel_qemu::qemu_trace;
use kernel_sync::{SpinLock, SyncOnceCell, irq};
use kernel_syscall::{DirectUserMemory, Sysno};
use kernel_vmem::X86Paging;

type BootKernel = Kernel<IdentityPhysMapper, TrapFrameSwitch<DirectFrameMemory>>;

static KERNEL: SyncOnceCell<SpinLock<BootKernel>> = SyncOnceCell::new();

/// Commands run once after boot; their output goes to the debug console.
const BOOT_REPORT: &[&str] = &["memory", "ps"];

/// Shell output sink on the debug console.
struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        qemu_trace!("{s}");
        Ok(())
    }
}

/// Bring the kernel up, then idle until interrupts arrive.
pub fn run() -> ! {
    QemuLogger::for_build().init().ok();
    log::info!("Kernel core starting");

    if let Err(e) = boot() {
        log::error!("Boot failed: {e}");
        halt();
    }

    if let Some(kernel) = KERNEL.get() {
        let mut kernel = kernel.lock_irq();
        for line in BOOT_REPORT {
            let _ = shell::execute(&mut *kernel, line, &mut Console);
        }
    }

    log::info!("Entering idle loop");
    irq::enable();
    loop {
        // SAFETY: ring 0; an interrupt resumes us.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

#[allow(clippy::cast_possible_truncation)]
fn boot() -> Result<(), BootError> {
    let config = KernelConfig {
        exit_handler: process_exit_trampoline as usize as u32,
        ..KernelConfig::default()
    };

    // SAFETY: trap frames live on kernel stacks inside the identity map.
    let switch = TrapFrameSwitch::new(unsafe { DirectFrameMemory::new() });
    let mut kernel = Kernel::boot(config, IdentityPhysMapper, switch)?;

    if config.enable_paging {
        // SAFETY: the boot mappings cover the kernel image, the heap with all
        // process stacks, and the page-table pool.
        unsafe { kernel.enable_paging(&mut X86Paging)? };
    }

    KERNEL
        .set(SpinLock::new(kernel))
        .map_err(|_| BootError::AlreadyBooted)
}

fn halt() -> ! {
    irq::disable();
    loop {
        spin_loop();
    }
}

extern "C" fn kernel_syscall_trap(frame: u32) -> u32 {
    let Some(kernel) = KERNEL.get() else {
        return frame;
    };
    // SAFETY: callers share the kernel's identity-mapped address space.
    let mut user = unsafe { DirectUserMemory::new() };
    kernel.lock_irq().syscall_trap(&mut user, frame)
}

extern "C" fn kernel_timer_trap(frame: u32) -> u32 {
    // SAFETY: we are the IRQ 0 handler.
    unsafe { ports::end_of_interrupt() };
    let Some(kernel) = KERNEL.get() else {
        return frame;
    };
    kernel.lock_irq().timer_trap(frame)
}

/// `int 0x80` entry. Arguments in `eax, ebx, ecx, edx, esi, edi`, result in
/// `eax`.
#[unsafe(naked)]
pub extern "C" fn syscall_entry() {
    naked_asm!(
        "pushad",
        "push ds",
        "push es",
        "push fs",
        "push gs",
        "mov ax, 0x10",
        "mov ds, ax",
        "mov es, ax",
        "push esp",
        "call {rust}",
        // The Rust side returns the frame to resume, possibly on another stack.
        "mov esp, eax",
        "pop gs",
        "pop fs",
        "pop es",
        "pop ds",
        "popad",
        "iretd",
        rust = sym kernel_syscall_trap,
    );
}

/// Timer IRQ entry.
#[unsafe(naked)]
pub extern "C" fn timer_entry() {
    naked_asm!(
        "cld",
        "pushad",
        "push ds",
        "push es",
        "push fs",
        "push gs",
        "mov ax, 0x10",
        "mov ds, ax",
        "mov es, ax",
        "push esp",
        "call {rust}",
        "mov esp, eax",
        "pop gs",
        "pop fs",
        "pop es",
        "pop ds",
        "popad",
        "iretd",
        rust = sym kernel_timer_trap,
    );
}

/// Where a process's entry function returns to: exits with the returned
/// value as the exit code.
#[unsafe(naked)]
pub extern "C" fn process_exit_trampoline() -> ! {
    naked_asm!(
        "mov ebx, eax",
        "mov eax, {exit}",
        "int 0x80",
        "2:",
        "hlt",
        "jmp 2b",
        exit = const Sysno::Exit.number(),
    );
}
