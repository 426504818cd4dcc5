//! # Kernel Entry Point
//!
//! The boot loader enters at `_start_kernel` in 32-bit protected mode with
//! flat segments and interrupts off. It switches to the kernel's own stack
//! and hands over to [`kernel::entry::run`].

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(all(target_os = "none", not(target_arch = "x86")))]
compile_error!("the kernel image targets 32-bit x86");

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod freestanding {
    use core::hint::spin_loop;

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        log::error!("{info}");
        kernel_sync::irq::disable();
        loop {
            spin_loop();
        }
    }

    /// Stack size.
    const BOOT_STACK_SIZE: usize = 64 * 1024;

    /// 16-byte aligned stack
    #[repr(align(16))]
    struct Aligned<const N: usize>([u8; N]);

    #[unsafe(link_section = ".bss.boot")]
    #[unsafe(no_mangle)]
    static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

    /// The kernel entry point.
    ///
    /// Naked so that no prologue touches the loader's stack before we
    /// replace it.
    #[unsafe(no_mangle)]
    #[unsafe(naked)]
    pub extern "C" fn _start_kernel() -> ! {
        core::arch::naked_asm!(
            "cli",
            "lea esp, [{stack} + {size}]",
            "and esp, -16",
            "xor ebp, ebp",
            "call {rust_entry}",
            "2:",
            "hlt",
            "jmp 2b",
            stack = sym BOOT_STACK,
            size = const BOOT_STACK_SIZE,
            rust_entry = sym kernel_main,
        );
    }

    extern "C" fn kernel_main() -> ! {
        kernel::entry::run()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("the kernel image only runs on a freestanding i386 target; use `cargo test` on the host");
}
