use kernel_memory_addresses::PhysicalAddress;

/// The two privileged steps that turn a built page directory into the live
/// translation: loading the root register and setting the paging bit.
///
/// Split out as a trait so table construction can be tested without touching
/// control registers.
pub trait PagingControl {
    /// Load `root` into the page directory base register (`CR3`).
    ///
    /// # Safety
    /// `root` must hold a valid page directory that maps the currently
    /// executing code and stack.
    unsafe fn load_directory(&mut self, root: PhysicalAddress);

    /// Set `CR0.PG`.
    ///
    /// # Safety
    /// A valid directory must be loaded first.
    unsafe fn enable_paging(&mut self);
}

/// [`PagingControl`] for 32-bit x86 in ring 0.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[derive(Debug, Default, Copy, Clone)]
pub struct X86Paging;

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl PagingControl for X86Paging {
    unsafe fn load_directory(&mut self, root: PhysicalAddress) {
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) root.as_u32(), options(nostack, preserves_flags));
        }
    }

    unsafe fn enable_paging(&mut self) {
        unsafe {
            core::arch::asm!(
                "mov {tmp}, cr0",
                "or {tmp}, 0x80000000",
                "mov cr0, {tmp}",
                tmp = out(reg) _,
                options(nostack)
            );
        }
    }
}
