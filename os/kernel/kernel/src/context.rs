//! Register state crossing between interrupt frames and PCBs.
//!
//! The syscall and timer stubs push a [`TrapFrame`] on the interrupted
//! stack and hand its address to Rust. During the trap the scheduler may
//! switch processes; [`TrapFrameSwitch`] copies the frame into the outgoing
//! PCB, builds a frame for the incoming process on *its* stack, and tells the
//! stub which frame to pop.
//!
//! ```text
//!  high   ┌──────────────┐
//!         │ eflags       │  pushed by the CPU
//!         │ cs           │
//!         │ eip          │
//!         ├──────────────┤
//!         │ eax … edi    │  pushad
//!         ├──────────────┤
//!         │ ds es fs gs  │  pushed by the stub
//!  low    └──────────────┘  ← frame address
//! ```
//!
//! The kernel runs in ring 0 only, so the CPU never pushes `ss:esp`; the
//! interrupted stack pointer is the address just above the frame.

use kernel_proc::{ContextSwitch, ProcessControlBlock, RegisterContext};
use kernel_syscall::SyscallArgs;

/// Number of 32-bit words in a [`TrapFrame`].
pub const TRAP_FRAME_WORDS: usize = 15;

/// Size of a [`TrapFrame`] on the stack.
#[allow(clippy::cast_possible_truncation)]
pub const TRAP_FRAME_BYTES: u32 = (TRAP_FRAME_WORDS * 4) as u32;

/// Registers as the entry stubs leave them, lowest address first.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// The `esp` slot of `pushad`; ignored by `popad`.
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

const _: () = assert!(size_of::<TrapFrame>() == TRAP_FRAME_BYTES as usize);

/// Segment selectors are pushed as 32-bit words with undefined upper halves.
const fn selector(word: u32) -> u16 {
    let [lo, hi, _, _] = word.to_le_bytes();
    u16::from_le_bytes([lo, hi])
}

impl TrapFrame {
    #[must_use]
    pub const fn from_words(w: [u32; TRAP_FRAME_WORDS]) -> Self {
        Self {
            gs: w[0],
            fs: w[1],
            es: w[2],
            ds: w[3],
            edi: w[4],
            esi: w[5],
            ebp: w[6],
            esp_dummy: w[7],
            ebx: w[8],
            edx: w[9],
            ecx: w[10],
            eax: w[11],
            eip: w[12],
            cs: w[13],
            eflags: w[14],
        }
    }

    #[must_use]
    pub const fn to_words(&self) -> [u32; TRAP_FRAME_WORDS] {
        [
            self.gs,
            self.fs,
            self.es,
            self.ds,
            self.edi,
            self.esi,
            self.ebp,
            self.esp_dummy,
            self.ebx,
            self.edx,
            self.ecx,
            self.eax,
            self.eip,
            self.cs,
            self.eflags,
        ]
    }

    /// A frame that resumes `ctx`.
    #[must_use]
    pub fn from_context(ctx: &RegisterContext) -> Self {
        Self {
            gs: u32::from(ctx.gs),
            fs: u32::from(ctx.fs),
            es: u32::from(ctx.es),
            ds: u32::from(ctx.ds),
            edi: ctx.edi,
            esi: ctx.esi,
            ebp: ctx.ebp,
            esp_dummy: ctx.esp,
            ebx: ctx.ebx,
            edx: ctx.edx,
            ecx: ctx.ecx,
            eax: ctx.eax,
            eip: ctx.eip,
            cs: u32::from(ctx.cs),
            eflags: ctx.eflags,
        }
    }

    /// Copy the frame into `ctx`. `frame_addr` is where the frame lives.
    pub const fn store_into(&self, ctx: &mut RegisterContext, frame_addr: u32) {
        ctx.eax = self.eax;
        ctx.ebx = self.ebx;
        ctx.ecx = self.ecx;
        ctx.edx = self.edx;
        ctx.esi = self.esi;
        ctx.edi = self.edi;
        ctx.ebp = self.ebp;
        ctx.esp = frame_addr.wrapping_add(TRAP_FRAME_BYTES);
        ctx.eip = self.eip;
        ctx.eflags = self.eflags;
        ctx.cs = selector(self.cs);
        ctx.ds = selector(self.ds);
        ctx.es = selector(self.es);
        ctx.fs = selector(self.fs);
        ctx.gs = selector(self.gs);
        ctx.ss = selector(self.ds);
    }

    /// The `int 0x80` argument registers.
    #[must_use]
    pub const fn syscall_args(&self) -> SyscallArgs {
        SyscallArgs::from_registers(self.eax, self.ebx, self.ecx, self.edx, self.esi, self.edi)
    }
}

/// Word access to kernel stacks.
pub trait FrameMemory {
    fn read_words(&self, addr: u32, out: &mut [u32]);
    fn write_words(&mut self, addr: u32, words: &[u32]);
}

/// [`FrameMemory`] for identity-mapped kernel stacks.
#[derive(Debug)]
pub struct DirectFrameMemory(());

impl DirectFrameMemory {
    /// # Safety
    /// Every address handed to this accessor must be mapped, writable and
    /// belong to a kernel stack that is not in use by running code.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl FrameMemory for DirectFrameMemory {
    fn read_words(&self, addr: u32, out: &mut [u32]) {
        let base = addr as usize as *const u32;
        for (i, word) in out.iter_mut().enumerate() {
            // SAFETY: guaranteed by the constructor's contract.
            *word = unsafe { base.add(i).read_unaligned() };
        }
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) {
        let base = addr as usize as *mut u32;
        for (i, word) in words.iter().enumerate() {
            // SAFETY: guaranteed by the constructor's contract.
            unsafe { base.add(i).write_unaligned(*word) };
        }
    }
}

/// The [`ContextSwitch`] used by the interrupt stubs.
///
/// Outside a trap there are no live registers to capture, so both hooks are
/// no-ops and the PCBs keep their saved contexts.
#[derive(Debug)]
pub struct TrapFrameSwitch<F> {
    memory: F,
    interrupted: Option<u32>,
    resume: Option<u32>,
}

impl<F: FrameMemory> TrapFrameSwitch<F> {
    pub const fn new(memory: F) -> Self {
        Self {
            memory,
            interrupted: None,
            resume: None,
        }
    }

    /// A trap pushed its frame at `frame_addr`.
    pub const fn begin_trap(&mut self, frame_addr: u32) {
        self.interrupted = Some(frame_addr);
        self.resume = None;
    }

    /// Address of the frame the stub must pop: the incoming process's if a
    /// switch happened, otherwise the interrupted one.
    pub const fn finish_trap(&mut self, frame_addr: u32) -> u32 {
        self.interrupted = None;
        match self.resume.take() {
            Some(addr) => addr,
            None => frame_addr,
        }
    }

    /// Frame address of the trap in progress.
    #[must_use]
    pub const fn interrupted(&self) -> Option<u32> {
        self.interrupted
    }

    #[must_use]
    pub fn read_frame(&self, frame_addr: u32) -> TrapFrame {
        let mut words = [0; TRAP_FRAME_WORDS];
        self.memory.read_words(frame_addr, &mut words);
        TrapFrame::from_words(words)
    }

    pub fn write_frame(&mut self, frame_addr: u32, frame: &TrapFrame) {
        self.memory.write_words(frame_addr, &frame.to_words());
    }

    #[must_use]
    pub const fn memory(&self) -> &F {
        &self.memory
    }
}

impl<F: FrameMemory> ContextSwitch for TrapFrameSwitch<F> {
    fn save(&mut self, outgoing: &mut ProcessControlBlock) {
        let Some(addr) = self.interrupted else {
            return;
        };
        let frame = self.read_frame(addr);
        frame.store_into(outgoing.context_mut(), addr);
        log::trace!("saved PID {} at eip {:#010x}", outgoing.pid(), frame.eip);
    }

    fn restore(&mut self, incoming: &mut ProcessControlBlock) {
        if self.interrupted.is_none() {
            return;
        }
        let ctx = *incoming.context();
        if !incoming.is_launched() {
            self.memory
                .write_words(ctx.esp, &incoming.exit_frame().to_words());
            incoming.mark_launched();
            log::debug!("launching PID {} at {:#010x}", incoming.pid(), ctx.eip);
        }

        let addr = ctx.esp.wrapping_sub(TRAP_FRAME_BYTES);
        self.write_frame(addr, &TrapFrame::from_context(&ctx));
        self.resume = Some(addr);
    }
}
