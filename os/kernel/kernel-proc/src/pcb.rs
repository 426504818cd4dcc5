//! Process control block and the small value types it is made of.

use crate::ProcessError;
use crate::queue::Links;
use core::fmt;
use kernel_info::process::{
    INITIAL_EFLAGS, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR, PROCESS_NAME_MAX,
};
use kernel_memory_addresses::VirtualAddress;

/// Process identifier. PID 0 is the idle process.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(u32);

impl Pid {
    pub const IDLE: Self = Self(0);

    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state.
///
/// `New → Ready → Running → Blocked → Terminated`, with `Blocked ↔ Ready`
/// allowed. Nothing leaves `Terminated`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ProcessState {
    #[default]
    New,
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Blocked => "BLOCKED",
            Self::Terminated => "TERMINATED",
        }
    }
}

/// Scheduling priority, `1..=4`.
///
/// Recorded and reported; the round-robin dispatcher does not order by it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum Priority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    #[must_use]
    pub const fn level(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Priority {
    type Error = ProcessError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Self::Low),
            2 => Ok(Self::Normal),
            3 => Ok(Self::High),
            4 => Ok(Self::Critical),
            _ => Err(ProcessError::InvalidParam),
        }
    }
}

/// A process name of at most [`PROCESS_NAME_MAX`] bytes, stored inline.
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct ProcessName {
    bytes: [u8; PROCESS_NAME_MAX],
    len: u8,
}

impl ProcessName {
    /// Copy `name`, truncated to the last full character that fits.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(PROCESS_NAME_MAX);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; PROCESS_NAME_MAX];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            bytes,
            len: u8::try_from(len).unwrap_or(u8::MAX),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A span of kernel heap owned by a process.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: VirtualAddress,
    pub size: u32,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: VirtualAddress, size: u32) -> Self {
        Self { base, size }
    }

    /// One past the last byte.
    #[must_use]
    pub const fn top(&self) -> VirtualAddress {
        VirtualAddress::new(self.base.as_u32() + self.size)
    }
}

/// Register snapshot of a process that is not on the CPU.
///
/// Written at creation time; afterwards only the context-switch adapter
/// reads or writes it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterContext {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub ss: u16,
}

impl RegisterContext {
    /// Context of a process that starts at `entry` with `esp` as its stack
    /// pointer, in the flat kernel segments with interrupts enabled.
    #[must_use]
    pub const fn seed(entry: u32, esp: u32) -> Self {
        Self {
            eax: 0,
            ebx: 0,
            ecx: 0,
            edx: 0,
            esi: 0,
            edi: 0,
            ebp: esp,
            esp,
            eip: entry,
            eflags: INITIAL_EFLAGS,
            cs: KERNEL_CODE_SELECTOR,
            ds: KERNEL_DATA_SELECTOR,
            es: KERNEL_DATA_SELECTOR,
            fs: KERNEL_DATA_SELECTOR,
            gs: KERNEL_DATA_SELECTOR,
            ss: KERNEL_DATA_SELECTOR,
        }
    }
}

/// The words reserved at the top of a fresh stack.
///
/// Laid out as a `cdecl` call frame: the entry function's `ret` pops
/// `exit_handler`, which then sees `return_address` (never used) and its
/// `argument`, the process's own PID.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExitFrame {
    pub exit_handler: u32,
    pub return_address: u32,
    pub argument: u32,
}

impl ExitFrame {
    /// The frame as stack words, lowest address first.
    #[must_use]
    pub const fn to_words(self) -> [u32; 4] {
        [self.exit_handler, self.return_address, self.argument, 0]
    }
}

/// One process.
#[derive(Copy, Clone, Debug)]
pub struct ProcessControlBlock {
    pub(crate) pid: Pid,
    pub(crate) name: ProcessName,
    pub(crate) state: ProcessState,
    pub(crate) priority: Priority,
    pub(crate) parent: Option<Pid>,
    pub(crate) exit_code: i32,

    pub(crate) time_slice: u32,
    pub(crate) remaining_slice: u32,
    pub(crate) cpu_time: u64,
    pub(crate) creation_tick: u64,
    pub(crate) last_run_tick: u64,

    pub(crate) context: RegisterContext,
    pub(crate) exit_frame: ExitFrame,
    pub(crate) launched: bool,

    pub(crate) stack: Option<MemoryRegion>,
    pub(crate) heap: Option<MemoryRegion>,

    pub(crate) links: Links,
}

impl ProcessControlBlock {
    pub(crate) const EMPTY: Self = Self {
        pid: Pid::IDLE,
        name: ProcessName {
            bytes: [0; PROCESS_NAME_MAX],
            len: 0,
        },
        state: ProcessState::New,
        priority: Priority::Normal,
        parent: None,
        exit_code: 0,
        time_slice: 0,
        remaining_slice: 0,
        cpu_time: 0,
        creation_tick: 0,
        last_run_tick: 0,
        context: RegisterContext::seed(0, 0),
        exit_frame: ExitFrame {
            exit_handler: 0,
            return_address: 0,
            argument: 0,
        },
        launched: false,
        stack: None,
        heap: None,
        links: Links::UNLINKED,
    };

    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub const fn name(&self) -> &ProcessName {
        &self.name
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn parent(&self) -> Option<Pid> {
        self.parent
    }

    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    #[must_use]
    pub const fn time_slice(&self) -> u32 {
        self.time_slice
    }

    #[must_use]
    pub const fn remaining_slice(&self) -> u32 {
        self.remaining_slice
    }

    #[must_use]
    pub const fn cpu_time(&self) -> u64 {
        self.cpu_time
    }

    #[must_use]
    pub const fn creation_tick(&self) -> u64 {
        self.creation_tick
    }

    #[must_use]
    pub const fn last_run_tick(&self) -> u64 {
        self.last_run_tick
    }

    #[must_use]
    pub const fn stack(&self) -> Option<MemoryRegion> {
        self.stack
    }

    #[must_use]
    pub const fn heap(&self) -> Option<MemoryRegion> {
        self.heap
    }

    #[must_use]
    pub const fn context(&self) -> &RegisterContext {
        &self.context
    }

    /// Register snapshot for the context-switch adapter.
    pub const fn context_mut(&mut self) -> &mut RegisterContext {
        &mut self.context
    }

    #[must_use]
    pub const fn exit_frame(&self) -> ExitFrame {
        self.exit_frame
    }

    /// Whether the process has been restored onto the CPU before.
    #[must_use]
    pub const fn is_launched(&self) -> bool {
        self.launched
    }

    /// Called by the context-switch adapter once the exit frame is in place.
    pub const fn mark_launched(&mut self) {
        self.launched = true;
    }

    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo::from(self)
    }
}

/// Copyable snapshot of a PCB, handed out by `ps`/`getinfo`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub name: ProcessName,
    pub state: ProcessState,
    pub priority: Priority,
    pub time_slice: u32,
    pub remaining_slice: u32,
    pub cpu_time: u64,
    pub stack_size: u32,
    pub exit_code: i32,
}

impl From<&ProcessControlBlock> for ProcessInfo {
    fn from(pcb: &ProcessControlBlock) -> Self {
        Self {
            pid: pcb.pid,
            parent: pcb.parent,
            name: pcb.name,
            state: pcb.state,
            priority: pcb.priority,
            time_slice: pcb.time_slice,
            remaining_slice: pcb.remaining_slice,
            cpu_time: pcb.cpu_time,
            stack_size: pcb.stack.map_or(0, |s| s.size),
            exit_code: pcb.exit_code,
        }
    }
}
