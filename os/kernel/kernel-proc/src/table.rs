//! The fixed pool of process control blocks.
//!
//! Slot 0 permanently holds the idle process. Every other slot is either
//! free, live (in use, and either running or on the ready/blocked queue), or
//! terminated (off the in-use mask, on the terminated queue until its exit
//! code is reaped or the slot is handed to a new process).

use crate::queue::{Links, ProcessQueue, QueueKind};
use crate::stack::RegionAllocator;
use crate::{
    ExitFrame, MemoryRegion, Pid, Priority, ProcessControlBlock, ProcessError, ProcessName,
    ProcessState, RegisterContext,
};
use kernel_info::process::{DEFAULT_STACK_SIZE, DEFAULT_TIME_SLICE, EXIT_FRAME_SIZE, MAX_PROCESSES};

const IDLE_SLOT: usize = 0;

/// Parameters applied to every process the table creates.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableConfig {
    /// Time-slice quantum in scheduler ticks.
    pub time_slice: u32,
    /// Stack bytes allocated per process.
    pub stack_size: u32,
    /// Address written into every exit frame; entry functions return here.
    pub exit_handler: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            time_slice: DEFAULT_TIME_SLICE,
            stack_size: DEFAULT_STACK_SIZE,
            exit_handler: 0,
        }
    }
}

/// What [`ProcessTable::terminate`] did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Retired {
    pub pid: Pid,
    /// The process was on the CPU; nothing is running now.
    pub was_running: bool,
    /// Stack and heap bytes handed back.
    pub released_bytes: u32,
}

/// How the running process leaves the CPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Park {
    Ready,
    Blocked,
}

pub struct ProcessTable {
    slots: [ProcessControlBlock; MAX_PROCESSES],
    in_use: u64,
    next_pid: u32,
    ready: ProcessQueue,
    blocked: ProcessQueue,
    terminated: ProcessQueue,
    running: Option<usize>,
    config: TableConfig,
}

impl ProcessTable {
    /// An empty table with the idle process running.
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        let mut slots = [ProcessControlBlock::EMPTY; MAX_PROCESSES];
        let idle = &mut slots[IDLE_SLOT];
        idle.pid = Pid::IDLE;
        idle.name = ProcessName::new("idle");
        idle.state = ProcessState::Running;
        idle.priority = Priority::Low;
        // The boot context is already on the CPU.
        idle.launched = true;

        log::debug!(
            "Process table: {MAX_PROCESSES} slots, {} tick slice, {} byte stacks",
            config.time_slice,
            config.stack_size
        );
        Self {
            slots,
            in_use: 1 << IDLE_SLOT,
            next_pid: 1,
            ready: ProcessQueue::new(QueueKind::Ready),
            blocked: ProcessQueue::new(QueueKind::Blocked),
            terminated: ProcessQueue::new(QueueKind::Terminated),
            running: Some(IDLE_SLOT),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TableConfig {
        &self.config
    }

    const fn is_live(&self, slot: usize) -> bool {
        self.in_use & (1 << slot) != 0
    }

    fn free_slot(&self) -> Option<usize> {
        let slot = (!self.in_use).trailing_zeros() as usize;
        (slot < MAX_PROCESSES).then_some(slot)
    }

    fn live_slot(&self, pid: Pid) -> Option<usize> {
        (0..MAX_PROCESSES).find(|&slot| self.is_live(slot) && self.slots[slot].pid == pid)
    }

    fn terminated_slot(&self, pid: Pid) -> Option<usize> {
        self.terminated
            .iter(&self.slots)
            .find(|&slot| self.slots[slot].pid == pid)
    }

    /// Create a process that starts at `entry`, put it on the ready tail.
    ///
    /// # Errors
    /// - [`ProcessError::InvalidParam`] for an empty name or a null entry point.
    /// - [`ProcessError::QueueFull`] if every slot is live.
    /// - [`ProcessError::NoMemory`] if the stack cannot be allocated. No slot
    ///   or PID is consumed in that case.
    pub fn create<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        name: &str,
        entry: u32,
        priority: Priority,
        parent: Option<Pid>,
        now: u64,
    ) -> Result<Pid, ProcessError> {
        if entry == 0 || name.is_empty() {
            return Err(ProcessError::InvalidParam);
        }
        let slot = self.free_slot().ok_or(ProcessError::QueueFull)?;
        let stack = stacks
            .allocate_region(self.config.stack_size)
            .ok_or(ProcessError::NoMemory)?;

        // The slot may still hold an unreaped process.
        self.terminated.remove(&mut self.slots, slot);

        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;

        let esp = stack.top().as_u32() - EXIT_FRAME_SIZE;
        self.slots[slot] = ProcessControlBlock {
            pid,
            name: ProcessName::new(name),
            state: ProcessState::New,
            priority,
            parent,
            exit_code: 0,
            time_slice: self.config.time_slice,
            remaining_slice: self.config.time_slice,
            cpu_time: 0,
            creation_tick: now,
            last_run_tick: 0,
            context: RegisterContext::seed(entry, esp),
            exit_frame: ExitFrame {
                exit_handler: self.config.exit_handler,
                return_address: 0,
                argument: pid.as_u32(),
            },
            launched: false,
            stack: Some(stack),
            heap: None,
            links: Links::UNLINKED,
        };
        self.in_use |= 1 << slot;

        self.slots[slot].state = ProcessState::Ready;
        self.ready.push_back(&mut self.slots, slot);

        log::debug!(
            "Created process {pid} '{name}' (slot {slot}, stack {} + {:#x})",
            stack.base,
            stack.size
        );
        Ok(pid)
    }

    /// Move `pid` to the terminated queue and release its memory.
    ///
    /// If it was running, the running reference is cleared; picking a
    /// replacement is up to the caller.
    ///
    /// # Errors
    /// - [`ProcessError::IdleProcess`] for PID 0.
    /// - [`ProcessError::NotFound`] if `pid` is not live.
    pub fn terminate<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        pid: Pid,
        exit_code: i32,
    ) -> Result<Retired, ProcessError> {
        if pid.is_idle() {
            return Err(ProcessError::IdleProcess);
        }
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;

        let was_running = self.running == Some(slot);
        if was_running {
            self.running = None;
        } else {
            self.detach(slot);
        }

        let pcb = &mut self.slots[slot];
        pcb.state = ProcessState::Terminated;
        pcb.exit_code = exit_code;
        pcb.remaining_slice = 0;

        let mut released_bytes = 0;
        for region in [pcb.stack.take(), pcb.heap.take()].into_iter().flatten() {
            released_bytes += region.size;
            stacks.release_region(region);
        }

        self.terminated.push_back(&mut self.slots, slot);
        self.in_use &= !(1 << slot);

        log::debug!("Terminated process {pid} with code {exit_code}");
        Ok(Retired {
            pid,
            was_running,
            released_bytes,
        })
    }

    /// Take a terminated process's exit code and forget it.
    ///
    /// # Errors
    /// - [`ProcessError::StillRunning`] if `pid` is live.
    /// - [`ProcessError::NotFound`] if `pid` was never created or was reaped.
    pub fn reap(&mut self, pid: Pid) -> Result<i32, ProcessError> {
        if self.live_slot(pid).is_some() {
            return Err(ProcessError::StillRunning(pid));
        }
        let slot = self
            .terminated_slot(pid)
            .ok_or(ProcessError::NotFound(pid))?;
        self.terminated.remove(&mut self.slots, slot);
        let exit_code = self.slots[slot].exit_code;
        self.slots[slot] = ProcessControlBlock::EMPTY;
        Ok(exit_code)
    }

    /// Unlink a queued slot from whichever queue holds it.
    fn detach(&mut self, slot: usize) {
        match self.slots[slot].links.queue {
            Some(QueueKind::Ready) => self.ready.remove(&mut self.slots, slot),
            Some(QueueKind::Blocked) => self.blocked.remove(&mut self.slots, slot),
            Some(QueueKind::Terminated) => self.terminated.remove(&mut self.slots, slot),
            None => false,
        };
    }

    /// Move a ready process to the blocked queue.
    ///
    /// # Errors
    /// [`ProcessError::InvalidState`] if the process is not on the ready
    /// queue; the running process is blocked through the scheduler.
    pub fn block(&mut self, pid: Pid) -> Result<(), ProcessError> {
        if pid.is_idle() {
            return Err(ProcessError::IdleProcess);
        }
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;
        if !self.ready.remove(&mut self.slots, slot) {
            return Err(ProcessError::InvalidState(pid));
        }
        self.slots[slot].state = ProcessState::Blocked;
        self.blocked.push_back(&mut self.slots, slot);
        Ok(())
    }

    /// Move a blocked process to the ready tail.
    ///
    /// # Errors
    /// [`ProcessError::InvalidState`] if the process is not blocked.
    pub fn unblock(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;
        if !self.blocked.remove(&mut self.slots, slot) {
            return Err(ProcessError::InvalidState(pid));
        }
        self.slots[slot].state = ProcessState::Ready;
        self.ready.push_back(&mut self.slots, slot);
        Ok(())
    }

    /// Take the running process off the CPU.
    ///
    /// Idle is never queued; it stays reachable as the fallback.
    pub(crate) fn park(&mut self, intent: Park) -> Option<usize> {
        let slot = self.running.take()?;
        match intent {
            Park::Ready => {
                self.slots[slot].state = ProcessState::Ready;
                if slot != IDLE_SLOT {
                    self.ready.push_back(&mut self.slots, slot);
                }
            }
            Park::Blocked => {
                debug_assert_ne!(slot, IDLE_SLOT, "idle process cannot block");
                self.slots[slot].state = ProcessState::Blocked;
                self.blocked.push_back(&mut self.slots, slot);
            }
        }
        Some(slot)
    }

    /// Pop the ready head, or fall back to idle.
    pub(crate) fn next_ready(&mut self) -> usize {
        self.ready.pop_front(&mut self.slots).unwrap_or(IDLE_SLOT)
    }

    pub(crate) fn set_running(&mut self, slot: usize, now: u64) {
        debug_assert!(self.running.is_none());
        let pcb = &mut self.slots[slot];
        pcb.state = ProcessState::Running;
        pcb.remaining_slice = pcb.time_slice;
        pcb.last_run_tick = now;
        self.running = Some(slot);
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> &mut ProcessControlBlock {
        &mut self.slots[slot]
    }

    /// The process on the CPU.
    #[must_use]
    pub fn running(&self) -> Option<&ProcessControlBlock> {
        self.running.map(|slot| &self.slots[slot])
    }

    pub(crate) fn running_mut(&mut self) -> Option<&mut ProcessControlBlock> {
        self.running.map(|slot| &mut self.slots[slot])
    }

    /// PID of the running process; idle when nothing is.
    #[must_use]
    pub fn current(&self) -> Pid {
        self.running().map_or(Pid::IDLE, ProcessControlBlock::pid)
    }

    /// Look up a live or not yet reaped process.
    ///
    /// # Errors
    /// [`ProcessError::NotFound`] otherwise.
    pub fn get(&self, pid: Pid) -> Result<&ProcessControlBlock, ProcessError> {
        self.live_slot(pid)
            .or_else(|| self.terminated_slot(pid))
            .map(|slot| &self.slots[slot])
            .ok_or(ProcessError::NotFound(pid))
    }

    /// Register snapshot of a live process.
    ///
    /// # Errors
    /// [`ProcessError::NotFound`] if `pid` is not live.
    pub fn context_mut(&mut self, pid: Pid) -> Result<&mut RegisterContext, ProcessError> {
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;
        Ok(&mut self.slots[slot].context)
    }

    /// Change the priority of a live process.
    ///
    /// # Errors
    /// - [`ProcessError::InvalidParam`] if `level` is outside `1..=4`.
    /// - [`ProcessError::NotFound`] if `pid` is not live.
    pub fn set_priority(&mut self, pid: Pid, level: u32) -> Result<(), ProcessError> {
        let priority = Priority::try_from(level)?;
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;
        self.slots[slot].priority = priority;
        log::debug!("Process {pid} priority set to {}", priority.as_str());
        Ok(())
    }

    /// Give a live process a heap region of `size` bytes.
    ///
    /// The region is released together with the stack on termination.
    ///
    /// # Errors
    /// - [`ProcessError::NotFound`] if `pid` is not live.
    /// - [`ProcessError::InvalidState`] if it already owns a heap region.
    /// - [`ProcessError::NoMemory`] if the allocation fails.
    pub fn allocate_heap<S: RegionAllocator>(
        &mut self,
        regions: &mut S,
        pid: Pid,
        size: u32,
    ) -> Result<MemoryRegion, ProcessError> {
        let slot = self.live_slot(pid).ok_or(ProcessError::NotFound(pid))?;
        if self.slots[slot].heap.is_some() {
            return Err(ProcessError::InvalidState(pid));
        }
        let region = regions
            .allocate_region(size)
            .ok_or(ProcessError::NoMemory)?;
        self.slots[slot].heap = Some(region);
        Ok(region)
    }

    /// Live processes: running first, then the ready queue, then the
    /// blocked queue, then idle if it is not the one running. At most `max`.
    pub fn list(&self, max: usize) -> impl Iterator<Item = &ProcessControlBlock> + '_ {
        let idle = (self.running != Some(IDLE_SLOT)).then_some(IDLE_SLOT);
        self.running
            .into_iter()
            .chain(self.ready.iter(&self.slots))
            .chain(self.blocked.iter(&self.slots))
            .chain(idle)
            .take(max)
            .map(|slot| &self.slots[slot])
    }

    const fn queue_of(&self, kind: QueueKind) -> &ProcessQueue {
        match kind {
            QueueKind::Ready => &self.ready,
            QueueKind::Blocked => &self.blocked,
            QueueKind::Terminated => &self.terminated,
        }
    }

    /// PIDs on one queue, head first.
    pub fn queue(&self, kind: QueueKind) -> impl Iterator<Item = Pid> + '_ {
        self.queue_of(kind)
            .iter(&self.slots)
            .map(|slot| self.slots[slot].pid)
    }

    #[must_use]
    pub const fn queue_len(&self, kind: QueueKind) -> usize {
        self.queue_of(kind).len()
    }

    /// Live processes, idle included.
    #[must_use]
    pub const fn live_count(&self) -> u32 {
        self.in_use.count_ones()
    }

    /// The PID the next successful `create` will assign.
    #[must_use]
    pub const fn next_pid(&self) -> Pid {
        Pid::new(self.next_pid)
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::HeapAllocator;
    use kernel_memory_addresses::VirtualAddress;

    const ENTRY: u32 = 0x0010_2000;

    fn heap() -> HeapAllocator<128> {
        HeapAllocator::new(VirtualAddress::new(0x0020_0000), 0x10_0000).unwrap()
    }

    fn table() -> ProcessTable {
        ProcessTable::new(TableConfig {
            exit_handler: 0x0010_0400,
            ..TableConfig::default()
        })
    }

    #[test]
    fn idle_process_is_running() {
        let table = table();
        let idle = table.running().unwrap();
        assert_eq!(idle.pid(), Pid::IDLE);
        assert_eq!(idle.name().as_str(), "idle");
        assert_eq!(idle.state(), ProcessState::Running);
        assert_eq!(idle.priority(), Priority::Low);
        assert_eq!(idle.time_slice(), 0);
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.next_pid(), Pid::new(1));
    }

    #[test]
    fn create_seeds_stack_and_queues() {
        let mut heap = heap();
        let mut table = table();

        let pid = table
            .create(&mut heap, "worker", ENTRY, Priority::High, Some(Pid::IDLE), 5)
            .unwrap();
        assert_eq!(pid, Pid::new(1));

        let pcb = table.get(pid).unwrap();
        let stack = pcb.stack().unwrap();
        assert_eq!(stack.size, DEFAULT_STACK_SIZE);
        assert_eq!(pcb.state(), ProcessState::Ready);
        assert_eq!(pcb.priority(), Priority::High);
        assert_eq!(pcb.parent(), Some(Pid::IDLE));
        assert_eq!(pcb.creation_tick(), 5);
        assert_eq!(pcb.remaining_slice(), DEFAULT_TIME_SLICE);
        assert_eq!(pcb.context().eip, ENTRY);
        assert_eq!(pcb.context().esp, stack.top().as_u32() - EXIT_FRAME_SIZE);
        assert_eq!(pcb.exit_frame().exit_handler, 0x0010_0400);
        assert_eq!(pcb.exit_frame().argument, 1);
        assert!(!pcb.is_launched());

        assert_eq!(table.queue(QueueKind::Ready).collect::<Vec<_>>(), [pid]);
    }

    #[test]
    fn create_rejects_bad_arguments() {
        let mut heap = heap();
        let mut table = table();
        assert_eq!(
            table.create(&mut heap, "x", 0, Priority::Normal, None, 0),
            Err(ProcessError::InvalidParam)
        );
        assert_eq!(
            table.create(&mut heap, "", ENTRY, Priority::Normal, None, 0),
            Err(ProcessError::InvalidParam)
        );
        assert_eq!(table.next_pid(), Pid::new(1));
    }

    #[test]
    fn stack_exhaustion_consumes_nothing() {
        let mut heap = HeapAllocator::<16>::new(VirtualAddress::new(0x0020_0000), 0x800).unwrap();
        let mut table = table();
        assert_eq!(
            table.create(&mut heap, "big", ENTRY, Priority::Normal, None, 0),
            Err(ProcessError::NoMemory)
        );
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.next_pid(), Pid::new(1));
    }

    #[test]
    fn table_fills_up() {
        let mut heap = HeapAllocator::<128>::new(VirtualAddress::new(0x0020_0000), 0x4_0000).unwrap();
        let mut table = table();
        for i in 1..MAX_PROCESSES {
            table
                .create(&mut heap, "filler", ENTRY, Priority::Normal, None, 0)
                .unwrap_or_else(|e| panic!("process {i}: {e}"));
        }
        assert_eq!(table.live_count() as usize, MAX_PROCESSES);
        assert_eq!(
            table.create(&mut heap, "one too many", ENTRY, Priority::Normal, None, 0),
            Err(ProcessError::QueueFull)
        );
    }

    #[test]
    fn terminate_releases_memory_and_reaps() {
        let mut heap = heap();
        let mut table = table();
        let free_before = heap.free_bytes();

        let pid = table
            .create(&mut heap, "short", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        table.allocate_heap(&mut heap, pid, 256).unwrap();
        assert_eq!(
            table.allocate_heap(&mut heap, pid, 256),
            Err(ProcessError::InvalidState(pid))
        );

        let retired = table.terminate(&mut heap, pid, 3).unwrap();
        assert_eq!(retired.pid, pid);
        assert!(!retired.was_running);
        assert_eq!(retired.released_bytes, DEFAULT_STACK_SIZE + 256);
        assert_eq!(heap.free_bytes(), free_before);

        assert_eq!(table.get(pid).unwrap().state(), ProcessState::Terminated);
        assert_eq!(table.queue(QueueKind::Terminated).collect::<Vec<_>>(), [pid]);
        assert_eq!(table.list(64).count(), 1);

        assert_eq!(table.terminate(&mut heap, pid, 0), Err(ProcessError::NotFound(pid)));
        assert_eq!(table.reap(pid), Ok(3));
        assert_eq!(table.reap(pid), Err(ProcessError::NotFound(pid)));
        assert_eq!(table.get(pid).err(), Some(ProcessError::NotFound(pid)));
    }

    #[test]
    fn idle_cannot_be_terminated() {
        let mut heap = heap();
        let mut table = table();
        assert_eq!(
            table.terminate(&mut heap, Pid::IDLE, 0),
            Err(ProcessError::IdleProcess)
        );
        assert_eq!(table.block(Pid::IDLE), Err(ProcessError::IdleProcess));
    }

    #[test]
    fn reap_refuses_live_processes() {
        let mut heap = heap();
        let mut table = table();
        let pid = table
            .create(&mut heap, "alive", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        assert_eq!(table.reap(pid), Err(ProcessError::StillRunning(pid)));
    }

    #[test]
    fn slot_reuse_unlinks_terminated_entry() {
        let mut heap = heap();
        let mut table = table();
        let first = table
            .create(&mut heap, "first", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        table.terminate(&mut heap, first, 0).unwrap();

        let second = table
            .create(&mut heap, "second", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        assert_eq!(second, Pid::new(2));
        assert_eq!(table.queue(QueueKind::Terminated).count(), 0);
        assert_eq!(table.get(first).err(), Some(ProcessError::NotFound(first)));
    }

    #[test]
    fn block_and_unblock() {
        let mut heap = heap();
        let mut table = table();
        let a = table
            .create(&mut heap, "a", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        let b = table
            .create(&mut heap, "b", ENTRY, Priority::Normal, None, 0)
            .unwrap();

        table.block(a).unwrap();
        assert_eq!(table.get(a).unwrap().state(), ProcessState::Blocked);
        assert_eq!(table.block(a), Err(ProcessError::InvalidState(a)));
        assert_eq!(table.unblock(b), Err(ProcessError::InvalidState(b)));

        let listed: Vec<_> = table.list(64).map(ProcessControlBlock::pid).collect();
        assert_eq!(listed, [Pid::IDLE, b, a]);

        table.unblock(a).unwrap();
        assert_eq!(table.queue(QueueKind::Ready).collect::<Vec<_>>(), [b, a]);
    }

    #[test]
    fn set_priority_validates() {
        let mut heap = heap();
        let mut table = table();
        let pid = table
            .create(&mut heap, "p", ENTRY, Priority::Normal, None, 0)
            .unwrap();
        table.set_priority(pid, 4).unwrap();
        assert_eq!(table.get(pid).unwrap().priority(), Priority::Critical);
        assert_eq!(table.set_priority(pid, 0), Err(ProcessError::InvalidParam));
        assert_eq!(
            table.set_priority(Pid::new(9999), 3),
            Err(ProcessError::NotFound(Pid::new(9999)))
        );
    }

    #[test]
    fn list_respects_max() {
        let mut heap = heap();
        let mut table = table();
        for _ in 0..3 {
            table
                .create(&mut heap, "p", ENTRY, Priority::Normal, None, 0)
                .unwrap();
        }
        assert_eq!(table.list(64).count(), 4);
        assert_eq!(table.list(2).count(), 2);
        assert_eq!(table.list(0).count(), 0);
    }
}
