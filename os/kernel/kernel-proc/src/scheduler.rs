//! Round-robin dispatch over the process table.
//!
//! The scheduler owns the table and a [`ContextSwitch`] boundary. It decides
//! who runs and keeps the slice/CPU-time books; registers are the boundary's
//! business.

use crate::context::ContextSwitch;
use crate::stack::RegionAllocator;
use crate::table::{Park, ProcessTable};
use crate::{MemoryRegion, Pid, Priority, ProcessControlBlock, ProcessError, RegisterContext};

/// Whether timer interrupts can take the CPU away from a process.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Preemption {
    /// Only `yield`, `exit`, `kill` and blocking reschedule. Timer
    /// interrupts account CPU time but never switch.
    #[default]
    Cooperative,
    /// Timer interrupts also drain the running slice and call
    /// [`Scheduler::tick`].
    TimeSliced,
}

/// Counters; never reset.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SchedulerStats {
    /// Calls to [`Scheduler::tick`].
    pub ticks: u64,
    /// Timer interrupts seen.
    pub clock: u64,
    /// Switches that changed the running process.
    pub switches: u64,
    pub created: u64,
    pub terminated: u64,
}

pub struct Scheduler<C: ContextSwitch> {
    table: ProcessTable,
    switch: C,
    preemption: Preemption,
    stats: SchedulerStats,
}

impl<C: ContextSwitch> Scheduler<C> {
    pub fn new(table: ProcessTable, switch: C, preemption: Preemption) -> Self {
        log::debug!("Scheduler ready ({preemption:?})");
        Self {
            table,
            switch,
            preemption,
            stats: SchedulerStats::default(),
        }
    }

    #[must_use]
    pub const fn table(&self) -> &ProcessTable {
        &self.table
    }

    #[must_use]
    pub const fn preemption(&self) -> Preemption {
        self.preemption
    }

    #[must_use]
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub const fn context_switch(&self) -> &C {
        &self.switch
    }

    pub const fn context_switch_mut(&mut self) -> &mut C {
        &mut self.switch
    }

    /// PID of the running process.
    #[must_use]
    pub fn current(&self) -> Pid {
        self.table.current()
    }

    /// Create a child of the running process.
    ///
    /// # Errors
    /// See [`ProcessTable::create`].
    pub fn create<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        name: &str,
        entry: u32,
        priority: Priority,
    ) -> Result<Pid, ProcessError> {
        let parent = self.current();
        let pid = self
            .table
            .create(stacks, name, entry, priority, Some(parent), self.stats.clock)?;
        self.stats.created += 1;
        Ok(pid)
    }

    /// Kill `pid` with exit code `-1`.
    ///
    /// If it was running, the next ready process (or idle) takes over
    /// before this returns.
    ///
    /// # Errors
    /// See [`ProcessTable::terminate`].
    pub fn terminate<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        pid: Pid,
    ) -> Result<(), ProcessError> {
        self.retire(stacks, pid, -1)
    }

    /// Terminate the running process with `exit_code`. Returns its PID.
    ///
    /// # Errors
    /// [`ProcessError::IdleProcess`] if idle is running.
    pub fn exit<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        exit_code: i32,
    ) -> Result<Pid, ProcessError> {
        let pid = self.current();
        self.retire(stacks, pid, exit_code)?;
        Ok(pid)
    }

    fn retire<S: RegionAllocator>(
        &mut self,
        stacks: &mut S,
        pid: Pid,
        exit_code: i32,
    ) -> Result<(), ProcessError> {
        let retired = self.table.terminate(stacks, pid, exit_code)?;
        self.stats.terminated += 1;
        if retired.was_running {
            self.reschedule(Park::Ready);
        }
        Ok(())
    }

    /// Collect the exit code of a terminated process.
    ///
    /// # Errors
    /// See [`ProcessTable::reap`].
    pub fn wait(&mut self, pid: Pid) -> Result<i32, ProcessError> {
        self.table.reap(pid)
    }

    /// Count a scheduler tick and switch if the running slice is used up.
    ///
    /// Returns whether a different process is running afterwards.
    pub fn tick(&mut self) -> bool {
        self.stats.ticks += 1;
        let expired = self
            .table
            .running()
            .is_none_or(|pcb| pcb.remaining_slice() == 0);
        expired && self.reschedule(Park::Ready)
    }

    /// Requeue the running process and run the ready head (or idle).
    ///
    /// Returns the PID now running.
    pub fn dispatch(&mut self) -> Pid {
        self.reschedule(Park::Ready);
        self.current()
    }

    /// Give up the rest of the running slice.
    ///
    /// Returns the PID now running, which is the caller again if nothing
    /// else is ready.
    pub fn yield_now(&mut self) -> Pid {
        if let Some(pcb) = self.table.running_mut() {
            pcb.remaining_slice = 0;
        }
        self.tick();
        self.current()
    }

    /// Account one timer interrupt.
    ///
    /// Charges the running process one tick of CPU time. Under
    /// [`Preemption::TimeSliced`] its slice is drained as well and an
    /// expired slice leads to a switch. Returns whether one happened.
    pub fn timer_interrupt(&mut self) -> bool {
        self.stats.clock += 1;
        let sliced = self.preemption == Preemption::TimeSliced;
        if let Some(pcb) = self.table.running_mut() {
            pcb.cpu_time += 1;
            if sliced {
                pcb.remaining_slice = pcb.remaining_slice.saturating_sub(1);
            }
        }
        sliced && self.tick()
    }

    /// Move `pid` to the blocked queue, switching away if it is running.
    ///
    /// # Errors
    /// - [`ProcessError::IdleProcess`] for PID 0.
    /// - [`ProcessError::NotFound`] / [`ProcessError::InvalidState`] as in
    ///   [`ProcessTable::block`].
    pub fn block(&mut self, pid: Pid) -> Result<(), ProcessError> {
        if pid.is_idle() {
            return Err(ProcessError::IdleProcess);
        }
        if self.current() == pid {
            self.reschedule(Park::Blocked);
            Ok(())
        } else {
            self.table.block(pid)
        }
    }

    /// Make a blocked process ready again. It runs when its turn comes.
    ///
    /// # Errors
    /// See [`ProcessTable::unblock`].
    pub fn unblock(&mut self, pid: Pid) -> Result<(), ProcessError> {
        self.table.unblock(pid)
    }

    /// # Errors
    /// See [`ProcessTable::get`].
    pub fn get(&self, pid: Pid) -> Result<&ProcessControlBlock, ProcessError> {
        self.table.get(pid)
    }

    pub fn list(&self, max: usize) -> impl Iterator<Item = &ProcessControlBlock> + '_ {
        self.table.list(max)
    }

    /// # Errors
    /// See [`ProcessTable::context_mut`].
    pub fn context_mut(&mut self, pid: Pid) -> Result<&mut RegisterContext, ProcessError> {
        self.table.context_mut(pid)
    }

    /// # Errors
    /// See [`ProcessTable::set_priority`].
    pub fn set_priority(&mut self, pid: Pid, level: u32) -> Result<(), ProcessError> {
        self.table.set_priority(pid, level)
    }

    /// # Errors
    /// See [`ProcessTable::allocate_heap`].
    pub fn allocate_heap<S: RegionAllocator>(
        &mut self,
        regions: &mut S,
        pid: Pid,
        size: u32,
    ) -> Result<MemoryRegion, ProcessError> {
        self.table.allocate_heap(regions, pid, size)
    }

    /// Park the running process (if any), pick the next one and switch.
    fn reschedule(&mut self, intent: Park) -> bool {
        let outgoing = self.table.park(intent);
        let next = self.table.next_ready();
        self.switch(outgoing, next)
    }

    /// Make `next` the running process and hand both PCBs to the boundary.
    ///
    /// Re-selecting the outgoing process only refreshes its slice.
    fn switch(&mut self, outgoing: Option<usize>, next: usize) -> bool {
        let changed = outgoing != Some(next);
        if changed && let Some(out) = outgoing {
            self.switch.save(self.table.slot_mut(out));
        }

        self.table.set_running(next, self.stats.clock);

        if changed {
            self.stats.switches += 1;
            let incoming = self.table.slot_mut(next);
            log::trace!("Switching to process {}", incoming.pid());
            self.switch.restore(incoming);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableConfig;
    use crate::{ProcessState, QueueKind};
    use kernel_alloc::HeapAllocator;
    use kernel_memory_addresses::VirtualAddress;

    const ENTRY: u32 = 0x0010_2000;

    #[derive(Default)]
    struct RecordingSwitch {
        saved: Vec<Pid>,
        restored: Vec<Pid>,
    }

    impl ContextSwitch for RecordingSwitch {
        fn save(&mut self, outgoing: &mut ProcessControlBlock) {
            self.saved.push(outgoing.pid());
        }

        fn restore(&mut self, incoming: &mut ProcessControlBlock) {
            self.restored.push(incoming.pid());
            incoming.mark_launched();
        }
    }

    fn heap() -> HeapAllocator<64> {
        HeapAllocator::new(VirtualAddress::new(0x0020_0000), 0x10_0000).unwrap()
    }

    fn scheduler(preemption: Preemption) -> Scheduler<RecordingSwitch> {
        let table = ProcessTable::new(TableConfig {
            time_slice: 3,
            ..TableConfig::default()
        });
        Scheduler::new(table, RecordingSwitch::default(), preemption)
    }

    fn spawn(s: &mut Scheduler<RecordingSwitch>, heap: &mut HeapAllocator<64>, n: usize) -> Vec<Pid> {
        (0..n)
            .map(|_| s.create(heap, "p", ENTRY, Priority::Normal).unwrap())
            .collect()
    }

    #[test]
    fn round_robin_is_fifo() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pids = spawn(&mut s, &mut heap, 3);

        let order: Vec<_> = (0..6).map(|_| s.yield_now()).collect();
        assert_eq!(order, [pids[0], pids[1], pids[2], pids[0], pids[1], pids[2]]);
        assert_eq!(s.stats().switches, 6);
    }

    #[test]
    fn switch_hands_both_sides_to_boundary() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pids = spawn(&mut s, &mut heap, 2);

        s.dispatch();
        s.dispatch();
        let rec = s.context_switch();
        assert_eq!(rec.saved, [Pid::IDLE, pids[0]]);
        assert_eq!(rec.restored, [pids[0], pids[1]]);
        assert!(s.get(pids[0]).unwrap().is_launched());
    }

    #[test]
    fn yield_alone_keeps_running_without_switch() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pid = spawn(&mut s, &mut heap, 1)[0];
        assert_eq!(s.dispatch(), pid);

        assert_eq!(s.yield_now(), pid);
        assert_eq!(s.get(pid).unwrap().remaining_slice(), 3);
        assert_eq!(s.context_switch().saved, [Pid::IDLE]);
    }

    #[test]
    fn idle_yields_to_nobody() {
        let mut s = scheduler(Preemption::Cooperative);
        assert_eq!(s.yield_now(), Pid::IDLE);
        assert_eq!(s.stats().switches, 0);
        assert!(s.context_switch().restored.is_empty());
    }

    #[test]
    fn tick_waits_for_slice_to_expire() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pids = spawn(&mut s, &mut heap, 2);
        s.dispatch();

        // Cooperative: the timer never drains the slice.
        for _ in 0..10 {
            assert!(!s.timer_interrupt());
        }
        assert_eq!(s.current(), pids[0]);
        assert_eq!(s.get(pids[0]).unwrap().cpu_time(), 10);
        assert!(!s.tick());
        assert_eq!(s.stats().ticks, 1);
    }

    #[test]
    fn time_sliced_preemption() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::TimeSliced);
        let pids = spawn(&mut s, &mut heap, 2);

        // Idle has a zero slice and gives way on the first interrupt.
        assert!(s.timer_interrupt());
        assert_eq!(s.current(), pids[0]);

        assert!(!s.timer_interrupt());
        assert!(!s.timer_interrupt());
        assert!(s.timer_interrupt());
        assert_eq!(s.current(), pids[1]);
        assert_eq!(s.get(pids[0]).unwrap().cpu_time(), 3);
        assert_eq!(s.get(pids[1]).unwrap().last_run_tick(), 4);
    }

    #[test]
    fn terminating_the_running_process_switches() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pids = spawn(&mut s, &mut heap, 2);
        s.dispatch();

        s.terminate(&mut heap, pids[0]).unwrap();
        assert_eq!(s.current(), pids[1]);
        assert_eq!(s.get(pids[0]).unwrap().exit_code(), -1);
        // The terminated process is not saved.
        assert_eq!(s.context_switch().saved, [Pid::IDLE]);

        assert_eq!(s.exit(&mut heap, 7), Ok(pids[1]));
        assert_eq!(s.current(), Pid::IDLE);
        assert_eq!(s.wait(pids[1]), Ok(7));
        assert_eq!(s.exit(&mut heap, 0), Err(ProcessError::IdleProcess));
        assert_eq!(s.stats().terminated, 2);
    }

    #[test]
    fn blocking_the_running_process() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let pids = spawn(&mut s, &mut heap, 2);
        s.dispatch();

        s.block(pids[0]).unwrap();
        assert_eq!(s.current(), pids[1]);
        assert_eq!(s.get(pids[0]).unwrap().state(), ProcessState::Blocked);
        assert_eq!(
            s.table().queue(QueueKind::Blocked).collect::<Vec<_>>(),
            [pids[0]]
        );

        s.unblock(pids[0]).unwrap();
        assert_eq!(s.current(), pids[1]);
        assert_eq!(s.yield_now(), pids[0]);
        assert_eq!(s.block(Pid::IDLE), Err(ProcessError::IdleProcess));
    }

    #[test]
    fn children_record_their_parent() {
        let mut heap = heap();
        let mut s = scheduler(Preemption::Cooperative);
        let parent = spawn(&mut s, &mut heap, 1)[0];
        assert_eq!(s.get(parent).unwrap().parent(), Some(Pid::IDLE));

        s.dispatch();
        let child = s.create(&mut heap, "child", ENTRY, Priority::Low).unwrap();
        assert_eq!(s.get(child).unwrap().parent(), Some(parent));
    }
}
