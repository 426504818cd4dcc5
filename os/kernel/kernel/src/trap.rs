//! Rust side of the interrupt stubs.
//!
//! Both entry points take the address of the [`TrapFrame`](crate::context::TrapFrame)
//! the stub pushed and return the address of the frame to pop, which differs
//! when the scheduler switched processes during the trap.

use crate::context::{FrameMemory, TrapFrameSwitch};
use crate::kernel::Kernel;
use crate::syscall;
use kernel_syscall::UserMemory;
use kernel_vmem::PhysMapper;

impl<M: PhysMapper, F: FrameMemory> Kernel<M, TrapFrameSwitch<F>> {
    /// Handle `int 0x80`.
    ///
    /// The caller's registers are captured first, so `fork` sees the
    /// instruction after the trap. The result lands in the caller's `eax`,
    /// in the live frame if it still runs, otherwise in its saved context.
    pub fn syscall_trap<U: UserMemory>(&mut self, user: &mut U, frame_addr: u32) -> u32 {
        let switch = self.scheduler_mut().context_switch_mut();
        switch.begin_trap(frame_addr);
        let mut frame = switch.read_frame(frame_addr);

        let caller = self.current();
        if let Ok(ctx) = self.scheduler_mut().context_mut(caller) {
            frame.store_into(ctx, frame_addr);
        }

        let result = syscall::handle(self, user, &frame.syscall_args()).cast_unsigned();
        if self.current() == caller {
            frame.eax = result;
            self.scheduler_mut()
                .context_switch_mut()
                .write_frame(frame_addr, &frame);
        } else if let Ok(ctx) = self.scheduler_mut().context_mut(caller) {
            ctx.eax = result;
        }

        self.scheduler_mut().context_switch_mut().finish_trap(frame_addr)
    }

    /// Handle the timer IRQ: account the tick and, when time slicing is on,
    /// preempt an expired process.
    pub fn timer_trap(&mut self, frame_addr: u32) -> u32 {
        self.scheduler_mut().context_switch_mut().begin_trap(frame_addr);
        if self.timer_interrupt() {
            log::trace!("timer preempted, PID {} now running", self.current());
        }
        self.scheduler_mut().context_switch_mut().finish_trap(frame_addr)
    }
}
