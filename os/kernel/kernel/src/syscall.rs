//! System call execution.
//!
//! [`kernel_syscall`] decodes registers into a [`Syscall`]; this module runs
//! it against the kernel context and folds the outcome into the `i32`
//! returned in `eax`.

use crate::kernel::Kernel;
use kernel_proc::{ContextSwitch, Pid};
use kernel_syscall::{Syscall, SyscallArgs, SyscallError, SyscallResult, UserMemory, to_return_value};
use kernel_vmem::PhysMapper;

/// Name given to every process created by `fork`.
pub const FORKED_NAME: &str = "forked_process";

fn payload(value: u32) -> SyscallResult {
    i32::try_from(value).map_err(|_| SyscallError::Failed)
}

fn pid_payload(pid: Pid) -> SyscallResult {
    payload(pid.as_u32())
}

/// Decode and run one system call on behalf of the running process.
pub fn handle<M, C, U>(kernel: &mut Kernel<M, C>, user: &mut U, raw: &SyscallArgs) -> i32
where
    M: PhysMapper,
    C: ContextSwitch,
    U: UserMemory,
{
    let result = Syscall::decode(raw).and_then(|call| dispatch(kernel, user, call));
    if let Err(e) = result {
        log::debug!("syscall {} failed: {e}", raw.number);
    }
    to_return_value(result)
}

/// Run a decoded system call.
///
/// # Errors
/// The [`SyscallError`] the caller sees, negated, in `eax`.
pub fn dispatch<M, C, U>(kernel: &mut Kernel<M, C>, user: &mut U, call: Syscall) -> SyscallResult
where
    M: PhysMapper,
    C: ContextSwitch,
    U: UserMemory,
{
    log::trace!("PID {} calls {call:?}", kernel.current());
    match call {
        Syscall::Exit { code } => {
            let pid = kernel.exit(code)?;
            log::debug!("PID {pid} exited with {code}");
            Ok(0)
        }
        Syscall::Fork => fork(kernel),
        Syscall::Wait { pid, status } => {
            let code = kernel.scheduler_mut().wait(pid)?;
            if let Some(status) = status {
                user.store(status, code)?;
            }
            pid_payload(pid)
        }
        Syscall::GetPid => pid_payload(kernel.current()),
        Syscall::GetPpid => {
            let me = kernel.current();
            let parent = kernel.scheduler().get(me)?.parent();
            parent.map_or(Err(SyscallError::NotFound), pid_payload)
        }
        Syscall::Kill { pid, signal } => {
            log::debug!("kill PID {pid} (signal {signal})");
            kernel.kill(pid)?;
            Ok(0)
        }
        Syscall::Yield => {
            kernel.scheduler_mut().yield_now();
            Ok(0)
        }
        Syscall::Malloc { size } => {
            let addr = kernel.kmalloc(size)?;
            payload(addr.as_u32())
        }
        Syscall::Free { addr } => {
            kernel.kfree(addr)?;
            Ok(0)
        }
        Syscall::Ps { out, max, count } => {
            let max = usize::try_from(max).unwrap_or(usize::MAX);
            let mut n = 0;
            for pcb in kernel.scheduler().list(max) {
                user.store(out.element(n)?, pcb.info())?;
                n += 1;
            }
            user.store(count, n)?;
            payload(n)
        }
        Syscall::SetPriority { pid, level } => {
            kernel.scheduler_mut().set_priority(pid, level)?;
            Ok(0)
        }
        Syscall::GetInfo { out } => {
            let me = kernel.current();
            let info = kernel.scheduler().get(me)?.info();
            user.store(out, info)?;
            Ok(0)
        }
        Syscall::Unsupported(sysno) => {
            log::debug!("{} is not implemented", sysno.name());
            Err(SyscallError::Unsupported)
        }
    }
}

/// Start a new process at the caller's saved instruction pointer, on a fresh
/// stack and with the caller's priority. Nothing else is copied.
fn fork<M, C>(kernel: &mut Kernel<M, C>) -> SyscallResult
where
    M: PhysMapper,
    C: ContextSwitch,
{
    let me = kernel.current();
    let (entry, priority) = {
        let pcb = kernel.scheduler().get(me)?;
        (pcb.context().eip, pcb.priority())
    };
    let child = kernel.spawn(FORKED_NAME, entry, priority)?;
    log::debug!("PID {me} forked PID {child} at {:#010x}", entry);
    pid_payload(child)
}
