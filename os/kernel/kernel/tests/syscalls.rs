//! The `int 0x80` surface, driven through `syscall::handle`.

mod common;

use common::{UserBuf, boot};
use kernel::syscall::{FORKED_NAME, handle};
use kernel::{Kernel, KernelConfig};
use kernel_alloc::BlockTag;
use kernel_proc::{NoContextSwitch, Pid, Priority, ProcessError, ProcessInfo, ProcessState};
use kernel_syscall::{SyscallArgs, SyscallError, Sysno};
use kernel_vmem::testing::FramePool;

type K = Kernel<FramePool, NoContextSwitch>;

const USER_BASE: u32 = 0x0030_0000;

fn call(k: &mut K, user: &mut UserBuf, sysno: Sysno, args: [u32; 3]) -> i32 {
    let raw = SyscallArgs::from_registers(sysno.number(), args[0], args[1], args[2], 0, 0);
    handle(k, user, &raw)
}

/// Where idle was when it trapped; the trap path records this before
/// dispatching.
const IDLE_EIP: u32 = 0x0010_2000;

fn setup() -> (K, UserBuf) {
    let mut k = boot(KernelConfig::default(), NoContextSwitch);
    k.scheduler_mut().context_mut(Pid::IDLE).unwrap().eip = IDLE_EIP;
    (k, UserBuf::new(USER_BASE, 64 * 1024))
}

#[test]
fn identity_calls_from_idle() {
    let (mut k, mut u) = setup();
    assert_eq!(call(&mut k, &mut u, Sysno::GetPid, [0; 3]), 0);
    assert_eq!(
        call(&mut k, &mut u, Sysno::GetPpid, [0; 3]),
        SyscallError::NotFound.code()
    );
}

#[test]
fn error_codes_are_negative() {
    let (mut k, mut u) = setup();
    assert_eq!(call(&mut k, &mut u, Sysno::Kill, [0, 9, 0]), -4);
    assert_eq!(call(&mut k, &mut u, Sysno::Kill, [42, 9, 0]), -3);
    assert_eq!(call(&mut k, &mut u, Sysno::Free, [0; 3]), -2);
    assert_eq!(call(&mut k, &mut u, Sysno::Malloc, [0; 3]), -2);
    assert_eq!(call(&mut k, &mut u, Sysno::Exec, [0; 3]), -7);
    assert_eq!(call(&mut k, &mut u, Sysno::Open, [0; 3]), -7);
    assert_eq!(handle(&mut k, &mut u, &SyscallArgs::from_registers(99, 0, 0, 0, 0, 0)), -2);
    // Idle cannot exit.
    assert_eq!(call(&mut k, &mut u, Sysno::Exit, [0; 3]), -4);
}

#[test]
fn malloc_returns_heap_pointers() {
    let (mut k, mut u) = setup();
    let a = call(&mut k, &mut u, Sysno::Malloc, [64, 0, 0]);
    let b = call(&mut k, &mut u, Sysno::Malloc, [64, 0, 0]);
    assert!(a > 0x0020_0000 && a < 0x0030_0000, "{a:#x}");
    assert!(b > a);

    assert_eq!(call(&mut k, &mut u, Sysno::Free, [a.cast_unsigned(), 0, 0]), 0);
    assert_eq!(call(&mut k, &mut u, Sysno::Free, [a.cast_unsigned(), 0, 0]), -2);
    assert_eq!(call(&mut k, &mut u, Sysno::Malloc, [0x0100_0000, 0, 0]), -5);
}

#[test]
fn fork_creates_a_ready_child() {
    let (mut k, mut u) = setup();
    let child = call(&mut k, &mut u, Sysno::Fork, [0; 3]);
    assert_eq!(child, 1);

    let pcb = k.scheduler().get(Pid::new(1)).unwrap();
    assert_eq!(pcb.name().as_str(), FORKED_NAME);
    assert_eq!(pcb.parent(), Some(Pid::IDLE));
    assert_eq!(pcb.priority(), Priority::Low);
    assert_eq!(pcb.state(), ProcessState::Ready);
    assert_eq!(pcb.context().eip, IDLE_EIP);
}

#[test]
fn yield_hands_over_and_exit_hands_back() {
    let (mut k, mut u) = setup();
    call(&mut k, &mut u, Sysno::Fork, [0; 3]);

    assert_eq!(call(&mut k, &mut u, Sysno::Yield, [0; 3]), 0);
    assert_eq!(call(&mut k, &mut u, Sysno::GetPid, [0; 3]), 1);
    assert_eq!(call(&mut k, &mut u, Sysno::GetPpid, [0; 3]), 0);

    assert_eq!(call(&mut k, &mut u, Sysno::Exit, [7, 0, 0]), 0);
    assert_eq!(k.current(), Pid::IDLE);

    let status = u.addr(0);
    assert_eq!(call(&mut k, &mut u, Sysno::Wait, [1, status, 0]), 1);
    assert_eq!(u.load::<i32>(status), 7);
    // Reaped; a second wait finds nothing.
    assert_eq!(call(&mut k, &mut u, Sysno::Wait, [1, 0, 0]), -3);
}

#[test]
fn wait_on_a_live_process_fails() {
    let (mut k, mut u) = setup();
    call(&mut k, &mut u, Sysno::Fork, [0; 3]);
    assert_eq!(call(&mut k, &mut u, Sysno::Wait, [1, 0, 0]), -1);

    assert_eq!(call(&mut k, &mut u, Sysno::Kill, [1, 9, 0]), 0);
    let status = u.addr(16);
    assert_eq!(call(&mut k, &mut u, Sysno::Wait, [1, status, 0]), 1);
    assert_eq!(u.load::<i32>(status), -1);
}

#[test]
fn ps_copies_snapshots_and_count() {
    let (mut k, mut u) = setup();
    call(&mut k, &mut u, Sysno::Fork, [0; 3]);
    call(&mut k, &mut u, Sysno::Fork, [0; 3]);

    let out = u.addr(0);
    let count = u.addr(0x1000);
    assert_eq!(call(&mut k, &mut u, Sysno::Ps, [out, 8, count]), 3);
    assert_eq!(u.load::<u32>(count), 3);

    let stride = u32::try_from(size_of::<ProcessInfo>()).unwrap();
    let pids: Vec<_> = (0..3)
        .map(|i| u.load::<ProcessInfo>(out + i * stride).pid)
        .collect();
    assert_eq!(pids, vec![Pid::new(0), Pid::new(1), Pid::new(2)]);

    // `max` bounds the copy.
    assert_eq!(call(&mut k, &mut u, Sysno::Ps, [out, 1, count]), 1);
    assert_eq!(u.load::<u32>(count), 1);

    // Null pointers are rejected before anything runs.
    assert_eq!(call(&mut k, &mut u, Sysno::Ps, [0, 8, count]), -2);
}

#[test]
fn getinfo_describes_the_caller() {
    let (mut k, mut u) = setup();
    let out = u.addr(0x200);
    assert_eq!(call(&mut k, &mut u, Sysno::GetInfo, [out, 0, 0]), 0);

    let info = u.load::<ProcessInfo>(out);
    assert_eq!(info.pid, Pid::IDLE);
    assert_eq!(info.name.as_str(), "idle");
    assert_eq!(info.state, ProcessState::Running);

    // Outside the caller's memory.
    assert_eq!(call(&mut k, &mut u, Sysno::GetInfo, [0x10, 0, 0]), -2);
}

#[test]
fn setpriority_validates_level_and_pid() {
    let (mut k, mut u) = setup();
    call(&mut k, &mut u, Sysno::Fork, [0; 3]);

    assert_eq!(call(&mut k, &mut u, Sysno::SetPriority, [1, 4, 0]), 0);
    assert_eq!(k.scheduler().get(Pid::new(1)).unwrap().priority(), Priority::Critical);
    assert_eq!(call(&mut k, &mut u, Sysno::SetPriority, [1, 9, 0]), -2);
    assert_eq!(call(&mut k, &mut u, Sysno::SetPriority, [1, 0, 0]), -2);
    assert_eq!(call(&mut k, &mut u, Sysno::SetPriority, [42, 2, 0]), -3);
}

fn blocks_tagged(k: &K, tag: BlockTag) -> Vec<u32> {
    k.heap_blocks()
        .filter(|b| b.tag == tag)
        .map(|b| b.start.as_u32())
        .collect()
}

#[test]
fn process_stacks_cannot_be_freed() {
    let (mut k, mut u) = setup();
    let child = call(&mut k, &mut u, Sysno::Fork, [0; 3]);
    let stack = k.scheduler().get(Pid::new(1)).unwrap().stack().unwrap().base.as_u32();
    assert_eq!(blocks_tagged(&k, BlockTag::Reserved), vec![stack]);

    assert_eq!(
        call(&mut k, &mut u, Sysno::Free, [stack, 0, 0]),
        SyscallError::AccessDenied.code()
    );
    assert_eq!(blocks_tagged(&k, BlockTag::Reserved), vec![stack]);

    // The stack is still taken, so a fresh allocation lands elsewhere and
    // survives the owner's termination.
    let buf = call(&mut k, &mut u, Sysno::Malloc, [64, 0, 0]).cast_unsigned();
    assert_ne!(buf, stack);
    assert_eq!(call(&mut k, &mut u, Sysno::Kill, [child.cast_unsigned(), 9, 0]), 0);
    assert!(blocks_tagged(&k, BlockTag::Reserved).is_empty());
    assert_eq!(blocks_tagged(&k, BlockTag::Allocated), vec![buf]);
    assert_eq!(call(&mut k, &mut u, Sysno::Free, [buf, 0, 0]), 0);
}

#[test]
fn spawned_processes_get_a_private_heap() {
    let config = KernelConfig {
        process_heap_size: 1024,
        ..KernelConfig::default()
    };
    let mut k = boot(config, NoContextSwitch);
    k.scheduler_mut().context_mut(Pid::IDLE).unwrap().eip = IDLE_EIP;
    let mut u = UserBuf::new(USER_BASE, 4096);

    assert_eq!(call(&mut k, &mut u, Sysno::Fork, [0; 3]), 1);
    let pcb = k.scheduler().get(Pid::new(1)).unwrap();
    let heap = pcb.heap().unwrap();
    assert_eq!(heap.size, 1024);
    let stack = pcb.stack().unwrap();
    assert_eq!(
        blocks_tagged(&k, BlockTag::Reserved),
        vec![stack.base.as_u32(), heap.base.as_u32()]
    );

    assert_eq!(
        call(&mut k, &mut u, Sysno::Free, [heap.base.as_u32(), 0, 0]),
        SyscallError::AccessDenied.code()
    );
    // A second region for the same process is refused.
    assert_eq!(
        k.allocate_process_heap(Pid::new(1), 64),
        Err(ProcessError::InvalidState(Pid::new(1)))
    );

    k.kill(Pid::new(1)).unwrap();
    assert_eq!(k.heap_blocks().count(), 1);
    assert!(k.heap_blocks().all(|b| b.is_free()));
}

#[test]
fn failed_private_heap_discards_the_process() {
    let config = KernelConfig {
        process_heap_size: 0x0100_0000,
        ..KernelConfig::default()
    };
    let mut k = boot(config, NoContextSwitch);
    k.scheduler_mut().context_mut(Pid::IDLE).unwrap().eip = IDLE_EIP;
    let mut u = UserBuf::new(USER_BASE, 4096);

    assert_eq!(
        call(&mut k, &mut u, Sysno::Fork, [0; 3]),
        SyscallError::NoMemory.code()
    );
    assert_eq!(k.scheduler().table().live_count(), 1);
    assert_eq!(k.scheduler().get(Pid::new(1)).err(), Some(ProcessError::NotFound(Pid::new(1))));
    assert!(k.heap_blocks().all(|b| b.is_free()));
}
