//! Interrupt-driven switching through `TrapFrameSwitch`.

mod common;

use common::{UserBuf, WordMemory, boot};
use kernel::context::TRAP_FRAME_BYTES;
use kernel::{Kernel, KernelConfig, TrapFrame, TrapFrameSwitch};
use kernel_info::process::{INITIAL_EFLAGS, KERNEL_CODE_SELECTOR};
use kernel_proc::{Pid, Preemption, Priority, ProcessState};
use kernel_syscall::Sysno;
use kernel_vmem::testing::FramePool;

type K = Kernel<FramePool, TrapFrameSwitch<WordMemory>>;

const EXIT_HANDLER: u32 = 0x0010_0f00;
const ENTRY: u32 = 0x0010_4000;
const IDLE_EIP: u32 = 0x0010_3000;
const IDLE_FRAME: u32 = 0x0009_0000;

fn kernel(preemption: Preemption) -> K {
    let config = KernelConfig {
        exit_handler: EXIT_HANDLER,
        time_slice: 2,
        preemption,
        ..KernelConfig::default()
    };
    boot(config, TrapFrameSwitch::new(WordMemory::default()))
}

fn frame(k: &K, addr: u32) -> TrapFrame {
    k.scheduler().context_switch().read_frame(addr)
}

fn put_frame(k: &mut K, addr: u32, frame: &TrapFrame) {
    k.scheduler_mut().context_switch_mut().write_frame(addr, frame);
}

/// Idle, interrupted somewhere in its halt loop.
fn idle_frame() -> TrapFrame {
    TrapFrame {
        eip: IDLE_EIP,
        cs: u32::from(KERNEL_CODE_SELECTOR),
        eflags: INITIAL_EFLAGS,
        ds: 0x10,
        es: 0x10,
        fs: 0x10,
        gs: 0x10,
        ..TrapFrame::default()
    }
}

fn syscall(k: &mut K, user: &mut UserBuf, at: u32, sysno: Sysno, ebx: u32, ecx: u32) -> u32 {
    let f = TrapFrame {
        eax: sysno.number(),
        ebx,
        ecx,
        ..frame(k, at)
    };
    put_frame(k, at, &f);
    k.syscall_trap(user, at)
}

#[test]
fn first_dispatch_launches_on_the_new_stack() {
    let mut k = kernel(Preemption::TimeSliced);
    let pid = k.spawn("worker", ENTRY, Priority::Normal).unwrap();
    let top = k.scheduler().get(pid).unwrap().stack().unwrap().top().as_u32();

    put_frame(&mut k, IDLE_FRAME, &idle_frame());
    let resume = k.timer_trap(IDLE_FRAME);

    assert_eq!(k.current(), pid);
    let esp = top - 16;
    assert_eq!(resume, esp - TRAP_FRAME_BYTES);

    let words = k.scheduler().context_switch().memory();
    assert_eq!(
        [esp, esp + 4, esp + 8, esp + 12].map(|a| words.word(a)),
        [EXIT_HANDLER, 0, pid.as_u32(), 0]
    );

    let launched = frame(&k, resume);
    assert_eq!(launched.eip, ENTRY);
    assert_eq!(launched.eflags, INITIAL_EFLAGS);
    assert_eq!(launched.cs, u32::from(KERNEL_CODE_SELECTOR));
    assert!(k.scheduler().get(pid).unwrap().is_launched());

    let idle = k.scheduler().get(Pid::IDLE).unwrap();
    assert_eq!(idle.context().eip, IDLE_EIP);
    assert_eq!(idle.context().esp, IDLE_FRAME + TRAP_FRAME_BYTES);
}

#[test]
fn cooperative_timer_only_counts() {
    let mut k = kernel(Preemption::Cooperative);
    k.spawn("worker", ENTRY, Priority::Normal).unwrap();

    put_frame(&mut k, IDLE_FRAME, &idle_frame());
    for _ in 0..5 {
        assert_eq!(k.timer_trap(IDLE_FRAME), IDLE_FRAME);
    }
    assert_eq!(k.current(), Pid::IDLE);
    assert_eq!(k.scheduler().get(Pid::IDLE).unwrap().cpu_time(), 5);
    assert_eq!(k.scheduler_stats().clock, 5);
}

#[test]
fn syscall_result_lands_in_the_live_frame() {
    let mut k = kernel(Preemption::TimeSliced);
    let mut user = UserBuf::new(0x0030_0000, 4096);
    let pid = k.spawn("worker", ENTRY, Priority::Normal).unwrap();
    put_frame(&mut k, IDLE_FRAME, &idle_frame());
    let at = k.timer_trap(IDLE_FRAME);

    assert_eq!(syscall(&mut k, &mut user, at, Sysno::GetPid, 0, 0), at);
    assert_eq!(frame(&k, at).eax, pid.as_u32());

    // Nothing else is ready, so yielding resumes the caller.
    assert_eq!(syscall(&mut k, &mut user, at, Sysno::Yield, 0, 0), at);
    assert_eq!(frame(&k, at).eax, 0);
    assert_eq!(k.current(), pid);
}

#[test]
fn exit_resumes_idle_where_it_was() {
    let mut k = kernel(Preemption::TimeSliced);
    let mut user = UserBuf::new(0x0030_0000, 4096);
    let pid = k.spawn("worker", ENTRY, Priority::Normal).unwrap();
    put_frame(&mut k, IDLE_FRAME, &idle_frame());
    let at = k.timer_trap(IDLE_FRAME);

    let resume = syscall(&mut k, &mut user, at, Sysno::Exit, 3, 0);
    assert_eq!(resume, IDLE_FRAME);
    assert_eq!(k.current(), Pid::IDLE);
    assert_eq!(frame(&k, resume).eip, IDLE_EIP);
    assert_eq!(k.scheduler().get(pid).unwrap().state(), ProcessState::Terminated);

    let status = user.addr(0);
    assert_eq!(
        syscall(&mut k, &mut user, IDLE_FRAME, Sysno::Wait, pid.as_u32(), status),
        IDLE_FRAME
    );
    assert_eq!(frame(&k, IDLE_FRAME).eax, pid.as_u32());
    assert_eq!(user.load::<i32>(status), 3);
}

#[test]
fn switched_away_caller_gets_its_result_later() {
    let mut k = kernel(Preemption::TimeSliced);
    let mut user = UserBuf::new(0x0030_0000, 4096);
    let a = k.spawn("a", ENTRY, Priority::Normal).unwrap();
    let b = k.spawn("b", ENTRY, Priority::Normal).unwrap();
    put_frame(&mut k, IDLE_FRAME, &idle_frame());
    let at_a = k.timer_trap(IDLE_FRAME);
    assert_eq!(k.current(), a);

    // `a` yields to `b`; its result is parked in its saved context.
    let at_b = syscall(&mut k, &mut user, at_a, Sysno::Yield, 0, 0);
    assert_eq!(k.current(), b);
    assert_ne!(at_b, at_a);
    assert_eq!(k.scheduler().get(a).unwrap().context().eax, 0);

    // `b` yields back; `a` resumes with `eax = 0` in a rebuilt frame.
    let back = syscall(&mut k, &mut user, at_b, Sysno::Yield, 0, 0);
    assert_eq!(k.current(), a);
    assert_eq!(back, at_a);
    assert_eq!(frame(&k, back).eax, 0);
}

#[test]
fn fork_starts_the_child_after_the_trap() {
    let mut k = kernel(Preemption::TimeSliced);
    let mut user = UserBuf::new(0x0030_0000, 4096);
    put_frame(&mut k, IDLE_FRAME, &idle_frame());

    let resume = syscall(&mut k, &mut user, IDLE_FRAME, Sysno::Fork, 0, 0);
    assert_eq!(resume, IDLE_FRAME);
    let child = Pid::new(frame(&k, IDLE_FRAME).eax);
    assert_eq!(child, Pid::new(1));
    assert_eq!(k.scheduler().get(child).unwrap().context().eip, IDLE_EIP);
}
