use crate::{Sysno, SyscallError, UserPtr};
use kernel_memory_addresses::VirtualAddress;
use kernel_proc::{Pid, ProcessInfo};

/// Raw register contents at the trap.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SyscallArgs {
    pub number: u32,
    pub args: [u32; 5],
}

impl SyscallArgs {
    /// `eax` holds the number, `ebx` through `edi` the arguments.
    #[must_use]
    pub const fn from_registers(eax: u32, ebx: u32, ecx: u32, edx: u32, esi: u32, edi: u32) -> Self {
        Self {
            number: eax,
            args: [ebx, ecx, edx, esi, edi],
        }
    }
}

/// A decoded system call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Syscall {
    /// Terminate the caller with an exit code.
    Exit { code: i32 },
    /// Start a copy of the caller at its saved instruction pointer.
    Fork,
    /// Collect a terminated process's exit code. Returns its PID.
    Wait {
        pid: Pid,
        status: Option<UserPtr<i32>>,
    },
    GetPid,
    GetPpid,
    /// Terminate another process. Signals are not distinguished.
    Kill { pid: Pid, signal: u32 },
    Yield,
    Malloc { size: u32 },
    Free { addr: VirtualAddress },
    /// Copy up to `max` process snapshots to `out`, store the count.
    Ps {
        out: UserPtr<ProcessInfo>,
        max: u32,
        count: UserPtr<u32>,
    },
    SetPriority { pid: Pid, level: u32 },
    /// Copy the caller's own snapshot to `out`.
    GetInfo { out: UserPtr<ProcessInfo> },
    /// A known number the kernel does not serve.
    Unsupported(Sysno),
}

impl Syscall {
    /// # Errors
    /// [`SyscallError::InvalidParam`] for an unknown number or a null
    /// pointer where one is required.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(raw: &SyscallArgs) -> Result<Self, SyscallError> {
        let [a0, a1, a2, _, _] = raw.args;
        let sysno = Sysno::try_from(raw.number)?;
        Ok(match sysno {
            Sysno::Exit => Self::Exit { code: a0 as i32 },
            Sysno::Fork => Self::Fork,
            Sysno::Wait => Self::Wait {
                pid: Pid::new(a0),
                status: UserPtr::optional(a1),
            },
            Sysno::GetPid => Self::GetPid,
            Sysno::GetPpid => Self::GetPpid,
            Sysno::Kill => Self::Kill {
                pid: Pid::new(a0),
                signal: a1,
            },
            Sysno::Yield => Self::Yield,
            Sysno::Malloc => Self::Malloc { size: a0 },
            Sysno::Free => {
                if a0 == 0 {
                    return Err(SyscallError::InvalidParam);
                }
                Self::Free {
                    addr: VirtualAddress::new(a0),
                }
            }
            Sysno::Ps => Self::Ps {
                out: UserPtr::new(a0)?,
                max: a1,
                count: UserPtr::new(a2)?,
            },
            Sysno::SetPriority => Self::SetPriority {
                pid: Pid::new(a0),
                level: a1,
            },
            Sysno::GetInfo => Self::GetInfo {
                out: UserPtr::new(a0)?,
            },
            other => Self::Unsupported(other),
        })
    }

    #[must_use]
    pub const fn sysno(&self) -> Option<Sysno> {
        Some(match self {
            Self::Exit { .. } => Sysno::Exit,
            Self::Fork => Sysno::Fork,
            Self::Wait { .. } => Sysno::Wait,
            Self::GetPid => Sysno::GetPid,
            Self::GetPpid => Sysno::GetPpid,
            Self::Kill { .. } => Sysno::Kill,
            Self::Yield => Sysno::Yield,
            Self::Malloc { .. } => Sysno::Malloc,
            Self::Free { .. } => Sysno::Free,
            Self::Ps { .. } => Sysno::Ps,
            Self::SetPriority { .. } => Sysno::SetPriority,
            Self::GetInfo { .. } => Sysno::GetInfo,
            Self::Unsupported(_) => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(number: u32, args: [u32; 3]) -> Result<Syscall, SyscallError> {
        Syscall::decode(&SyscallArgs::from_registers(
            number, args[0], args[1], args[2], 0, 0,
        ))
    }

    #[test]
    fn registers_in_order() {
        let raw = SyscallArgs::from_registers(7, 1, 2, 3, 4, 5);
        assert_eq!(raw.number, 7);
        assert_eq!(raw.args, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn process_calls() {
        assert_eq!(decode(1, [u32::MAX, 0, 0]), Ok(Syscall::Exit { code: -1 }));
        assert_eq!(
            decode(7, [3, 9, 0]),
            Ok(Syscall::Kill {
                pid: Pid::new(3),
                signal: 9
            })
        );
        assert_eq!(
            decode(4, [2, 0, 0]),
            Ok(Syscall::Wait {
                pid: Pid::new(2),
                status: None
            })
        );
        assert_eq!(decode(8, [0; 3]).unwrap().sysno(), Some(Sysno::Yield));
    }

    #[test]
    fn pointers_are_checked() {
        assert_eq!(decode(31, [0; 3]), Err(SyscallError::InvalidParam));
        assert_eq!(decode(42, [0; 3]), Err(SyscallError::InvalidParam));
        assert_eq!(decode(40, [0x1000, 4, 0]), Err(SyscallError::InvalidParam));
        assert!(matches!(
            decode(40, [0x1000, 4, 0x2000]),
            Ok(Syscall::Ps { max: 4, .. })
        ));
    }

    #[test]
    fn unserved_and_unknown_numbers() {
        assert_eq!(decode(3, [0; 3]), Ok(Syscall::Unsupported(Sysno::Exec)));
        assert_eq!(decode(32, [0; 3]), Ok(Syscall::Unsupported(Sysno::Mmap)));
        assert_eq!(decode(99, [0; 3]), Err(SyscallError::InvalidParam));
    }
}
