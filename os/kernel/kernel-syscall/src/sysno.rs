use crate::SyscallError;

/// System call numbers.
///
/// Only the process, memory and process-management calls are served; the
/// file and mapping calls keep their numbers and answer
/// [`SyscallError::Unsupported`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum Sysno {
    Exit = 1,
    Fork = 2,
    Exec = 3,
    Wait = 4,
    GetPid = 5,
    GetPpid = 6,
    Kill = 7,
    Yield = 8,

    Open = 10,
    Close = 11,
    Read = 12,
    Write = 13,
    Seek = 14,
    Tell = 15,
    Create = 16,
    Delete = 17,
    Rename = 18,
    Mkdir = 19,
    Rmdir = 20,
    Chdir = 21,
    GetCwd = 22,
    ListDir = 23,

    Malloc = 30,
    Free = 31,
    Mmap = 32,
    Munmap = 33,

    Ps = 40,
    SetPriority = 41,
    GetInfo = 42,
}

impl Sysno {
    pub const ALL: [Self; 29] = [
        Self::Exit,
        Self::Fork,
        Self::Exec,
        Self::Wait,
        Self::GetPid,
        Self::GetPpid,
        Self::Kill,
        Self::Yield,
        Self::Open,
        Self::Close,
        Self::Read,
        Self::Write,
        Self::Seek,
        Self::Tell,
        Self::Create,
        Self::Delete,
        Self::Rename,
        Self::Mkdir,
        Self::Rmdir,
        Self::Chdir,
        Self::GetCwd,
        Self::ListDir,
        Self::Malloc,
        Self::Free,
        Self::Mmap,
        Self::Munmap,
        Self::Ps,
        Self::SetPriority,
        Self::GetInfo,
    ];

    #[must_use]
    pub const fn number(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Fork => "fork",
            Self::Exec => "exec",
            Self::Wait => "wait",
            Self::GetPid => "getpid",
            Self::GetPpid => "getppid",
            Self::Kill => "kill",
            Self::Yield => "yield",
            Self::Open => "open",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Tell => "tell",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Mkdir => "mkdir",
            Self::Rmdir => "rmdir",
            Self::Chdir => "chdir",
            Self::GetCwd => "getcwd",
            Self::ListDir => "listdir",
            Self::Malloc => "malloc",
            Self::Free => "free",
            Self::Mmap => "mmap",
            Self::Munmap => "munmap",
            Self::Ps => "ps",
            Self::SetPriority => "setpriority",
            Self::GetInfo => "getinfo",
        }
    }

    /// Whether the kernel core serves this call.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Exit
                | Self::Fork
                | Self::Wait
                | Self::GetPid
                | Self::GetPpid
                | Self::Kill
                | Self::Yield
                | Self::Malloc
                | Self::Free
                | Self::Ps
                | Self::SetPriority
                | Self::GetInfo
        )
    }
}

impl TryFrom<u32> for Sysno {
    type Error = SyscallError;

    /// Unknown numbers are an invalid parameter.
    fn try_from(number: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.number() == number)
            .ok_or(SyscallError::InvalidParam)
    }
}
