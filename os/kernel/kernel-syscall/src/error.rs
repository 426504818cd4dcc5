use kernel_alloc::HeapError;
use kernel_proc::ProcessError;

/// Error half of a system call result. Every variant has a fixed negative
/// code; `0` and positive values are never errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SyscallError {
    #[error("operation failed")]
    Failed,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("out of memory")]
    NoMemory,
    #[error("process table full")]
    QueueFull,
    #[error("not supported")]
    Unsupported,
}

impl SyscallError {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Failed => -1,
            Self::InvalidParam => -2,
            Self::NotFound => -3,
            Self::AccessDenied => -4,
            Self::NoMemory => -5,
            Self::QueueFull => -6,
            Self::Unsupported => -7,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Failed,
            -2 => Self::InvalidParam,
            -3 => Self::NotFound,
            -4 => Self::AccessDenied,
            -5 => Self::NoMemory,
            -6 => Self::QueueFull,
            -7 => Self::Unsupported,
            _ => return None,
        })
    }
}

impl From<ProcessError> for SyscallError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound(_) => Self::NotFound,
            ProcessError::NoMemory => Self::NoMemory,
            ProcessError::QueueFull => Self::QueueFull,
            ProcessError::InvalidParam => Self::InvalidParam,
            ProcessError::IdleProcess => Self::AccessDenied,
            ProcessError::InvalidState(_) | ProcessError::StillRunning(_) => Self::Failed,
        }
    }
}

impl From<HeapError> for SyscallError {
    fn from(e: HeapError) -> Self {
        match e {
            HeapError::OutOfMemory(_) | HeapError::WindowTooSmall(_) => Self::NoMemory,
            HeapError::Reserved(_) => Self::AccessDenied,
            HeapError::ZeroSize | HeapError::InvalidAddress(_) | HeapError::NotAllocated(_) => {
                Self::InvalidParam
            }
        }
    }
}
