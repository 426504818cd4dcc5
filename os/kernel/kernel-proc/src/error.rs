use crate::Pid;

/// Failures of process-table and scheduler operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ProcessError {
    #[error("no process with PID {0}")]
    NotFound(Pid),
    #[error("not enough memory for the process")]
    NoMemory,
    #[error("process table is full")]
    QueueFull,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("the idle process cannot be terminated or blocked")]
    IdleProcess,
    #[error("process {0} is not in a state that allows this")]
    InvalidState(Pid),
    #[error("process {0} has not terminated yet")]
    StillRunning(Pid),
}
