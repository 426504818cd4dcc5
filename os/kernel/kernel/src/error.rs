use kernel_alloc::{HeapError, VmmError};

/// Why the kernel could not come up.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error("building page tables failed: {0}")]
    Paging(#[from] VmmError),
    #[error("kernel heap setup failed: {0}")]
    Heap(#[from] HeapError),
    #[error("the kernel is already running")]
    AlreadyBooted,
}
