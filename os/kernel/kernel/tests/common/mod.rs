//! Host stand-ins shared by the integration tests.

#![allow(dead_code)]

use kernel::{FrameMemory, Kernel, KernelConfig};
use kernel_info::memory::RESERVED_LOW_MEMORY;
use kernel_memory_addresses::PhysicalAddress;
use kernel_proc::ContextSwitch;
use kernel_syscall::{SyscallError, UserMemory, UserPtr};
use kernel_vmem::testing::FramePool;
use std::collections::BTreeMap;

/// Enough frames for the directory, the low table and the pool table.
pub const POOL_FRAMES: usize = 8;

pub fn pool() -> FramePool {
    FramePool::new(PhysicalAddress::new(RESERVED_LOW_MEMORY), POOL_FRAMES)
}

pub fn boot<C: ContextSwitch>(config: KernelConfig, switch: C) -> Kernel<FramePool, C> {
    Kernel::boot(config, pool(), switch).expect("boot")
}

/// A window of caller memory at `base`.
pub struct UserBuf {
    base: u32,
    bytes: Vec<u8>,
}

impl UserBuf {
    pub fn new(base: u32, len: usize) -> Self {
        Self {
            base,
            bytes: vec![0; len],
        }
    }

    pub fn addr(&self, offset: u32) -> u32 {
        self.base + offset
    }

    fn offset<T>(&self, addr: u32) -> Option<usize> {
        let off = usize::try_from(addr.checked_sub(self.base)?).ok()?;
        (off + size_of::<T>() <= self.bytes.len()).then_some(off)
    }

    pub fn load<T: Copy>(&self, addr: u32) -> T {
        let off = self.offset::<T>(addr).expect("load outside the buffer");
        // SAFETY: in bounds; every load in the tests reads what a store wrote.
        unsafe { self.bytes.as_ptr().add(off).cast::<T>().read_unaligned() }
    }
}

impl UserMemory for UserBuf {
    fn store<T: Copy>(&mut self, dst: UserPtr<T>, value: T) -> Result<(), SyscallError> {
        let off = self
            .offset::<T>(dst.addr())
            .ok_or(SyscallError::InvalidParam)?;
        // SAFETY: in bounds; a plain byte copy of a `Copy` value.
        unsafe {
            std::ptr::copy_nonoverlapping(
                (&raw const value).cast::<u8>(),
                self.bytes.as_mut_ptr().add(off),
                size_of::<T>(),
            );
        }
        Ok(())
    }
}

/// Sparse word memory for trap frames and exit frames.
#[derive(Default)]
pub struct WordMemory(pub BTreeMap<u32, u32>);

impl WordMemory {
    pub fn word(&self, addr: u32) -> u32 {
        self.0.get(&addr).copied().unwrap_or(0)
    }
}

impl FrameMemory for WordMemory {
    fn read_words(&self, addr: u32, out: &mut [u32]) {
        for (i, w) in (0u32..).zip(out.iter_mut()) {
            *w = self.word(addr + 4 * i);
        }
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) {
        for (i, w) in (0u32..).zip(words) {
            self.0.insert(addr + 4 * i, *w);
        }
    }
}
