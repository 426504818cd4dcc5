use crate::SyscallError;
use core::fmt;
use core::marker::PhantomData;

/// A caller-supplied address of a `T`, checked to be non-null.
pub struct UserPtr<T> {
    addr: u32,
    _marker: PhantomData<*mut T>,
}

impl<T> UserPtr<T> {
    /// # Errors
    /// [`SyscallError::InvalidParam`] for a null address.
    pub const fn new(addr: u32) -> Result<Self, SyscallError> {
        if addr == 0 {
            return Err(SyscallError::InvalidParam);
        }
        Ok(Self {
            addr,
            _marker: PhantomData,
        })
    }

    /// `None` for a null address, which callers use for "not interested".
    #[must_use]
    pub fn optional(addr: u32) -> Option<Self> {
        Self::new(addr).ok()
    }

    #[must_use]
    pub const fn addr(self) -> u32 {
        self.addr
    }

    /// The `index`-th element of an array starting here.
    ///
    /// # Errors
    /// [`SyscallError::InvalidParam`] if the address overflows.
    pub fn element(self, index: u32) -> Result<Self, SyscallError> {
        let stride = u32::try_from(size_of::<T>()).map_err(|_| SyscallError::InvalidParam)?;
        stride
            .checked_mul(index)
            .and_then(|offset| self.addr.checked_add(offset))
            .map_or(Err(SyscallError::InvalidParam), Self::new)
    }
}

impl<T> Clone for UserPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UserPtr<T> {}

impl<T> PartialEq for UserPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T> Eq for UserPtr<T> {}

impl<T> fmt::Debug for UserPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr({:#010x})", self.addr)
    }
}

/// Where system calls write their out-parameters.
pub trait UserMemory {
    /// Store `value` at `dst`.
    ///
    /// # Errors
    /// [`SyscallError::InvalidParam`] if `dst` is not writable.
    fn store<T: Copy>(&mut self, dst: UserPtr<T>, value: T) -> Result<(), SyscallError>;
}

/// Callers share the kernel's identity-mapped address space; out-parameters
/// are written in place.
pub struct DirectUserMemory {
    _private: (),
}

impl DirectUserMemory {
    /// # Safety
    /// Every address a caller passes must be mapped, writable and not alias
    /// kernel state.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl UserMemory for DirectUserMemory {
    fn store<T: Copy>(&mut self, dst: UserPtr<T>, value: T) -> Result<(), SyscallError> {
        let ptr = dst.addr() as usize as *mut T;
        // SAFETY: guaranteed by the contract of `DirectUserMemory::new`.
        unsafe { ptr.write_unaligned(value) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_rejected() {
        assert_eq!(UserPtr::<u32>::new(0), Err(SyscallError::InvalidParam));
        assert!(UserPtr::<u32>::optional(0).is_none());
        assert_eq!(UserPtr::<u32>::optional(0x1000).map(UserPtr::addr), Some(0x1000));
    }

    #[test]
    fn array_elements() {
        let base = UserPtr::<[u32; 4]>::new(0x1000).unwrap();
        assert_eq!(base.element(0).unwrap().addr(), 0x1000);
        assert_eq!(base.element(3).unwrap().addr(), 0x1030);

        let top = UserPtr::<u64>::new(u32::MAX - 4).unwrap();
        assert_eq!(top.element(1), Err(SyscallError::InvalidParam));
    }
}
