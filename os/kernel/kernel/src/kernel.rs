//! The kernel context: every core subsystem, owned in one place.
//!
//! Built once by [`Kernel::boot`] and passed by reference to the system call
//! dispatcher, the shell and the interrupt glue.

use crate::config::KernelConfig;
use crate::error::BootError;
use kernel_alloc::{
    BitmapFrameAlloc, FrameStats, HeapAllocator, HeapBlock, HeapError, HeapStats, Vmm, VmmError,
};
use kernel_info::memory::{FRAME_BITMAP_WORDS, PAGE_TABLE_POOL_BYTES};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame, VirtualAddress};
use kernel_proc::{
    ContextSwitch, Pid, Priority, ProcessError, ProcessTable, Scheduler, SchedulerStats,
};
use kernel_vmem::{AddressSpace, MappedTable, PageEntryBits, PagingControl, PhysMapper};

/// Snapshot for the `memory` command.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryReport {
    pub total_frames: u32,
    pub free_frames: u32,
    pub frame_stats: FrameStats,
    pub heap_start: VirtualAddress,
    pub heap_size: u32,
    pub heap_used: u32,
    pub heap_free: u32,
    pub heap_largest_free: u32,
    pub heap_blocks: usize,
    pub heap_stats: HeapStats,
    pub page_tables: usize,
    pub paging_enabled: bool,
}

impl MemoryReport {
    #[must_use]
    pub const fn used_frames(&self) -> u32 {
        self.total_frames - self.free_frames
    }
}

pub struct Kernel<M: PhysMapper, C: ContextSwitch> {
    config: KernelConfig,
    mapper: M,
    frames: BitmapFrameAlloc,
    page_directory: PhysicalFrame,
    paging_enabled: bool,
    heap: HeapAllocator,
    scheduler: Scheduler<C>,
}

impl<M: PhysMapper, C: ContextSwitch> Kernel<M, C> {
    /// Bring the core up: frame bitmap, page tables, heap, process table
    /// with the idle process, scheduler. Paging stays off; see
    /// [`enable_paging`](Self::enable_paging).
    ///
    /// # Errors
    /// - [`BootError::Paging`] if the page tables do not fit in free frames.
    /// - [`BootError::Heap`] if the heap window is unusable.
    pub fn boot(config: KernelConfig, mapper: M, switch: C) -> Result<Self, BootError> {
        let mut frames = BitmapFrameAlloc::new();
        let reserved = frames.reserve_range(PhysicalAddress::zero(), config.reserved_memory);
        log::info!(
            "Frame allocator: {reserved} frames reserved below {}, {} free",
            config.reserved_memory,
            frames.free_frames()
        );

        let page_directory = {
            let mut vmm = Vmm::new(&mapper, &mut frames)?;
            vmm.build_kernel_mappings()?;
            vmm.root()
        };
        log::info!("Page directory at {}", page_directory.base());

        let heap = HeapAllocator::new(config.heap_start, config.heap_size)?;
        log::info!(
            "Kernel heap: {} bytes at {}",
            config.heap_size,
            config.heap_start
        );

        let table = ProcessTable::new(config.table_config());
        let scheduler = Scheduler::new(table, switch, config.preemption);
        log::info!("Process manager ready, idle process is PID 0");

        Ok(Self {
            config,
            mapper,
            frames,
            page_directory,
            paging_enabled: false,
            heap,
            scheduler,
        })
    }

    fn vmm(&mut self) -> Vmm<'_, M, BitmapFrameAlloc> {
        Vmm::from_root(&self.mapper, &mut self.frames, self.page_directory)
    }

    fn address_space(&self) -> AddressSpace<'_, M> {
        AddressSpace::from_root(&self.mapper, self.page_directory)
    }

    /// Identity map the page-table pool, load the directory and enable
    /// paging.
    ///
    /// # Errors
    /// [`BootError::Paging`] if mapping the pool runs out of frames; paging
    /// is left off in that case.
    ///
    /// # Safety
    /// Everything the kernel touches afterwards (code, stacks, heap, page
    /// tables through the mapper) must be covered by the boot mappings.
    pub unsafe fn enable_paging<P: PagingControl>(&mut self, paging: &mut P) -> Result<(), BootError> {
        let base = self.config.reserved_memory.as_u32();
        let mut vmm = self.vmm();
        for offset in (0..PAGE_TABLE_POOL_BYTES).step_by(PAGE_SIZE as usize) {
            vmm.map(
                VirtualAddress::new(base + offset),
                PhysicalAddress::new(base + offset),
                PageEntryBits::new_kernel_rw(),
            )?;
        }
        // SAFETY: forwarded to the caller.
        unsafe { vmm.activate(paging) };
        self.paging_enabled = true;
        log::info!("Paging enabled");
        Ok(())
    }

    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[must_use]
    pub const fn frames(&self) -> &BitmapFrameAlloc {
        &self.frames
    }

    #[must_use]
    pub const fn heap(&self) -> &HeapAllocator {
        &self.heap
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    pub const fn scheduler_mut(&mut self) -> &mut Scheduler<C> {
        &mut self.scheduler
    }

    #[must_use]
    pub const fn page_directory(&self) -> PhysicalFrame {
        self.page_directory
    }

    #[must_use]
    pub const fn paging_enabled(&self) -> bool {
        self.paging_enabled
    }

    /// Map one page.
    ///
    /// # Errors
    /// See [`Vmm::map`].
    pub fn map(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
    ) -> Result<(), VmmError> {
        self.vmm().map(va, pa, flags)
    }

    /// # Errors
    /// See [`Vmm::unmap`].
    pub fn unmap(&mut self, va: VirtualAddress) -> Result<(), VmmError> {
        self.vmm().unmap(va)
    }

    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.address_space().query(va)
    }

    pub fn page_tables(&self) -> impl Iterator<Item = MappedTable> + '_ {
        self.address_space().tables()
    }

    /// # Errors
    /// See [`HeapAllocator::allocate`].
    pub fn kmalloc(&mut self, size: u32) -> Result<VirtualAddress, HeapError> {
        self.heap.allocate(size)
    }

    /// Process stacks and heap regions are refused; they go back to the
    /// heap when their process terminates.
    ///
    /// # Errors
    /// See [`HeapAllocator::free`].
    pub fn kfree(&mut self, addr: VirtualAddress) -> Result<u32, HeapError> {
        self.heap.free(addr)
    }

    pub fn heap_blocks(&self) -> impl Iterator<Item = HeapBlock> + '_ {
        self.heap.blocks()
    }

    #[must_use]
    pub fn current(&self) -> Pid {
        self.scheduler.current()
    }

    /// Create a process whose stack, and heap region if
    /// [`KernelConfig::process_heap_size`] asks for one, come from the kernel
    /// heap.
    ///
    /// # Errors
    /// See [`Scheduler::create`]. [`ProcessError::NoMemory`] also if the heap
    /// region cannot be allocated; the half-built process is discarded.
    pub fn spawn(&mut self, name: &str, entry: u32, priority: Priority) -> Result<Pid, ProcessError> {
        let pid = self.scheduler.create(&mut self.heap, name, entry, priority)?;
        let size = self.config.process_heap_size;
        if size > 0
            && let Err(e) = self.allocate_process_heap(pid, size)
        {
            self.scheduler.terminate(&mut self.heap, pid)?;
            self.scheduler.wait(pid)?;
            return Err(e);
        }
        Ok(pid)
    }

    /// # Errors
    /// See [`Scheduler::terminate`].
    pub fn kill(&mut self, pid: Pid) -> Result<(), ProcessError> {
        self.scheduler.terminate(&mut self.heap, pid)
    }

    /// # Errors
    /// See [`Scheduler::exit`].
    pub fn exit(&mut self, code: i32) -> Result<Pid, ProcessError> {
        self.scheduler.exit(&mut self.heap, code)
    }

    /// Give a live process a heap region. It is released when the process
    /// terminates.
    ///
    /// # Errors
    /// See [`Scheduler::allocate_heap`].
    pub fn allocate_process_heap(&mut self, pid: Pid, size: u32) -> Result<VirtualAddress, ProcessError> {
        self.scheduler
            .allocate_heap(&mut self.heap, pid, size)
            .map(|region| region.base)
    }

    /// Account a timer interrupt. Returns whether the running process changed.
    pub fn timer_interrupt(&mut self) -> bool {
        self.scheduler.timer_interrupt()
    }

    #[must_use]
    pub const fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    #[must_use]
    pub fn memory_report(&self) -> MemoryReport {
        let (heap_start, heap_size) = self.heap.window();
        MemoryReport {
            total_frames: BitmapFrameAlloc::<FRAME_BITMAP_WORDS>::FRAMES,
            free_frames: self.frames.free_frames(),
            frame_stats: self.frames.stats(),
            heap_start,
            heap_size,
            heap_used: self.heap.used_bytes(),
            heap_free: self.heap.free_bytes(),
            heap_largest_free: self.heap.largest_free_block(),
            heap_blocks: self.heap.block_count(),
            heap_stats: self.heap.stats(),
            page_tables: self.address_space().table_count(),
            paging_enabled: self.paging_enabled,
        }
    }
}
