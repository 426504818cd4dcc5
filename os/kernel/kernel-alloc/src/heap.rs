//! First-fit block-list heap over a fixed virtual window.
//!
//! The window is tiled by blocks kept in address order. Each block accounts
//! for an in-band header of [`BLOCK_HEADER_SIZE`] bytes in front of its
//! payload, so the layout matches a classic `kmalloc` heap:
//!
//! ```text
//! window_start                                              window_end
//! ┌────────┬───────────────┬────────┬──────────┬────────┬──────────┐
//! │ header │ payload (A)   │ header │ free     │ header │ payload  │
//! └────────┴───────────────┴────────┴──────────┴────────┴──────────┘
//!          ^ start(A)               ^ start(B)          ^ start(C)
//! ```
//!
//! The block metadata itself lives in a fixed slot arena inside the
//! allocator (`prev`/`next` are slot indices), so the allocator never
//! dereferences heap memory and can be exercised on the host.

use kernel_memory_addresses::{VirtualAddress, align_up};

/// Bytes reserved in front of every block's payload.
pub const BLOCK_HEADER_SIZE: u32 = 16;

/// Alignment of payload sizes and addresses.
pub const HEAP_ALIGN: u32 = 4;

/// Default capacity of the block arena.
pub const DEFAULT_BLOCK_SLOTS: usize = 512;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum HeapError {
    #[error("zero-sized allocation")]
    ZeroSize,
    #[error("no free block for {0} bytes")]
    OutOfMemory(u32),
    #[error("{0} is not the start of a heap block")]
    InvalidAddress(VirtualAddress),
    #[error("block at {0} is not allocated")]
    NotAllocated(VirtualAddress),
    #[error("heap window of {0} bytes cannot hold a block")]
    WindowTooSmall(u32),
    #[error("block at {0} belongs to a process")]
    Reserved(VirtualAddress),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BlockTag {
    Free,
    /// Handed out by [`HeapAllocator::allocate`], returned by `free`.
    Allocated,
    /// Handed out by [`HeapAllocator::reserve`]; only `release` returns it.
    Reserved,
}

impl BlockTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Allocated => "ALLOCATED",
            Self::Reserved => "PROCESS",
        }
    }
}

/// A contiguous span of the heap window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeapBlock {
    /// First payload byte.
    pub start: VirtualAddress,
    /// Payload bytes, header excluded.
    pub size: u32,
    pub tag: BlockTag,
}

impl HeapBlock {
    /// Address of the block's header.
    #[must_use]
    pub const fn header(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u32() - BLOCK_HEADER_SIZE)
    }

    /// One past the last payload byte.
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u32() + self.size)
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.tag, BlockTag::Free)
    }
}

/// Counters; never reset.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct HeapStats {
    pub allocations: u64,
    pub frees: u64,
    pub failed_allocations: u64,
}

type SlotIndex = u16;

#[derive(Copy, Clone)]
struct Node {
    block: HeapBlock,
    prev: Option<SlotIndex>,
    next: Option<SlotIndex>,
}

#[derive(Copy, Clone)]
enum Slot {
    Vacant { next: Option<SlotIndex> },
    Occupied(Node),
}

/// The kernel heap: first-fit allocation, split on allocate, full
/// coalescing pass on free.
///
/// `N` bounds the number of blocks. When the arena is full an allocation
/// still succeeds but takes the whole free block instead of splitting it.
pub struct HeapAllocator<const N: usize = DEFAULT_BLOCK_SLOTS> {
    window_start: VirtualAddress,
    window_size: u32,
    slots: [Slot; N],
    head: Option<SlotIndex>,
    vacant: Option<SlotIndex>,
    stats: HeapStats,
}

impl<const N: usize> HeapAllocator<N> {
    const ARENA_FITS: () = assert!(N > 0 && N <= SlotIndex::MAX as usize);

    /// Manage `[start, start + size)` as one free block.
    ///
    /// `size` is rounded down to [`HEAP_ALIGN`].
    ///
    /// # Errors
    /// [`HeapError::WindowTooSmall`] if the window cannot hold a header
    /// plus one aligned payload unit.
    pub fn new(start: VirtualAddress, size: u32) -> Result<Self, HeapError> {
        let () = Self::ARENA_FITS;
        debug_assert_eq!(start.as_u32() % HEAP_ALIGN, 0, "unaligned heap window");

        let window_size = size & !(HEAP_ALIGN - 1);
        if window_size < BLOCK_HEADER_SIZE + HEAP_ALIGN {
            return Err(HeapError::WindowTooSmall(size));
        }

        let mut slots = [Slot::Vacant { next: None }; N];
        for (i, slot) in slots.iter_mut().enumerate().skip(1) {
            let next = (i + 1 < N).then(|| (i + 1) as SlotIndex);
            *slot = Slot::Vacant { next };
        }
        slots[0] = Slot::Occupied(Node {
            block: HeapBlock {
                start: start + BLOCK_HEADER_SIZE,
                size: window_size - BLOCK_HEADER_SIZE,
                tag: BlockTag::Free,
            },
            prev: None,
            next: None,
        });

        log::debug!("heap window {start} + {window_size:#x}");
        Ok(Self {
            window_start: start,
            window_size,
            slots,
            head: Some(0),
            vacant: (N > 1).then_some(1),
            stats: HeapStats::default(),
        })
    }

    #[inline]
    fn node(&self, i: SlotIndex) -> &Node {
        match &self.slots[i as usize] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("block list links a vacant slot"),
        }
    }

    #[inline]
    fn node_mut(&mut self, i: SlotIndex) -> &mut Node {
        match &mut self.slots[i as usize] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("block list links a vacant slot"),
        }
    }

    fn claim_slot(&mut self, node: Node) -> Option<SlotIndex> {
        let i = self.vacant?;
        let Slot::Vacant { next } = self.slots[i as usize] else {
            unreachable!("vacant list links an occupied slot");
        };
        self.vacant = next;
        self.slots[i as usize] = Slot::Occupied(node);
        Some(i)
    }

    fn release_slot(&mut self, i: SlotIndex) {
        self.slots[i as usize] = Slot::Vacant { next: self.vacant };
        self.vacant = Some(i);
    }

    /// Slot indices of all blocks in address order.
    fn indices(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        core::iter::successors(self.head, |&i| self.node(i).next)
    }

    fn find_block(&self, addr: VirtualAddress) -> Option<SlotIndex> {
        self.indices().find(|&i| self.node(i).block.start == addr)
    }

    /// Allocate `size` bytes, rounded up to [`HEAP_ALIGN`].
    ///
    /// # Errors
    /// - [`HeapError::ZeroSize`] for `size == 0`.
    /// - [`HeapError::OutOfMemory`] if no free block is large enough.
    pub fn allocate(&mut self, size: u32) -> Result<VirtualAddress, HeapError> {
        self.carve(size, BlockTag::Allocated)
    }

    /// Like [`allocate`](Self::allocate), but the block can only be given
    /// back through [`release`](Self::release). Process stacks and heap
    /// regions live in reserved blocks.
    ///
    /// # Errors
    /// As for [`allocate`](Self::allocate).
    pub fn reserve(&mut self, size: u32) -> Result<VirtualAddress, HeapError> {
        self.carve(size, BlockTag::Reserved)
    }

    fn carve(&mut self, size: u32, tag: BlockTag) -> Result<VirtualAddress, HeapError> {
        debug_assert!(!matches!(tag, BlockTag::Free));
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }
        let size = align_up(size, HEAP_ALIGN);

        let Some(i) = self.indices().find(|&i| {
            let b = &self.node(i).block;
            b.is_free() && b.size >= size
        }) else {
            self.stats.failed_allocations += 1;
            return Err(HeapError::OutOfMemory(size));
        };

        let node = *self.node(i);
        let remainder = node.block.size - size;
        if remainder > BLOCK_HEADER_SIZE {
            let tail = Node {
                block: HeapBlock {
                    start: node.block.start + size + BLOCK_HEADER_SIZE,
                    size: remainder - BLOCK_HEADER_SIZE,
                    tag: BlockTag::Free,
                },
                prev: Some(i),
                next: node.next,
            };
            if let Some(t) = self.claim_slot(tail) {
                if let Some(n) = node.next {
                    self.node_mut(n).prev = Some(t);
                }
                let head = self.node_mut(i);
                head.next = Some(t);
                head.block.size = size;
            }
        }

        let head = self.node_mut(i);
        head.block.tag = tag;
        let start = head.block.start;
        self.stats.allocations += 1;
        Ok(start)
    }

    /// Release the block whose payload starts at `addr`.
    ///
    /// Returns the payload size of the released block (before merging).
    ///
    /// # Errors
    /// - [`HeapError::InvalidAddress`] if no block starts at `addr`.
    /// - [`HeapError::NotAllocated`] if that block is already free.
    /// - [`HeapError::Reserved`] if the block came from [`reserve`](Self::reserve).
    pub fn free(&mut self, addr: VirtualAddress) -> Result<u32, HeapError> {
        self.give_back(addr, BlockTag::Allocated)
    }

    /// Release a block handed out by [`reserve`](Self::reserve).
    ///
    /// # Errors
    /// - [`HeapError::InvalidAddress`] if no reserved block starts at `addr`.
    /// - [`HeapError::NotAllocated`] if that block is already free.
    pub fn release(&mut self, addr: VirtualAddress) -> Result<u32, HeapError> {
        self.give_back(addr, BlockTag::Reserved)
    }

    fn give_back(&mut self, addr: VirtualAddress, expected: BlockTag) -> Result<u32, HeapError> {
        let i = self.find_block(addr).ok_or(HeapError::InvalidAddress(addr))?;
        let block = &mut self.node_mut(i).block;
        match (block.tag, expected) {
            (BlockTag::Free, _) => return Err(HeapError::NotAllocated(addr)),
            (BlockTag::Reserved, BlockTag::Allocated) => return Err(HeapError::Reserved(addr)),
            (BlockTag::Allocated, BlockTag::Reserved) => {
                return Err(HeapError::InvalidAddress(addr));
            }
            _ => {}
        }
        block.tag = BlockTag::Free;
        let size = block.size;

        self.coalesce();
        self.stats.frees += 1;
        Ok(size)
    }

    /// Merge every pair of adjacent free blocks.
    fn coalesce(&mut self) {
        let mut cursor = self.head;
        while let Some(i) = cursor {
            let node = *self.node(i);
            let Some(j) = node.next else { break };
            let next = *self.node(j);

            if node.block.is_free() && next.block.is_free() {
                let merged = self.node_mut(i);
                merged.block.size += BLOCK_HEADER_SIZE + next.block.size;
                merged.next = next.next;
                if let Some(k) = next.next {
                    self.node_mut(k).prev = Some(i);
                }
                self.release_slot(j);
            } else {
                cursor = Some(j);
            }
        }
    }

    /// The block whose payload starts at `addr`.
    #[must_use]
    pub fn block_at(&self, addr: VirtualAddress) -> Option<HeapBlock> {
        self.find_block(addr).map(|i| self.node(i).block)
    }

    /// All blocks in address order.
    pub fn blocks(&self) -> impl Iterator<Item = HeapBlock> + '_ {
        self.indices().map(|i| self.node(i).block)
    }

    /// Sum of free payload bytes.
    #[must_use]
    pub fn free_bytes(&self) -> u32 {
        self.blocks().filter(HeapBlock::is_free).map(|b| b.size).sum()
    }

    /// Sum of allocated payload bytes.
    #[must_use]
    pub fn used_bytes(&self) -> u32 {
        self.blocks().filter(|b| !b.is_free()).map(|b| b.size).sum()
    }

    #[must_use]
    pub fn largest_free_block(&self) -> u32 {
        self.blocks()
            .filter(HeapBlock::is_free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.indices().count()
    }

    /// Start and size of the managed window.
    #[must_use]
    pub const fn window(&self) -> (VirtualAddress, u32) {
        (self.window_start, self.window_size)
    }

    #[must_use]
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }
}
