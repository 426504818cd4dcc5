//! Intrusive doubly linked queues threaded through the PCB pool.
//!
//! A PCB is on at most one queue at a time; its [`Links`] record which one,
//! so removing from the wrong queue is a no-op instead of a corruption.

use crate::ProcessControlBlock;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueueKind {
    Ready,
    Blocked,
    Terminated,
}

impl QueueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Terminated => "terminated",
        }
    }
}

/// Queue membership stored inside each PCB.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Links {
    pub(crate) queue: Option<QueueKind>,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl Links {
    pub(crate) const UNLINKED: Self = Self {
        queue: None,
        prev: None,
        next: None,
    };
}

/// Head/tail of one queue. The nodes live in the slot array passed to each call.
#[derive(Debug)]
pub struct ProcessQueue {
    kind: QueueKind,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl ProcessQueue {
    pub(crate) const fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Append `slot` at the tail. The slot must not be on any queue.
    pub(crate) fn push_back(&mut self, slots: &mut [ProcessControlBlock], slot: usize) {
        debug_assert!(slots[slot].links.queue.is_none(), "slot already queued");

        slots[slot].links = Links {
            queue: Some(self.kind),
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => slots[tail].links.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    pub(crate) fn pop_front(&mut self, slots: &mut [ProcessControlBlock]) -> Option<usize> {
        let head = self.head?;
        self.unlink(slots, head);
        Some(head)
    }

    /// Unlink `slot` if it is on this queue. Returns whether it was.
    pub(crate) fn remove(&mut self, slots: &mut [ProcessControlBlock], slot: usize) -> bool {
        if slots[slot].links.queue != Some(self.kind) {
            return false;
        }
        self.unlink(slots, slot);
        true
    }

    fn unlink(&mut self, slots: &mut [ProcessControlBlock], slot: usize) {
        let Links { prev, next, .. } = slots[slot].links;
        match prev {
            Some(p) => slots[p].links.next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => slots[n].links.prev = prev,
            None => self.tail = prev,
        }
        slots[slot].links = Links::UNLINKED;
        self.len -= 1;
    }

    /// Slot indices from head to tail.
    pub(crate) fn iter<'a>(
        &self,
        slots: &'a [ProcessControlBlock],
    ) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let slot = cursor?;
            cursor = slots[slot].links.next;
            Some(slot)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> [ProcessControlBlock; 4] {
        [ProcessControlBlock::EMPTY; 4]
    }

    #[test]
    fn fifo_order() {
        let mut slots = pool();
        let mut q = ProcessQueue::new(QueueKind::Ready);
        q.push_back(&mut slots, 2);
        q.push_back(&mut slots, 0);
        q.push_back(&mut slots, 3);
        assert_eq!(q.iter(&slots).collect::<Vec<_>>(), [2, 0, 3]);
        assert_eq!(q.pop_front(&mut slots), Some(2));
        assert_eq!(q.pop_front(&mut slots), Some(0));
        assert_eq!(q.len(), 1);
        assert_eq!(slots[2].links, Links::UNLINKED);
    }

    #[test]
    fn remove_from_middle_and_ends() {
        let mut slots = pool();
        let mut q = ProcessQueue::new(QueueKind::Blocked);
        for slot in 0..4 {
            q.push_back(&mut slots, slot);
        }
        assert!(q.remove(&mut slots, 1));
        assert!(q.remove(&mut slots, 3));
        assert!(q.remove(&mut slots, 0));
        assert_eq!(q.iter(&slots).collect::<Vec<_>>(), [2]);
        assert_eq!(q.pop_front(&mut slots), Some(2));
        assert_eq!(q.len(), 0);
        assert_eq!(q.pop_front(&mut slots), None);
    }

    #[test]
    fn remove_ignores_other_queues() {
        let mut slots = pool();
        let mut ready = ProcessQueue::new(QueueKind::Ready);
        let mut blocked = ProcessQueue::new(QueueKind::Blocked);
        ready.push_back(&mut slots, 1);
        assert!(!blocked.remove(&mut slots, 1));
        assert_eq!(ready.len(), 1);
        assert_eq!(slots[1].links.queue, Some(QueueKind::Ready));
    }
}
