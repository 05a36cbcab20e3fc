//! The active semaphore list.
//!
//! A semaphore is nothing but a signed word somewhere in memory; the
//! nucleus only learns about one when a process blocks on it. Each
//! blocked-on semaphore gets a descriptor holding the FIFO of its waiters,
//! and the descriptors form a list sorted by semaphore address so lookup
//! and insertion share one walk.
//!
//! Two permanently allocated sentinels bound the list: a head keyed below
//! every real address and a tail keyed above every real address. The walk
//! can therefore never fall off either end, and insertion always has a
//! predecessor.

use opandos_kernel_params as param;
use opandos_machine::MemAddr;

use crate::{
    error::KernelError,
    proc::{PcbPool, Pid, ProcQueue},
};

/// Descriptor slot handle, private to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SemdId(usize);

/// One semaphore descriptor.
#[derive(Debug, Default)]
struct Semd {
    next: Option<SemdId>,
    key: MemAddr,
    waiters: ProcQueue,
}

/// Sorted list of descriptors for every semaphore with at least one
/// waiter, backed by a statically sized table.
pub struct Asl {
    table: [Semd; param::MAX_SEMD],
    free_head: Option<SemdId>,
    free_count: usize,
    head: SemdId,
}

impl Default for Asl {
    fn default() -> Self {
        Self::new()
    }
}

impl Asl {
    /// Builds the list: sentinels linked head-to-tail, every other
    /// descriptor on the free list.
    #[must_use]
    pub fn new() -> Self {
        let mut asl = Self {
            table: core::array::from_fn(|_| Semd::default()),
            free_head: None,
            free_count: 0,
            head: SemdId(0),
        };
        for slot in 2..param::MAX_SEMD {
            asl.free_descriptor(SemdId(slot));
        }

        let head = SemdId(0);
        let tail = SemdId(1);
        asl.table[head.0].key = MemAddr::NULL;
        asl.table[head.0].next = Some(tail);
        asl.table[tail.0].key = MemAddr::new(u32::MAX);
        asl.table[tail.0].next = None;
        asl.head = head;
        asl
    }

    fn free_descriptor(&mut self, id: SemdId) {
        self.table[id.0].next = self.free_head;
        self.free_head = Some(id);
        self.free_count += 1;
    }

    fn alloc_descriptor(&mut self) -> Option<SemdId> {
        let id = self.free_head?;
        self.free_head = self.table[id.0].next;
        self.free_count -= 1;
        self.table[id.0].next = None;
        Some(id)
    }

    /// Walks from the head sentinel and returns the first descriptor whose
    /// key is not below `key`, along with its predecessor. The tail
    /// sentinel guarantees such a descriptor exists.
    fn search(&self, key: MemAddr) -> (SemdId, SemdId) {
        let mut prev = self.head;
        let mut current = self.table[prev.0].next.unwrap();
        while self.table[current.0].key < key {
            prev = current;
            current = self.table[current.0].next.unwrap();
        }
        (prev, current)
    }

    /// Blocks `pid` on the semaphore at `sem_addr`, appending it to the
    /// waiter FIFO and creating the descriptor if this is the first
    /// waiter.
    ///
    /// Fails only when a descriptor is needed and the table is exhausted.
    pub fn insert_blocked(
        &mut self,
        pool: &mut PcbPool,
        sem_addr: MemAddr,
        pid: Pid,
    ) -> Result<(), KernelError> {
        let (prev, found) = self.search(sem_addr);
        let descriptor = if self.table[found.0].key == sem_addr {
            found
        } else {
            let new = self
                .alloc_descriptor()
                .ok_or(KernelError::OutOfSemDescriptors)?;
            self.table[new.0].key = sem_addr;
            self.table[new.0].waiters = ProcQueue::new();
            self.table[new.0].next = Some(found);
            self.table[prev.0].next = Some(new);
            new
        };

        pool[pid].sem_addr = Some(sem_addr);
        self.table[descriptor.0].waiters.insert(pool, pid);
        Ok(())
    }

    /// Releases the earliest waiter of the semaphore at `sem_addr`.
    ///
    /// Returns `None` if no process is blocked there. An emptied
    /// descriptor goes straight back to the free list.
    pub fn remove_blocked(&mut self, pool: &mut PcbPool, sem_addr: MemAddr) -> Option<Pid> {
        let (prev, found) = self.search(sem_addr);
        if self.table[found.0].key != sem_addr {
            return None;
        }

        let pid = self.table[found.0].waiters.remove_head(pool)?;
        pool[pid].sem_addr = None;
        self.release_if_empty(prev, found);
        Some(pid)
    }

    /// Pulls `pid` out of the waiter queue it is blocked on, wherever it
    /// sits in the FIFO. Used by termination.
    pub fn out_blocked(&mut self, pool: &mut PcbPool, pid: Pid) -> Result<Pid, KernelError> {
        let sem_addr = pool[pid].sem_addr.ok_or(KernelError::NotBlocked(pid))?;
        let (prev, found) = self.search(sem_addr);
        if self.table[found.0].key != sem_addr {
            return Err(KernelError::NotBlocked(pid));
        }

        self.table[found.0]
            .waiters
            .remove(pool, pid)
            .ok_or(KernelError::NotBlocked(pid))?;
        pool[pid].sem_addr = None;
        self.release_if_empty(prev, found);
        Ok(pid)
    }

    /// The earliest waiter of the semaphore at `sem_addr`, if any.
    #[must_use]
    pub fn head_blocked(&self, pool: &PcbPool, sem_addr: MemAddr) -> Option<Pid> {
        let (_, found) = self.search(sem_addr);
        if self.table[found.0].key != sem_addr {
            return None;
        }
        self.table[found.0].waiters.head(pool)
    }

    /// Unused descriptors remaining.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    fn release_if_empty(&mut self, prev: SemdId, descriptor: SemdId) {
        if self.table[descriptor.0].waiters.is_empty() {
            self.table[prev.0].next = self.table[descriptor.0].next;
            self.free_descriptor(descriptor);
        }
    }

    /// Walks the whole list checking its structure: keys strictly
    /// ascending, no empty descriptor between the sentinels, and every
    /// waiter's blocking key pointing back at its descriptor.
    ///
    /// Returns the waiter count and how many of them `is_device` accepts.
    pub(crate) fn audit(
        &self,
        pool: &PcbPool,
        is_device: impl Fn(MemAddr) -> bool,
    ) -> (usize, usize) {
        let mut total = 0;
        let mut on_device = 0;

        let mut prev_key = self.table[self.head.0].key;
        let mut current = self.table[self.head.0].next;
        while let Some(id) = current {
            let descriptor = &self.table[id.0];
            assert!(prev_key < descriptor.key, "semaphore list out of order");

            if descriptor.next.is_some() {
                // a real descriptor, not the tail sentinel
                assert!(!descriptor.waiters.is_empty(), "empty descriptor kept");
                descriptor.waiters.for_each(pool, |pid| {
                    assert_eq!(pool[pid].sem_addr, Some(descriptor.key));
                    total += 1;
                    if is_device(descriptor.key) {
                        on_device += 1;
                    }
                });
            }

            prev_key = descriptor.key;
            current = descriptor.next;
        }
        (total, on_device)
    }
}
