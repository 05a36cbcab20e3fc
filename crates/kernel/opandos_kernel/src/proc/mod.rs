//! The process control block pool and the process tree.
//!
//! All PCB storage lives in one statically sized arena owned by the pool;
//! every other structure refers to a PCB through its stable [`Pid`] handle.
//! Queue and tree membership are link fields on the PCB itself, so moving a
//! process between queues never moves or copies the record.

use core::fmt;
use core::ops::{Index, IndexMut};
use core::time::Duration;

use opandos_kernel_params as param;
use opandos_machine::MemAddr;
use opandos_types::ProcessorState;

mod queue;

pub use queue::ProcQueue;

/// Handle to a PCB slot in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(pub(crate) usize);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One process control block.
#[derive(Debug, Clone)]
pub struct Pcb {
    /// Queue links; also thread the free list while the slot is unused.
    pub(crate) next: Option<Pid>,
    pub(crate) prev: Option<Pid>,

    /// Tree links.
    pub(crate) parent: Option<Pid>,
    pub(crate) first_child: Option<Pid>,
    pub(crate) prev_sib: Option<Pid>,
    pub(crate) next_sib: Option<Pid>,

    /// Saved processor state; authoritative whenever the process is not
    /// actually executing.
    pub state: ProcessorState,

    /// Accumulated processor time.
    pub cpu_time: Duration,

    /// Semaphore this process is blocked on, if any.
    pub sem_addr: Option<MemAddr>,

    /// Support structure registered at creation; opaque to the nucleus.
    pub support: Option<MemAddr>,
}

impl Pcb {
    fn cleared() -> Self {
        Self {
            next: None,
            prev: None,
            parent: None,
            first_child: None,
            prev_sib: None,
            next_sib: None,
            state: ProcessorState::zeroed(),
            cpu_time: Duration::ZERO,
            sem_addr: None,
            support: None,
        }
    }

    /// Whether this process has at least one child.
    #[must_use]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// Statically sized pool of [`param::MAX_PROC`] PCBs.
pub struct PcbPool {
    table: [Pcb; param::MAX_PROC],
    free_head: Option<Pid>,
    free_count: usize,
}

impl Default for PcbPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Pid> for PcbPool {
    type Output = Pcb;

    fn index(&self, pid: Pid) -> &Pcb {
        &self.table[pid.0]
    }
}

impl IndexMut<Pid> for PcbPool {
    fn index_mut(&mut self, pid: Pid) -> &mut Pcb {
        &mut self.table[pid.0]
    }
}

impl PcbPool {
    /// Creates the pool with every slot on the free list.
    #[must_use]
    pub fn new() -> Self {
        let mut pool = Self {
            table: core::array::from_fn(|_| Pcb::cleared()),
            free_head: None,
            free_count: 0,
        };
        for slot in 0..param::MAX_PROC {
            pool.free(Pid(slot));
        }
        pool
    }

    /// Takes a PCB off the free list with every field cleared, or `None`
    /// if the pool is exhausted.
    pub fn alloc(&mut self) -> Option<Pid> {
        let pid = self.free_head?;
        self.free_head = self.table[pid.0].next;
        self.free_count -= 1;
        self.table[pid.0] = Pcb::cleared();
        Some(pid)
    }

    /// Returns a PCB to the free list.
    ///
    /// The caller must already have detached it from every queue and from
    /// the process tree.
    pub fn free(&mut self, pid: Pid) {
        let pcb = &mut self.table[pid.0];
        debug_assert!(pcb.prev.is_none() && pcb.parent.is_none() && pcb.sem_addr.is_none());
        pcb.next = self.free_head;
        pcb.prev = None;
        self.free_head = Some(pid);
        self.free_count += 1;
    }

    /// Unused slots remaining.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Makes `child` the newest child of `parent`.
    ///
    /// Siblings form a doubly-linked list headed at the parent's
    /// `first_child`; ordering among siblings is not part of the contract.
    pub fn insert_child(&mut self, parent: Pid, child: Pid) {
        let old_head = self.table[parent.0].first_child;
        let pcb = &mut self.table[child.0];
        pcb.parent = Some(parent);
        pcb.prev_sib = None;
        pcb.next_sib = old_head;
        if let Some(head) = old_head {
            self.table[head.0].prev_sib = Some(child);
        }
        self.table[parent.0].first_child = Some(child);
    }

    /// Detaches and returns one child of `parent`, or `None` if it has
    /// no children.
    pub fn remove_child(&mut self, parent: Pid) -> Option<Pid> {
        let child = self.table[parent.0].first_child?;
        self.out_child(child);
        Some(child)
    }

    /// Detaches `child` from its parent's child list, wherever it sits in
    /// the list. Returns `None` if `child` has no parent.
    pub fn out_child(&mut self, child: Pid) -> Option<Pid> {
        let parent = self.table[child.0].parent?;
        let (prev_sib, next_sib) = {
            let pcb = &self.table[child.0];
            (pcb.prev_sib, pcb.next_sib)
        };

        match prev_sib {
            Some(prev) => self.table[prev.0].next_sib = next_sib,
            None => self.table[parent.0].first_child = next_sib,
        }
        if let Some(next) = next_sib {
            self.table[next.0].prev_sib = prev_sib;
        }

        let pcb = &mut self.table[child.0];
        pcb.parent = None;
        pcb.prev_sib = None;
        pcb.next_sib = None;
        Some(child)
    }
}
