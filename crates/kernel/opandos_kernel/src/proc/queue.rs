//! Circular doubly-linked process queues.
//!
//! A queue owns nothing but a tail handle; the links live on the PCBs in
//! the pool, so the same code serves the ready queue and every semaphore
//! waiter queue. The tail's `next` is the head, which makes both ends
//! reachable in O(1).

use super::{PcbPool, Pid};

/// FIFO queue of processes, identified by its tail.
#[derive(Debug, Default)]
pub struct ProcQueue {
    tail: Option<Pid>,
}

impl ProcQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self { tail: None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    /// The process at the head, without removing it.
    #[must_use]
    pub fn head(&self, pool: &PcbPool) -> Option<Pid> {
        self.tail.map(|tail| pool[tail].next.unwrap())
    }

    /// Appends `pid` at the tail.
    pub fn insert(&mut self, pool: &mut PcbPool, pid: Pid) {
        match self.tail {
            None => {
                pool[pid].next = Some(pid);
                pool[pid].prev = Some(pid);
            }
            Some(tail) => {
                let head = pool[tail].next.unwrap();
                pool[tail].next = Some(pid);
                pool[pid].prev = Some(tail);
                pool[pid].next = Some(head);
                pool[head].prev = Some(pid);
            }
        }
        self.tail = Some(pid);
    }

    /// Removes and returns the head.
    pub fn remove_head(&mut self, pool: &mut PcbPool) -> Option<Pid> {
        let tail = self.tail?;
        let head = pool[tail].next.unwrap();
        if head == tail {
            self.tail = None;
        } else {
            let new_head = pool[head].next.unwrap();
            pool[tail].next = Some(new_head);
            pool[new_head].prev = Some(tail);
        }
        pool[head].next = None;
        pool[head].prev = None;
        Some(head)
    }

    /// Removes `pid` from wherever it sits in this queue.
    ///
    /// Returns `None` if `pid` is not on the queue; the links are left
    /// untouched in that case.
    pub fn remove(&mut self, pool: &mut PcbPool, pid: Pid) -> Option<Pid> {
        let tail = self.tail?;
        let head = pool[tail].next.unwrap();

        let mut current = head;
        loop {
            if current == pid {
                break;
            }
            current = pool[current].next.unwrap();
            if current == head {
                return None;
            }
        }

        let next = pool[pid].next.unwrap();
        if next == pid {
            self.tail = None;
        } else {
            let prev = pool[pid].prev.unwrap();
            pool[prev].next = Some(next);
            pool[next].prev = Some(prev);
            if self.tail == Some(pid) {
                self.tail = Some(prev);
            }
        }
        pool[pid].next = None;
        pool[pid].prev = None;
        Some(pid)
    }

    /// Visits every queued process in FIFO order.
    pub(crate) fn for_each(&self, pool: &PcbPool, mut f: impl FnMut(Pid)) {
        let Some(tail) = self.tail else {
            return;
        };
        let head = pool[tail].next.unwrap();
        let mut current = head;
        loop {
            f(current);
            if current == tail {
                break;
            }
            current = pool[current].next.unwrap();
        }
    }

    /// Number of queued processes; O(n), diagnostic use.
    #[must_use]
    pub fn len(&self, pool: &PcbPool) -> usize {
        let Some(tail) = self.tail else {
            return 0;
        };
        let head = pool[tail].next.unwrap();
        let mut count = 1;
        let mut current = head;
        while current != tail {
            current = pool[current].next.unwrap();
            count += 1;
        }
        count
    }
}
