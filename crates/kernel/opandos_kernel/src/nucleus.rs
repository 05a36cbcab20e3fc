//! Nucleus state and one-shot bootstrap.

use core::time::Duration;

use log::info;

use opandos_kernel_params as param;
use opandos_machine::{
    Control, Machine, MemAddr, load_interval_timer, memlayout, ram_top, tod, write_pod,
};
use opandos_types::{PassUpVector, Status};

use crate::{
    asl::Asl,
    proc::{PcbPool, Pid, ProcQueue},
};

/// Bus address of the `index`-th nucleus device semaphore.
#[must_use]
pub fn device_sem_addr(index: usize) -> MemAddr {
    debug_assert!(index < param::DEV_SEM_COUNT);
    memlayout::DEVICE_SEM_BASE.word_add(index)
}

/// Whether a blocking key falls inside the device semaphore table.
///
/// Device semaphores signal I/O completion rather than count resources, so
/// several paths treat them differently from process-owned semaphores.
pub(crate) fn is_device_sem(addr: MemAddr) -> bool {
    (memlayout::DEVICE_SEM_BASE..=device_sem_addr(param::CLOCK_SEM)).contains(&addr)
}

pub(crate) fn read_sem(m: &impl Machine, addr: MemAddr) -> i32 {
    m.read_word(addr) as i32
}

pub(crate) fn write_sem(m: &mut impl Machine, addr: MemAddr, value: i32) {
    m.write_word(addr, value as u32);
}

/// Time until the next 100 ms grid point.
///
/// The interval timer is always loaded with this rather than a flat
/// period, so pseudo-clock ticks do not drift by the handling latency.
pub(crate) fn interval_to_next_tick(now: Duration) -> Duration {
    let period = param::PSECOND.as_micros() as u64;
    Duration::from_micros(period - now.as_micros() as u64 % period)
}

/// All nucleus state: the pools, the scheduling structures and the
/// counters the scheduler triages on.
///
/// There is exactly one of these per machine; the firmware hands it to
/// [`Nucleus::handle_trap`] on every exception.
pub struct Nucleus {
    pub(crate) pool: PcbPool,
    pub(crate) asl: Asl,
    pub(crate) ready_queue: ProcQueue,
    pub(crate) current: Option<Pid>,
    pub(crate) process_count: usize,
    pub(crate) soft_blocked_count: usize,
    /// Time of day at which the current process was last dispatched.
    pub(crate) start_tod: Duration,
}

impl Default for Nucleus {
    fn default() -> Self {
        Self::new()
    }
}

impl Nucleus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: PcbPool::new(),
            asl: Asl::new(),
            ready_queue: ProcQueue::new(),
            current: None,
            process_count: 0,
            soft_blocked_count: 0,
            start_tod: Duration::ZERO,
        }
    }

    /// One-shot initialization, run once by the firmware at power-on.
    ///
    /// Publishes the pass-up vector, zeroes the device semaphores, starts
    /// the pseudo-clock, fabricates the first process around `entry` and
    /// enters the scheduler.
    pub fn boot(&mut self, m: &mut impl Machine, entry: MemAddr) -> Control {
        let vector = PassUpVector {
            tlb_refill_handler: memlayout::TLB_REFILL_ENTRY.addr(),
            tlb_refill_stack_ptr: memlayout::KERNEL_STACK.addr(),
            exception_handler: memlayout::EXCEPTION_ENTRY.addr(),
            exception_stack_ptr: memlayout::KERNEL_STACK.addr(),
        };
        write_pod(m, memlayout::PASS_UP_VECTOR, &vector);

        for index in 0..param::DEV_SEM_COUNT {
            write_sem(m, device_sem_addr(index), 0);
        }

        load_interval_timer(m, interval_to_next_tick(tod(m)));

        let Some(pid) = self.pool.alloc() else {
            return Control::Panic("boot: pcb pool empty");
        };
        {
            let pcb = &mut self.pool[pid];
            pcb.state.set_sp(ram_top(m).addr());
            pcb.state.set_entry_point(entry.addr());
            // kernel mode, interrupts and the local timer live on load
            pcb.state.status =
                (Status::INT_ENABLE_PREVIOUS | Status::PLT_ENABLE | Status::INT_MASK_ALL).bits();
        }
        self.ready_queue.insert(&mut self.pool, pid);
        self.process_count += 1;
        info!("nucleus up; first process {pid} enters at {entry}");

        self.schedule(m)
    }

    /// Started-but-not-terminated processes.
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Processes blocked on a device semaphore or the pseudo-clock.
    #[must_use]
    pub fn soft_blocked_count(&self) -> usize {
        self.soft_blocked_count
    }

    /// The process occupying the current slot, if any.
    #[must_use]
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Processes sitting on the ready queue.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.ready_queue.len(&self.pool)
    }

    /// Unused PCB slots.
    #[must_use]
    pub fn free_pcbs(&self) -> usize {
        self.pool.free_count()
    }

    /// Unused semaphore descriptors.
    #[must_use]
    pub fn free_sem_descriptors(&self) -> usize {
        self.asl.free_count()
    }

    /// Accumulated processor time of a process.
    #[must_use]
    pub fn cpu_time(&self, pid: Pid) -> Duration {
        self.pool[pid].cpu_time
    }

    /// Earliest waiter blocked on the semaphore at `sem_addr`.
    #[must_use]
    pub fn blocked_head(&self, sem_addr: MemAddr) -> Option<Pid> {
        self.asl.head_blocked(&self.pool, sem_addr)
    }

    /// Cross-checks the counters against the data structures.
    ///
    /// Cheap enough for tests to call after every step; panics on the
    /// first inconsistency it finds.
    pub fn audit(&self) {
        assert_eq!(
            self.process_count,
            param::MAX_PROC - self.pool.free_count(),
            "process count disagrees with the pool"
        );

        let (blocked, on_device) = self.asl.audit(&self.pool, is_device_sem);
        assert_eq!(
            self.soft_blocked_count, on_device,
            "soft-block count disagrees with the waiter queues"
        );

        let ready = self.ready_queue.len(&self.pool);
        let current = usize::from(self.current.is_some());
        assert_eq!(
            self.process_count,
            ready + blocked + current,
            "a process is in no queue and not current"
        );

        if let Some(pid) = self.current {
            let pcb = &self.pool[pid];
            assert!(
                pcb.next.is_none() && pcb.prev.is_none() && pcb.sem_addr.is_none(),
                "the current process sits on a queue"
            );
        }
    }

    /// Charges the current process for the time since its dispatch and
    /// restarts its charging interval at `now`.
    pub(crate) fn charge_current(&mut self, m: &impl Machine) {
        let now = tod(m);
        self.charge_until(now);
    }

    /// Charges the current process up to a timestamp taken earlier.
    pub(crate) fn charge_until(&mut self, at: Duration) {
        if let Some(pid) = self.current {
            self.pool[pid].cpu_time += at.saturating_sub(self.start_tod);
            self.start_tod = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_sem_range_is_closed() {
        assert!(is_device_sem(device_sem_addr(0)));
        assert!(is_device_sem(device_sem_addr(param::CLOCK_SEM)));
        assert!(!is_device_sem(
            device_sem_addr(param::CLOCK_SEM).word_add(1)
        ));
        assert!(!is_device_sem(MemAddr::new(0x2000_3000)));
    }

    #[test]
    fn interval_stays_on_the_grid() {
        let period = param::PSECOND;
        assert_eq!(interval_to_next_tick(Duration::ZERO), period);
        assert_eq!(
            interval_to_next_tick(Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(interval_to_next_tick(period * 3), period);
    }
}
