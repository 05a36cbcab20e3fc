//! The round-robin scheduler.
//!
//! Every nucleus path that does not resume the trapped process ends here.
//! The scheduler either dispatches the head of the ready queue with a
//! fresh time slice, or, with nothing runnable, triages on the two
//! counters: no processes means an orderly halt, soft-blocked processes
//! mean an interrupt is still coming and the machine may idle, and
//! anything else is a deadlock.

use log::{debug, error, info};

use opandos_kernel_params as param;
use opandos_machine::{Control, Machine, load_local_timer, tod};
use opandos_types::Status;

use crate::{Nucleus, proc::Pid};

impl Nucleus {
    /// Dispatches the next ready process, or halts / idles / panics.
    pub(crate) fn schedule(&mut self, m: &mut impl Machine) -> Control {
        if let Some(pid) = self.ready_queue.remove_head(&mut self.pool) {
            load_local_timer(m, param::TIME_SLICE);
            debug!("dispatch {pid}");
            return self.switch_context(m, pid);
        }

        if self.process_count == 0 {
            info!("no processes remain; halting");
            return Control::Halt;
        }

        if self.soft_blocked_count > 0 {
            // Open the interrupt mask and park the local timer so the
            // wait ends on a device or pseudo-clock interrupt, never on a
            // stale slice expiry.
            m.set_status((Status::INT_ENABLE_CURRENT | Status::INT_MASK_ALL).bits());
            m.set_local_timer(u32::MAX);
            debug!(
                "idle: {} processes soft-blocked",
                self.soft_blocked_count
            );
            return Control::Wait;
        }

        error!(
            "deadlock: {} processes, none ready, none soft-blocked",
            self.process_count
        );
        Control::Panic("deadlock: live processes with no pending event")
    }

    /// Installs `pid` as the current process and emits the state load.
    ///
    /// Also restarts the CPU-time interval: everything the process is
    /// charged for is measured from this moment.
    pub(crate) fn switch_context(&mut self, m: &impl Machine, pid: Pid) -> Control {
        self.current = Some(pid);
        self.start_tod = tod(m);
        Control::LoadState(self.pool[pid].state)
    }

    /// Charges the current process and resumes it.
    pub(crate) fn resume_current(&mut self, m: &impl Machine) -> Control {
        self.charge_current(m);
        match self.current {
            Some(pid) => self.switch_context(m, pid),
            None => Control::Panic("resume with no current process"),
        }
    }
}
