//! Device and timer interrupt handling.
//!
//! Priority is fixed: the local timer first, then the pseudo-clock, then
//! device lines 3..=7 in ascending order with the lowest-numbered pending
//! device first. Exactly one pending source is serviced per trap; the
//! hardware re-raises anything still outstanding.
//!
//! The TOD and the local-timer remainder are snapshotted before anything
//! else: the first feeds CPU-time accounting, and the second is restored
//! whenever the interrupted process resumes, so an interrupt never grants
//! a fresh slice.

use core::time::Duration;

use log::{debug, trace};

use opandos_kernel_params as param;
use opandos_machine::{
    Control, DeviceRegister, Machine, ack_device, device_status, load_interval_timer,
    load_local_timer, pending_device_bitmap, tod,
};
use opandos_types::ProcessorState;

use crate::{
    Nucleus,
    nucleus::{device_sem_addr, interval_to_next_tick, read_sem, write_sem},
};

impl Nucleus {
    /// Entry for cause code 0.
    pub(crate) fn handle_interrupt(
        &mut self,
        m: &mut impl Machine,
        saved: ProcessorState,
    ) -> Control {
        let interrupt_tod = tod(m);
        let slice_left = m.local_timer();

        if saved.interrupt_pending(param::PLT_LINE) {
            return self.handle_slice_expiry(m, saved, interrupt_tod);
        }

        if saved.interrupt_pending(param::INTERVAL_LINE) {
            self.handle_pseudo_clock_tick(m);
            return self.resume_interrupted(m, saved, interrupt_tod, slice_left);
        }

        for line in param::BASE_DEV_LINE..=param::TERMINAL_LINE {
            if saved.interrupt_pending(line) {
                self.handle_device_interrupt(m, line);
                return self.resume_interrupted(m, saved, interrupt_tod, slice_left);
            }
        }

        Control::Panic("interrupt with no pending line")
    }

    /// Local timer: the running process has used up its slice.
    fn handle_slice_expiry(
        &mut self,
        m: &mut impl Machine,
        saved: ProcessorState,
        interrupt_tod: Duration,
    ) -> Control {
        let Some(pid) = self.current else {
            return Control::Panic("local timer fired with no current process");
        };

        // acknowledged by rearming
        load_local_timer(m, param::TIME_SLICE);

        self.pool[pid].state = saved;
        self.charge_until(interrupt_tod);
        self.current = None;

        trace!("slice expired for {pid}");
        self.ready_queue.insert(&mut self.pool, pid);
        self.schedule(m)
    }

    /// Interval timer: release every pseudo-clock waiter.
    fn handle_pseudo_clock_tick(&mut self, m: &mut impl Machine) {
        load_interval_timer(m, interval_to_next_tick(tod(m)));

        let clock = device_sem_addr(param::CLOCK_SEM);
        let mut released = 0;
        while let Some(pid) = self.asl.remove_blocked(&mut self.pool, clock) {
            self.ready_queue.insert(&mut self.pool, pid);
            self.soft_blocked_count -= 1;
            released += 1;
        }
        // every waiter drove the value one below zero; all are gone now
        write_sem(m, clock, 0);
        trace!("pseudo-clock tick released {released} waiters");
    }

    /// One device line: find the highest-priority pending device, collect
    /// its status, acknowledge, and V its semaphore.
    fn handle_device_interrupt(&mut self, m: &mut impl Machine, line: usize) {
        let bitmap = pending_device_bitmap(m, line);
        let Some(device) = (0..param::DEV_PER_LINE).find(|&d| bitmap & (1 << d) != 0) else {
            debug!("line {line} raised with empty device bitmap");
            return;
        };

        // A terminal is two sub-devices behind one register block; a
        // completed transmission outranks a pending reception.
        let transmit = line == param::TERMINAL_LINE
            && (device_status(m, line, device, true) & DeviceRegister::TERM_STATUS_MASK)
                == DeviceRegister::STATUS_CHAR_DONE;

        let status = device_status(m, line, device, transmit);
        ack_device(m, line, device, transmit);

        let mut index = (line - param::BASE_DEV_LINE) * param::DEV_PER_LINE + device;
        if transmit {
            index += param::DEV_PER_LINE;
        }
        let sem = device_sem_addr(index);

        let value = read_sem(m, sem) + 1;
        write_sem(m, sem, value);
        if value <= 0 {
            if let Some(pid) = self.asl.remove_blocked(&mut self.pool, sem) {
                self.pool[pid].state.set_v0(status);
                self.ready_queue.insert(&mut self.pool, pid);
                self.soft_blocked_count -= 1;
                trace!("line {line} device {device} released {pid} with status {status:#x}");
            }
        }
    }

    /// Returns to the interrupted process with its slice remainder, or to
    /// the scheduler if the interrupt arrived during an idle wait.
    fn resume_interrupted(
        &mut self,
        m: &mut impl Machine,
        saved: ProcessorState,
        interrupt_tod: Duration,
        slice_left: u32,
    ) -> Control {
        match self.current {
            Some(pid) => {
                self.pool[pid].state = saved;
                self.charge_until(interrupt_tod);
                m.set_local_timer(slice_left);
                self.switch_context(m, pid)
            }
            None => self.schedule(m),
        }
    }
}
