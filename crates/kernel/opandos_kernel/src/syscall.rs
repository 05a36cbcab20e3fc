//! The eight nucleus services.
//!
//! The trapped process leaves the service number in `a0` and arguments in
//! `a1..a3`; results come back in `v0`. Every service either resumes the
//! caller with its CPU time charged, blocks it and schedules, or (for
//! termination) tears the caller down and schedules.

use log::{debug, trace};

use opandos_kernel_params as param;
use opandos_machine::{Control, Machine, MemAddr, read_pod};
use opandos_types::{ExceptionCode, PassUpIndex, ProcessorState, SyscallCode, WORD_LEN};

use crate::{
    Nucleus,
    error::KernelError,
    nucleus::{device_sem_addr, is_device_sem, read_sem, write_sem},
    proc::Pid,
};

/// Success / failure values returned in `v0`.
const SYS_OK: u32 = 0;
const SYS_ERR: u32 = -1i32 as u32;

/// Device semaphore slot for a SYS5 request.
///
/// Terminals get two slots: a receiver at the base index and a
/// transmitter [`param::DEV_PER_LINE`] above it.
fn device_sem_index(
    line: usize,
    device: usize,
    wait_for_read: bool,
) -> Result<usize, KernelError> {
    if !(param::BASE_DEV_LINE..=param::TERMINAL_LINE).contains(&line)
        || device >= param::DEV_PER_LINE
    {
        return Err(KernelError::NoSuchDevice { line, device });
    }
    let mut index = (line - param::BASE_DEV_LINE) * param::DEV_PER_LINE + device;
    if line == param::TERMINAL_LINE && !wait_for_read {
        index += param::DEV_PER_LINE;
    }
    Ok(index)
}

impl Nucleus {
    /// Entry for cause code 8.
    ///
    /// The program counter is stepped past the trapping instruction
    /// before anything else so a resume cannot re-issue the syscall.
    pub(crate) fn handle_syscall(
        &mut self,
        m: &mut impl Machine,
        mut saved: ProcessorState,
    ) -> Control {
        saved.pc += WORD_LEN as u32;

        if saved.in_user_mode() {
            // Every request from user mode, well-formed or not, must look
            // to the support layer exactly like a hardware RI trap.
            saved.set_exception_code(ExceptionCode::ReservedInstruction);
            debug!("syscall in user mode; raising reserved instruction");
            return self.pass_up_or_die(m, saved, PassUpIndex::General);
        }

        let Some(code) = SyscallCode::from_repr(saved.a0()) else {
            debug!("syscall number {} out of range", saved.a0());
            return self.pass_up_or_die(m, saved, PassUpIndex::General);
        };

        let Some(pid) = self.current else {
            return Control::Panic("syscall with no current process");
        };

        // Any later resume must see the post-trap state.
        self.pool[pid].state = saved;
        trace!("{code} from process {pid}");

        match code {
            SyscallCode::CreateProcess => self.sys_create_process(m, pid),
            SyscallCode::TerminateProcess => self.sys_terminate_process(m, pid),
            SyscallCode::Passeren => self.sys_passeren(m, pid),
            SyscallCode::Verhogen => self.sys_verhogen(m, pid),
            SyscallCode::WaitForIo => self.sys_wait_for_io(m, pid),
            SyscallCode::GetCpuTime => self.sys_get_cpu_time(m, pid),
            SyscallCode::WaitForClock => self.sys_wait_for_clock(m),
            SyscallCode::GetSupportData => self.sys_get_support_data(m, pid),
        }
    }

    /// SYS1: spawn a child of the caller.
    ///
    /// `a1` points at the initial processor state, `a2` at the support
    /// structure or null. Returns 0 in `v0`, or -1 with nothing changed
    /// when the pool is empty.
    fn sys_create_process(&mut self, m: &mut impl Machine, parent: Pid) -> Control {
        let state_addr = MemAddr::new(self.pool[parent].state.a1());
        let support_addr = MemAddr::new(self.pool[parent].state.a2());

        match self.pool.alloc().ok_or(KernelError::OutOfPcbs) {
            Ok(child) => {
                self.pool[child].state = read_pod(m, state_addr);
                self.pool[child].support = (!support_addr.is_null()).then_some(support_addr);
                self.pool.insert_child(parent, child);
                self.ready_queue.insert(&mut self.pool, child);
                self.process_count += 1;
                self.pool[parent].state.set_v0(SYS_OK);
                debug!("process {parent} created {child}");
            }
            Err(error) => {
                debug!("process {parent} cannot create: {error}");
                self.pool[parent].state.set_v0(SYS_ERR);
            }
        }
        self.resume_current(m)
    }

    /// SYS2: terminate the caller and everything below it.
    fn sys_terminate_process(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        debug!("process {pid} terminates");
        self.terminate_subtree(m, pid);
        self.current = None;
        self.schedule(m)
    }

    /// SYS3: P on the semaphore at `a1`.
    fn sys_passeren(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        let sem = MemAddr::new(self.pool[pid].state.a1());
        let value = read_sem(m, sem) - 1;
        write_sem(m, sem, value);
        if value < 0 {
            self.block_and_schedule(m, sem)
        } else {
            self.resume_current(m)
        }
    }

    /// SYS4: V on the semaphore at `a1`.
    fn sys_verhogen(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        let sem = MemAddr::new(self.pool[pid].state.a1());
        let value = read_sem(m, sem) + 1;
        write_sem(m, sem, value);
        if value <= 0 {
            if let Some(released) = self.asl.remove_blocked(&mut self.pool, sem) {
                self.ready_queue.insert(&mut self.pool, released);
            }
        }
        self.resume_current(m)
    }

    /// SYS5: block until the addressed device completes.
    ///
    /// `a1` is the line, `a2` the device, `a3` non-zero when waiting for a
    /// terminal read. The matching interrupt releases the caller with the
    /// device status in `v0`.
    fn sys_wait_for_io(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        let state = &self.pool[pid].state;
        let (line, device) = (state.a1() as usize, state.a2() as usize);
        let wait_for_read = state.a3() != 0;

        match device_sem_index(line, device, wait_for_read) {
            Ok(index) => self.p_device_sem(m, index),
            Err(error) => {
                debug!("process {pid} rejected: {error}");
                let saved = self.pool[pid].state;
                self.pass_up_or_die(m, saved, PassUpIndex::General)
            }
        }
    }

    /// SYS6: accumulated CPU time, including this very call, in `v0`
    /// (microseconds).
    fn sys_get_cpu_time(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        self.charge_current(m);
        let time = self.pool[pid].cpu_time;
        self.pool[pid].state.set_v0(time.as_micros() as u32);
        self.resume_current(m)
    }

    /// SYS7: P on the pseudo-clock; released by the next 100 ms tick.
    fn sys_wait_for_clock(&mut self, m: &mut impl Machine) -> Control {
        self.p_device_sem(m, param::CLOCK_SEM)
    }

    /// SYS8: the caller's support structure pointer in `v0`.
    fn sys_get_support_data(&mut self, m: &mut impl Machine, pid: Pid) -> Control {
        let support = self.pool[pid].support.unwrap_or(MemAddr::NULL);
        self.pool[pid].state.set_v0(support.addr());
        self.resume_current(m)
    }

    /// P on a nucleus device semaphore, with the soft-block bookkeeping.
    fn p_device_sem(&mut self, m: &mut impl Machine, index: usize) -> Control {
        let sem = device_sem_addr(index);
        self.soft_blocked_count += 1;
        let value = read_sem(m, sem) - 1;
        write_sem(m, sem, value);
        if value < 0 {
            self.block_and_schedule(m, sem)
        } else {
            // the completion already arrived; nothing to wait for
            self.soft_blocked_count -= 1;
            self.resume_current(m)
        }
    }

    /// Charges and blocks the current process on `sem`, then schedules.
    pub(crate) fn block_and_schedule(&mut self, m: &mut impl Machine, sem: MemAddr) -> Control {
        self.charge_current(m);
        let Some(pid) = self.current.take() else {
            return Control::Panic("block with no current process");
        };
        if let Err(error) = self.asl.insert_blocked(&mut self.pool, sem, pid) {
            debug!("cannot block {pid}: {error}");
            return Control::Panic("semaphore descriptor table exhausted");
        }
        self.schedule(m)
    }

    /// Tears down the subtree rooted at `pid`, children first.
    ///
    /// Wherever each process sits (current slot, a waiter queue, the
    /// ready queue) it is detached before its PCB is freed. A waiter on
    /// a process-owned semaphore gives its missing V back by incrementing
    /// the value; a waiter on a device semaphore only adjusts the
    /// soft-block count, since device values signal completions rather
    /// than count resources.
    pub(crate) fn terminate_subtree(&mut self, m: &mut impl Machine, pid: Pid) {
        while let Some(child) = self.pool.remove_child(pid) {
            self.terminate_subtree(m, child);
        }

        if self.current == Some(pid) {
            self.pool.out_child(pid);
        } else if let Some(sem) = self.pool[pid].sem_addr {
            if self.asl.out_blocked(&mut self.pool, pid).is_err() {
                // invariant 2 says this cannot happen; fail loudly in
                // debug builds rather than corrupt the counters
                debug_assert!(false, "blocked process missing from its waiter queue");
            }
            if is_device_sem(sem) {
                self.soft_blocked_count -= 1;
            } else {
                write_sem(m, sem, read_sem(m, sem) + 1);
            }
        } else {
            self.ready_queue.remove(&mut self.pool, pid);
        }

        self.pool.free(pid);
        self.process_count -= 1;
    }
}
