//! Shared harness for the nucleus integration tests.
//!
//! The simulator does not execute code, so each test plays the running
//! process: it takes the state the nucleus asked to load, fills in syscall
//! registers or lets a timer expire, and hands the trap back in.

#![allow(dead_code)]

use core::time::Duration;

use opandos_kernel::Nucleus;
use opandos_kernel_params as param;
use opandos_machine::{Control, Machine as _, MemAddr};
use opandos_sim::SimMachine;
use opandos_types::{ProcessorState, Status, SyscallCode, reg};

/// Entry point handed to boot as the initial process body.
pub const TEST_ENTRY: MemAddr = MemAddr::new(0x2000_8000);

/// RAM scratch for user semaphores, staged states and support structures.
pub const SCRATCH: MemAddr = MemAddr::new(0x2002_0000);

pub struct Harness {
    pub m: SimMachine,
    pub nuc: Nucleus,
}

impl Harness {
    /// Boots the nucleus and returns the dispatched first process state.
    pub fn boot() -> (Self, ProcessorState) {
        opandos_sim::init_logger();
        let mut h = Self {
            m: SimMachine::new(),
            nuc: Nucleus::new(),
        };
        let control = h.nuc.boot(&mut h.m, TEST_ENTRY);
        h.nuc.audit();
        let first = expect_load(control);
        (h, first)
    }

    /// A zero-initialized user semaphore cell, distinct per `slot`.
    pub fn user_sem(&mut self, slot: usize) -> MemAddr {
        let addr = SCRATCH.word_add(slot);
        self.m.write_word(addr, 0);
        addr
    }

    pub fn sem_value(&self, addr: MemAddr) -> i32 {
        self.m.read_word(addr) as i32
    }

    /// Stages an initial kernel-mode state for a process created with
    /// SYS1 and returns where it was written.
    pub fn stage_state(&mut self, slot: usize) -> MemAddr {
        let addr = SCRATCH.byte_add(0x1000 + (slot as u32) * 0x100);
        let mut state = ProcessorState::zeroed();
        state.set_entry_point(0x2003_0000 + (slot as u32) * 0x40);
        state.set_sp(0x2003_8000);
        state.status =
            (Status::INT_ENABLE_PREVIOUS | Status::PLT_ENABLE | Status::INT_MASK_ALL).bits();
        self.m.write_state(addr, &state);
        addr
    }

    /// Issues a syscall from the process whose state is `running`.
    pub fn syscall(
        &mut self,
        running: &ProcessorState,
        code: SyscallCode,
        args: [u32; 3],
    ) -> Control {
        let mut state = *running;
        state.regs[reg::A0] = code as u32;
        state.regs[reg::A1] = args[0];
        state.regs[reg::A2] = args[1];
        state.regs[reg::A3] = args[2];
        self.m.deliver_syscall(&state);
        let control = self.nuc.handle_trap(&mut self.m);
        self.nuc.audit();
        control
    }

    /// SYS1 with a freshly staged state; returns the resumed caller.
    pub fn create_child(&mut self, parent: &ProcessorState, slot: usize) -> ProcessorState {
        let child_state = self.stage_state(slot);
        let control = self.syscall(
            parent,
            SyscallCode::CreateProcess,
            [child_state.addr(), 0, 0],
        );
        let resumed = expect_load(control);
        assert_eq!(resumed.v0(), 0, "create_process failed");
        resumed
    }

    /// Delivers an interrupt on `line`, trapping out of `running` (or out
    /// of the idle loop when nothing runs).
    pub fn interrupt(&mut self, running: Option<&ProcessorState>, line: usize) -> Control {
        let state = running.copied().unwrap_or_else(ProcessorState::zeroed);
        self.m.deliver_interrupt(&state, line);
        let control = self.nuc.handle_trap(&mut self.m);
        self.nuc.audit();
        control
    }

    /// Runs `running`'s slice out and delivers the expiry interrupt.
    pub fn expire_slice(&mut self, running: &ProcessorState) -> Control {
        self.m.advance(param::TIME_SLICE);
        self.interrupt(Some(running), param::PLT_LINE)
    }

    /// Lets the pseudo-clock period elapse and delivers its tick.
    pub fn pseudo_clock_tick(&mut self, running: Option<&ProcessorState>) -> Control {
        let remaining = Duration::from_micros(u64::from(self.m.interval_timer()));
        self.m.advance(remaining);
        self.interrupt(running, param::INTERVAL_LINE)
    }
}

/// Unwraps a state load; anything else fails the test.
pub fn expect_load(control: Control) -> ProcessorState {
    match control {
        Control::LoadState(state) => state,
        other => panic!("expected a state load, got {other:?}"),
    }
}
