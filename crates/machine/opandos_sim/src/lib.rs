//! A software model of the machine the nucleus runs on.
//!
//! [`SimMachine`] backs the [`Machine`] trait with plain memory: the BIOS
//! data page, the bus register area with its device register bank, and a
//! stretch of RAM. Time only moves when a test calls [`SimMachine::advance`],
//! so scenarios can place every interrupt on an exact microsecond.
//!
//! The simulator does not execute instructions. Tests play the role of the
//! running process: they build processor states, deliver traps the way the
//! firmware would, and inspect what the nucleus left behind.

use core::time::Duration;

use opandos_machine::{DeviceRegister, Machine, MemAddr, memlayout, read_pod, write_pod};
use opandos_types::{ExceptionCode, ProcessorState};

mod logger;

pub use logger::init_logger;

const BIOS_BASE: u32 = 0x0FFF_F000;
const BIOS_LEN: usize = 0x1000;
const BUS_BASE: u32 = 0x1000_0000;
const BUS_LEN: usize = 0x400;
const RAM_BASE: u32 = 0x2000_0000;

/// Default installed RAM.
pub const DEFAULT_RAM_LEN: usize = 256 * 1024;

/// The simulated machine.
pub struct SimMachine {
    bios: Box<[u8]>,
    bus: Box<[u8]>,
    ram: Box<[u8]>,
    clock: Duration,
    local_timer: u32,
    status: u32,
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ram_len(DEFAULT_RAM_LEN)
    }

    #[must_use]
    pub fn with_ram_len(ram_len: usize) -> Self {
        let mut machine = Self {
            bios: vec![0; BIOS_LEN].into_boxed_slice(),
            bus: vec![0; BUS_LEN].into_boxed_slice(),
            ram: vec![0; ram_len].into_boxed_slice(),
            clock: Duration::ZERO,
            local_timer: 0,
            status: 0,
        };
        machine.write_word(memlayout::RAM_BASE, RAM_BASE);
        machine.write_word(memlayout::RAM_SIZE, ram_len as u32);
        machine.write_word(memlayout::TIMESCALE, 1);
        machine
    }

    /// Moves the time-of-day clock forward.
    pub fn advance(&mut self, elapsed: Duration) {
        self.clock += elapsed;
    }

    /// Current time-of-day.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock
    }

    /// Last value loaded into the interval timer, in microseconds.
    #[must_use]
    pub fn interval_timer(&self) -> u32 {
        self.read_word(memlayout::INTERVAL_TIMER)
    }

    /// Last value loaded into the processor status register.
    #[must_use]
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Stores a processor state anywhere in simulated memory.
    pub fn write_state(&mut self, addr: MemAddr, state: &ProcessorState) {
        write_pod(self, addr, state);
    }

    /// Reads a processor state back out of simulated memory.
    #[must_use]
    pub fn read_state(&self, addr: MemAddr) -> ProcessorState {
        read_pod(self, addr)
    }

    /// Saves `state` at the BIOS data page, exactly what the firmware does
    /// before it enters the nucleus.
    pub fn deliver_trap(&mut self, state: &ProcessorState) {
        self.write_state(memlayout::BIOS_DATA_PAGE, state);
    }

    /// Delivers `state` as a syscall trap.
    pub fn deliver_syscall(&mut self, state: &ProcessorState) {
        let mut state = *state;
        state.set_exception_code(ExceptionCode::Syscall);
        self.deliver_trap(&state);
    }

    /// Delivers `state` as an interrupt trap with `line` pending.
    pub fn deliver_interrupt(&mut self, state: &ProcessorState, line: usize) {
        let mut state = *state;
        state.set_exception_code(ExceptionCode::Interrupt);
        state.set_interrupt_pending(line);
        self.deliver_trap(&state);
    }

    /// Latches a completion on a device: status becomes visible in the
    /// register bank and the line's pending bitmap carries the device.
    ///
    /// For terminals, `transmit` selects the transmitter sub-device.
    pub fn raise_device(&mut self, line: usize, device: usize, status: u32, transmit: bool) {
        let reg = memlayout::dev_reg_addr(line, device);
        let offset = if transmit { 8 } else { 0 };
        self.write_word(reg.byte_add(offset), status);

        let bitmap_addr = memlayout::interrupt_bitmap_addr(line);
        let bitmap = self.read_word(bitmap_addr) | (1 << device);
        self.write_word(bitmap_addr, bitmap);
    }

    fn slot(&self, addr: MemAddr) -> (&[u8], usize) {
        let a = addr.addr();
        if (BIOS_BASE..BIOS_BASE + BIOS_LEN as u32).contains(&a) {
            (&self.bios, (a - BIOS_BASE) as usize)
        } else if (BUS_BASE..BUS_BASE + BUS_LEN as u32).contains(&a) {
            (&self.bus, (a - BUS_BASE) as usize)
        } else if (RAM_BASE..RAM_BASE + self.ram.len() as u32).contains(&a) {
            (&self.ram, (a - RAM_BASE) as usize)
        } else {
            panic!("bus error: access to unmapped address {addr}");
        }
    }

    fn slot_mut(&mut self, addr: MemAddr) -> (&mut [u8], usize) {
        let a = addr.addr();
        if (BIOS_BASE..BIOS_BASE + BIOS_LEN as u32).contains(&a) {
            (&mut self.bios, (a - BIOS_BASE) as usize)
        } else if (BUS_BASE..BUS_BASE + BUS_LEN as u32).contains(&a) {
            (&mut self.bus, (a - BUS_BASE) as usize)
        } else if (RAM_BASE..RAM_BASE + self.ram.len() as u32).contains(&a) {
            (&mut self.ram, (a - RAM_BASE) as usize)
        } else {
            panic!("bus error: access to unmapped address {addr}");
        }
    }

    fn ack_side_effects(&mut self, addr: MemAddr, value: u32) {
        // Writing ACK to a command sub-register completes the interrupt:
        // the device drops out of the pending bitmap and the acked
        // sub-device reports ready again.
        let base = memlayout::DEV_REG_BASE.addr();
        let bank_len = (5 * 8 * memlayout::DEV_REG_SIZE) as u32;
        let a = addr.addr();
        if !(base..base + bank_len).contains(&a) || value != DeviceRegister::COMMAND_ACK {
            return;
        }
        let offset = (a - base) as usize;
        let field = offset % memlayout::DEV_REG_SIZE;
        if field != 4 && field != 12 {
            return;
        }

        let slot = offset / memlayout::DEV_REG_SIZE;
        let (line, device) = (slot / 8 + 3, slot % 8);
        let status_field = if field == 12 { 8 } else { 0 };
        self.write_word(
            memlayout::dev_reg_addr(line, device).byte_add(status_field),
            DeviceRegister::STATUS_READY,
        );

        let bitmap_addr = memlayout::interrupt_bitmap_addr(line);
        let bitmap = self.read_word(bitmap_addr) & !(1 << device);
        self.write_word(bitmap_addr, bitmap);
    }
}

impl Machine for SimMachine {
    fn read_word(&self, addr: MemAddr) -> u32 {
        if addr == memlayout::TOD_LO {
            let scale = u64::from(self.read_word(memlayout::TIMESCALE).max(1));
            return (self.clock.as_micros() as u64 * scale) as u32;
        }
        let (region, offset) = self.slot(addr);
        u32::from_le_bytes(region[offset..offset + 4].try_into().unwrap())
    }

    fn write_word(&mut self, addr: MemAddr, value: u32) {
        let (region, offset) = self.slot_mut(addr);
        region[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.ack_side_effects(addr, value);
    }

    fn set_local_timer(&mut self, ticks: u32) {
        self.local_timer = ticks;
    }

    fn local_timer(&self) -> u32 {
        self.local_timer
    }

    fn set_status(&mut self, status: u32) {
        self.status = status;
    }
}
