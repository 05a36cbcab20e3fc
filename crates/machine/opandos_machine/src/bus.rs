//! Typed access to the bus register area and the device register bank.

use core::time::Duration;

use dataview::{Pod, PodMethods as _};

use opandos_types::WORD_LEN;

use crate::{Machine, MemAddr, memlayout};

/// Register block of one external device.
///
/// Terminals overlay two independent sub-devices on one block: the
/// receiver on `status`/`command` and the transmitter on `data0`/`data1`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub struct DeviceRegister {
    pub status: u32,
    pub command: u32,
    pub data0: u32,
    pub data1: u32,
}

impl DeviceRegister {
    /// Device ready for the next command.
    pub const STATUS_READY: u32 = 1;
    /// Operation in progress.
    pub const STATUS_BUSY: u32 = 3;
    /// Terminal sub-device completed a character transfer.
    pub const STATUS_CHAR_DONE: u32 = 5;
    /// Low byte of a terminal sub-register carries the status code.
    pub const TERM_STATUS_MASK: u32 = 0xFF;
    /// Acknowledge the outstanding interrupt.
    pub const COMMAND_ACK: u32 = 1;
}

const STATUS_OFFSET: u32 = 0;
const COMMAND_OFFSET: u32 = 4;
const TRANSM_STATUS_OFFSET: u32 = 8;
const TRANSM_COMMAND_OFFSET: u32 = 12;

/// Reads a `Pod` record word by word from the bus.
pub fn read_pod<T: Pod>(m: &impl Machine, addr: MemAddr) -> T {
    let mut value = T::zeroed();
    for (index, chunk) in value.as_bytes_mut().chunks_exact_mut(WORD_LEN).enumerate() {
        chunk.copy_from_slice(&m.read_word(addr.word_add(index)).to_le_bytes());
    }
    value
}

/// Writes a `Pod` record word by word to the bus.
pub fn write_pod<T: Pod>(m: &mut impl Machine, addr: MemAddr, value: &T) {
    for (index, chunk) in value.as_bytes().chunks_exact(WORD_LEN).enumerate() {
        m.write_word(addr.word_add(index), u32::from_le_bytes(chunk.try_into().unwrap()));
    }
}

/// Current time of day.
pub fn tod(m: &impl Machine) -> Duration {
    let scale = m.read_word(memlayout::TIMESCALE).max(1);
    Duration::from_micros(u64::from(m.read_word(memlayout::TOD_LO) / scale))
}

/// Arms the interval timer to fire after `period`.
pub fn load_interval_timer(m: &mut impl Machine, period: Duration) {
    let scale = m.read_word(memlayout::TIMESCALE).max(1);
    m.write_word(memlayout::INTERVAL_TIMER, period.as_micros() as u32 * scale);
}

/// Arms the processor local timer to fire after `slice`.
pub fn load_local_timer(m: &mut impl Machine, slice: Duration) {
    let scale = m.read_word(memlayout::TIMESCALE).max(1);
    m.set_local_timer(slice.as_micros() as u32 * scale);
}

/// First address past the end of installed RAM; the initial process stack
/// grows down from here.
pub fn ram_top(m: &impl Machine) -> MemAddr {
    MemAddr::new(m.read_word(memlayout::RAM_BASE) + m.read_word(memlayout::RAM_SIZE))
}

/// Pending-device bitmap of an interrupt line; bit `d` set means device
/// `d` has an interrupt outstanding.
pub fn pending_device_bitmap(m: &impl Machine, line: usize) -> u32 {
    m.read_word(memlayout::interrupt_bitmap_addr(line))
}

/// Latched status word of a device, or of one terminal sub-device.
pub fn device_status(m: &impl Machine, line: usize, device: usize, transmit: bool) -> u32 {
    let offset = if transmit { TRANSM_STATUS_OFFSET } else { STATUS_OFFSET };
    m.read_word(memlayout::dev_reg_addr(line, device).byte_add(offset))
}

/// Writes ACK to the command sub-register that raised the interrupt.
pub fn ack_device(m: &mut impl Machine, line: usize, device: usize, transmit: bool) {
    let offset = if transmit { TRANSM_COMMAND_OFFSET } else { COMMAND_OFFSET };
    m.write_word(
        memlayout::dev_reg_addr(line, device).byte_add(offset),
        DeviceRegister::COMMAND_ACK,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The bus register area alone, enough for the helpers.
    struct TestBus {
        words: [u32; 0x100],
        local_timer: u32,
    }

    impl TestBus {
        fn new() -> Self {
            let mut bus = Self {
                words: [0; 0x100],
                local_timer: 0,
            };
            bus.write_word(memlayout::TIMESCALE, 1);
            bus
        }
    }

    impl Machine for TestBus {
        fn read_word(&self, addr: MemAddr) -> u32 {
            self.words[(addr.addr() - memlayout::BUS_REG_BASE.addr()) as usize / WORD_LEN]
        }

        fn write_word(&mut self, addr: MemAddr, value: u32) {
            self.words[(addr.addr() - memlayout::BUS_REG_BASE.addr()) as usize / WORD_LEN] = value;
        }

        fn set_local_timer(&mut self, ticks: u32) {
            self.local_timer = ticks;
        }

        fn local_timer(&self) -> u32 {
            self.local_timer
        }

        fn set_status(&mut self, _status: u32) {}
    }

    #[test]
    fn timers_scale_with_the_timescale() {
        let mut bus = TestBus::new();
        bus.write_word(memlayout::TIMESCALE, 4);

        load_interval_timer(&mut bus, Duration::from_millis(100));
        assert_eq!(bus.read_word(memlayout::INTERVAL_TIMER), 400_000);

        load_local_timer(&mut bus, Duration::from_millis(5));
        assert_eq!(bus.local_timer(), 20_000);

        bus.write_word(memlayout::TOD_LO, 400_000);
        assert_eq!(tod(&bus), Duration::from_millis(100));
    }

    #[test]
    fn device_register_round_trip() {
        let mut bus = TestBus::new();
        let value = DeviceRegister {
            status: DeviceRegister::STATUS_BUSY,
            command: 2,
            data0: 0xDEAD,
            data1: 0xBEEF,
        };
        write_pod(&mut bus, memlayout::dev_reg_addr(3, 0), &value);
        let back: DeviceRegister = read_pod(&bus, memlayout::dev_reg_addr(3, 0));
        assert_eq!(back, value);

        // field helpers agree with the raw layout
        assert_eq!(device_status(&bus, 3, 0, false), DeviceRegister::STATUS_BUSY);
        assert_eq!(device_status(&bus, 3, 0, true), 0xDEAD);

        ack_device(&mut bus, 3, 0, true);
        let back: DeviceRegister = read_pod(&bus, memlayout::dev_reg_addr(3, 0));
        assert_eq!(back.data1, DeviceRegister::COMMAND_ACK);
        assert_eq!(back.command, 2);
    }

    #[test]
    fn register_addresses_match_the_machine_map() {
        assert_eq!(memlayout::TOD_LO.addr(), 0x1000_001C);
        assert_eq!(memlayout::INTERVAL_TIMER.addr(), 0x1000_0020);
        assert_eq!(memlayout::interrupt_bitmap_addr(3).addr(), 0x1000_0040);
        assert_eq!(memlayout::interrupt_bitmap_addr(7).addr(), 0x1000_0050);
        assert_eq!(memlayout::dev_reg_addr(3, 0).addr(), 0x1000_0054);
        assert_eq!(
            memlayout::dev_reg_addr(7, 7).addr(),
            0x1000_0054 + 39 * memlayout::DEV_REG_SIZE as u32
        );
    }
}
