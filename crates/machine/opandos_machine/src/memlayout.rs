//! Fixed addresses of the firmware-defined memory map.

use opandos_types::WORD_LEN;

use crate::MemAddr;

/// Page where the firmware saves the processor state on every trap.
pub const BIOS_DATA_PAGE: MemAddr = MemAddr::new(0x0FFF_F000);

/// Firmware table of trap handler entry points and stacks.
pub const PASS_UP_VECTOR: MemAddr = MemAddr::new(0x0FFF_F900);

/// Base of the bus register area.
pub const BUS_REG_BASE: MemAddr = MemAddr::new(0x1000_0000);

/// Installed RAM base and size, first two bus registers.
pub const RAM_BASE: MemAddr = BUS_REG_BASE;
pub const RAM_SIZE: MemAddr = MemAddr::new(0x1000_0004);

/// Low word of the time-of-day clock.
pub const TOD_LO: MemAddr = MemAddr::new(0x1000_001C);

/// Countdown register of the interval timer.
pub const INTERVAL_TIMER: MemAddr = MemAddr::new(0x1000_0020);

/// Clock ticks per microsecond.
pub const TIMESCALE: MemAddr = MemAddr::new(0x1000_0024);

/// Per-line pending-interrupt device bitmaps, lines 3..=7.
pub const INTERRUPT_BITMAP_BASE: MemAddr = MemAddr::new(0x1000_0040);

/// Device register bank: 5 lines of 8 devices, 4 words each.
pub const DEV_REG_BASE: MemAddr = MemAddr::new(0x1000_0054);

/// Bytes per device register block.
pub const DEV_REG_SIZE: usize = 16;

/// Start of installed RAM.
pub const RAM_START: MemAddr = MemAddr::new(0x2000_0000);

/// Top of the nucleus stack, used for both pass-up vector stacks.
pub const KERNEL_STACK: MemAddr = MemAddr::new(0x2000_1000);

/// Nucleus static data frame; holds the device semaphore table.
pub const KERNEL_DATA: MemAddr = MemAddr::new(0x2000_2000);

/// The nucleus device semaphores, one word each, in kernel data.
///
/// Lines 3..=7 at `(line - 3) * 8 + device`, terminal transmitters 8 slots
/// above their receivers, the pseudo-clock in the last slot. Blocking keys
/// inside this range are device semaphores; everything else is a
/// general-purpose semaphore owned by some process.
pub const DEVICE_SEM_BASE: MemAddr = KERNEL_DATA;

/// Entry point of the nucleus exception handler, as published in the
/// pass-up vector.
pub const EXCEPTION_ENTRY: MemAddr = MemAddr::new(0x2000_4000);

/// Entry point of the firmware TLB-refill stub.
pub const TLB_REFILL_ENTRY: MemAddr = MemAddr::new(0x2000_4800);

/// Bus address of the pending-device bitmap word for an interrupt line.
#[must_use]
pub const fn interrupt_bitmap_addr(line: usize) -> MemAddr {
    INTERRUPT_BITMAP_BASE.byte_add(((line - 3) * WORD_LEN) as u32)
}

/// Bus address of the register block for one device.
#[must_use]
pub const fn dev_reg_addr(line: usize, device: usize) -> MemAddr {
    DEV_REG_BASE.byte_add((((line - 3) * 8 + device) * DEV_REG_SIZE) as u32)
}
