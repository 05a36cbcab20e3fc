#![no_std]

use core::time::Duration;

/// Maximum number of concurrent processes.
pub const MAX_PROC: usize = 20;

/// Semaphore descriptors in the ASL table.
///
/// One per process plus the two list sentinels.
pub const MAX_SEMD: usize = MAX_PROC + 2;

/// Processor time slice handed to each scheduled process.
pub const TIME_SLICE: Duration = Duration::from_millis(5);

/// Pseudo-clock period; the interval timer fires once per period.
pub const PSECOND: Duration = Duration::from_millis(100);

/// Interrupt lines wired to external devices (lines 3..=7).
pub const DEV_INT_LINES: usize = 5;

/// Devices per interrupt line.
pub const DEV_PER_LINE: usize = 8;

/// Lowest interrupt line carrying external devices.
pub const BASE_DEV_LINE: usize = 3;

/// Interrupt line of the processor local timer.
pub const PLT_LINE: usize = 1;

/// Interrupt line of the interval timer (pseudo-clock source).
pub const INTERVAL_LINE: usize = 2;

/// Interrupt line shared by the terminal devices.
///
/// Each terminal owns two device semaphores: the receiver at its base
/// slot and the transmitter [`DEV_PER_LINE`] slots above it.
pub const TERMINAL_LINE: usize = 7;

/// Nucleus-maintained device semaphores.
///
/// 40 base slots for lines 3..=7, 8 extra transmitter slots for the
/// terminals, and one more for the pseudo-clock.
pub const DEV_SEM_COUNT: usize = (DEV_INT_LINES + 1) * DEV_PER_LINE + 1;

/// Index of the pseudo-clock semaphore within the device semaphore table.
pub const CLOCK_SEM: usize = DEV_SEM_COUNT - 1;
