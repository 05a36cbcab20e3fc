//! The processor state saved by the firmware on every trap.

use bitflags::bitflags;
use dataview::Pod;

use crate::ExceptionCode;

/// General registers in a saved state.
pub const STATE_REG_NUM: usize = 31;

/// Named indices into [`ProcessorState::regs`].
///
/// The aliases are part of the external ABI: syscall arguments arrive in
/// `a0..a3`, results leave in `v0`, and the first process is launched
/// through `t9` as well as the program counter.
pub mod reg {
    pub const AT: usize = 0;
    pub const V0: usize = 1;
    pub const V1: usize = 2;
    pub const A0: usize = 3;
    pub const A1: usize = 4;
    pub const A2: usize = 5;
    pub const A3: usize = 6;
    pub const T9: usize = 24;
    pub const GP: usize = 25;
    pub const SP: usize = 26;
    pub const FP: usize = 27;
    pub const RA: usize = 28;
    pub const HI: usize = 29;
    pub const LO: usize = 30;
}

bitflags! {
    /// Fields of the status word.
    ///
    /// The `*_PREVIOUS` bits take effect when the state is loaded: a load
    /// pops the previous bits into the current ones.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Status: u32 {
        /// Global interrupt enable, current.
        const INT_ENABLE_CURRENT = 1 << 0;
        /// User mode, current.
        const USER_MODE_CURRENT = 1 << 1;
        /// Global interrupt enable after the next state load.
        const INT_ENABLE_PREVIOUS = 1 << 2;
        /// User mode after the next state load.
        const USER_MODE_PREVIOUS = 1 << 3;
        /// Per-line interrupt mask, lines 0..=7.
        const INT_MASK_ALL = 0xFF00;
        /// Processor local timer enable.
        const PLT_ENABLE = 1 << 27;
    }
}

const EXC_CODE_SHIFT: u32 = 2;
const EXC_CODE_MASK: u32 = 0x7C;
const INT_PENDING_SHIFT: u32 = 8;

/// Register snapshot written to the BIOS data page by the firmware on every
/// trap and loaded back by the nucleus to resume a process.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub struct ProcessorState {
    /// Address space identifier.
    pub entry_hi: u32,
    /// Trap cause word; exception code in bits 2..6, pending interrupt
    /// lines in bits 8..15.
    pub cause: u32,
    /// Status word, see [`Status`].
    pub status: u32,
    /// Program counter at the trap.
    pub pc: u32,
    /// General register file, indexed by [`reg`].
    pub regs: [u32; STATE_REG_NUM],
}

const _: () = {
    assert!(core::mem::size_of::<ProcessorState>() == 140);
    assert!(core::mem::align_of::<ProcessorState>() == 4);
};

impl ProcessorState {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entry_hi: 0,
            cause: 0,
            status: 0,
            pc: 0,
            regs: [0; STATE_REG_NUM],
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::from_bits_retain(self.status)
    }

    /// Whether the trapped code was running in user mode.
    #[must_use]
    pub fn in_user_mode(&self) -> bool {
        self.status().contains(Status::USER_MODE_PREVIOUS)
    }

    /// Exception code carried in the cause word, if it names a known code.
    #[must_use]
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        ExceptionCode::from_repr((self.cause & EXC_CODE_MASK) >> EXC_CODE_SHIFT)
    }

    /// Rewrites the exception code bits of the cause word in place.
    pub fn set_exception_code(&mut self, code: ExceptionCode) {
        self.cause = (self.cause & !EXC_CODE_MASK) | ((code as u32) << EXC_CODE_SHIFT);
    }

    /// Whether interrupt line `line` is flagged pending in the cause word.
    #[must_use]
    pub fn interrupt_pending(&self, line: usize) -> bool {
        debug_assert!(line < 8);
        self.cause & (1 << (INT_PENDING_SHIFT + line as u32)) != 0
    }

    /// Flags interrupt line `line` pending; only the machine side composes
    /// cause words, the nucleus just reads them.
    pub fn set_interrupt_pending(&mut self, line: usize) {
        debug_assert!(line < 8);
        self.cause |= 1 << (INT_PENDING_SHIFT + line as u32);
    }

    #[must_use]
    pub fn a0(&self) -> u32 {
        self.regs[reg::A0]
    }

    #[must_use]
    pub fn a1(&self) -> u32 {
        self.regs[reg::A1]
    }

    #[must_use]
    pub fn a2(&self) -> u32 {
        self.regs[reg::A2]
    }

    #[must_use]
    pub fn a3(&self) -> u32 {
        self.regs[reg::A3]
    }

    #[must_use]
    pub fn v0(&self) -> u32 {
        self.regs[reg::V0]
    }

    pub fn set_v0(&mut self, value: u32) {
        self.regs[reg::V0] = value;
    }

    pub fn set_sp(&mut self, value: u32) {
        self.regs[reg::SP] = value;
    }

    /// Points both the program counter and `t9` at `entry`.
    ///
    /// Position-independent code computes its globals from `t9`, so the two
    /// must agree whenever the nucleus fabricates a state from scratch.
    pub fn set_entry_point(&mut self, entry: u32) {
        self.pc = entry;
        self.regs[reg::T9] = entry;
    }
}
