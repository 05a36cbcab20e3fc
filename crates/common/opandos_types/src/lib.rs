//! Machine-visible types shared by the nucleus, the machine interface and
//! host-side tooling: the saved processor state, the support-layer ABI, and
//! the syscall / exception code spaces.

#![cfg_attr(not(test), no_std)]

use strum::{Display, FromRepr};

pub mod state;
pub mod support;

pub use state::{ProcessorState, Status, reg};
pub use support::{Context, PassUpIndex, PassUpVector, SupportStruct};

/// Bytes per machine word.
pub const WORD_LEN: usize = 4;

/// The eight nucleus services, dispatched on the value found in `a0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRepr, Display)]
#[repr(u32)]
#[strum(serialize_all = "snake_case")]
pub enum SyscallCode {
    CreateProcess = 1,
    TerminateProcess,
    Passeren,
    Verhogen,
    WaitForIo,
    GetCpuTime,
    WaitForClock,
    GetSupportData,
}

/// Exception codes as reported in bits 2..6 of the cause word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u32)]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionCode {
    Interrupt = 0,
    TlbModification,
    TlbInvalidLoad,
    TlbInvalidStore,
    AddressErrorLoad,
    AddressErrorStore,
    BusErrorInstruction,
    BusErrorData,
    Syscall,
    Breakpoint,
    ReservedInstruction,
    CoprocessorUnusable,
    ArithmeticOverflow,
}

impl ExceptionCode {
    /// Whether this code is one of the three TLB management exceptions.
    #[must_use]
    pub fn is_tlb(self) -> bool {
        matches!(
            self,
            Self::TlbModification | Self::TlbInvalidLoad | Self::TlbInvalidStore
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_codes_cover_one_through_eight() {
        for n in 1..=8 {
            assert!(SyscallCode::from_repr(n).is_some(), "missing syscall {n}");
        }
        assert!(SyscallCode::from_repr(0).is_none());
        assert!(SyscallCode::from_repr(9).is_none());
    }

    #[test]
    fn exception_code_boundaries() {
        assert_eq!(ExceptionCode::from_repr(0), Some(ExceptionCode::Interrupt));
        assert_eq!(ExceptionCode::from_repr(8), Some(ExceptionCode::Syscall));
        assert_eq!(
            ExceptionCode::from_repr(10),
            Some(ExceptionCode::ReservedInstruction)
        );
        assert!(ExceptionCode::from_repr(13).is_none());
    }
}
