//! The support-layer ABI: the pass-up vector written at boot and the
//! per-process support structure that pass-up-or-die targets.
//!
//! The support structure lives in the address space of the support layer;
//! the nucleus only ever holds its machine address and reaches the two
//! arrays inside it by the offsets computed here.

use core::mem;

use dataview::Pod;

use crate::state::ProcessorState;

/// Firmware-defined table of handler entry points and stacks, written by
/// the nucleus at boot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub struct PassUpVector {
    pub tlb_refill_handler: u32,
    pub tlb_refill_stack_ptr: u32,
    pub exception_handler: u32,
    pub exception_stack_ptr: u32,
}

/// A minimal execution context: where the support layer resumes when an
/// exception is passed up.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub struct Context {
    pub stack_ptr: u32,
    pub status: u32,
    pub pc: u32,
}

impl Context {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            stack_ptr: 0,
            status: 0,
            pc: 0,
        }
    }
}

/// Which support-layer handler an exception is passed up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PassUpIndex {
    /// TLB exceptions.
    PageFault = 0,
    /// Everything else that is not a nucleus-handled syscall.
    General = 1,
}

/// Per-process support structure, registered at process creation.
///
/// Layout is binding: the support layer declares the identical record on
/// its side and the nucleus writes/reads it through raw memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod)]
pub struct SupportStruct {
    /// Address space identifier of the owning process.
    pub asid: u32,
    /// Saved exception states, one per [`PassUpIndex`].
    pub except_state: [ProcessorState; 2],
    /// Handler contexts, one per [`PassUpIndex`].
    pub except_context: [Context; 2],
}

const _: () = {
    assert!(core::mem::size_of::<SupportStruct>() == 4 + 2 * 140 + 2 * 12);
};

impl SupportStruct {
    /// Byte offset of `except_state[index]` from the structure base.
    #[must_use]
    pub const fn state_offset(index: PassUpIndex) -> u32 {
        (mem::offset_of!(Self, except_state) + index as usize * mem::size_of::<ProcessorState>())
            as u32
    }

    /// Byte offset of `except_context[index]` from the structure base.
    #[must_use]
    pub const fn context_offset(index: PassUpIndex) -> u32 {
        (mem::offset_of!(Self, except_context) + index as usize * mem::size_of::<Context>()) as u32
    }
}
