//! The opandos nucleus.
//!
//! The lowest layer of the kernel: process control blocks and their
//! queues, the active semaphore list, a round-robin scheduler with
//! preemptive time slicing, the unified trap entry with its eight
//! services, device interrupt acknowledgement, and pass-up-or-die
//! delivery of everything else to the support layer.
//!
//! The nucleus never touches hardware directly; it runs against the
//! [`opandos_machine::Machine`] trait and answers every trap with an
//! [`opandos_machine::Control`] telling the firmware what to load next.
//! That keeps the whole of it buildable and testable on a development
//! host with a simulated machine.

#![cfg_attr(not(test), no_std)]

pub mod asl;
pub mod error;
mod interrupt;
pub mod nucleus;
pub mod proc;
mod sched;
mod syscall;
mod trap;

pub use error::KernelError;
pub use nucleus::{Nucleus, device_sem_addr};
pub use proc::Pid;
