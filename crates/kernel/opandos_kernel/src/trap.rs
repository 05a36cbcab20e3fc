//! The single trap entry point and the pass-up-or-die policy.
//!
//! The firmware saves the interrupted state at the BIOS data page and
//! jumps here for every exception. The cause word picks exactly one
//! branch; each branch runs to completion and ends in a [`Control`].

use log::debug;

use opandos_machine::{Control, Machine, memlayout, read_pod, write_pod};
use opandos_types::{
    Context, ExceptionCode, PassUpIndex, ProcessorState, SupportStruct,
};

use crate::Nucleus;

impl Nucleus {
    /// Handles the trap whose state the firmware saved at the BIOS data
    /// page.
    pub fn handle_trap(&mut self, m: &mut impl Machine) -> Control {
        let saved: ProcessorState = read_pod(m, memlayout::BIOS_DATA_PAGE);

        match saved.exception_code() {
            Some(ExceptionCode::Interrupt) => self.handle_interrupt(m, saved),
            Some(code) if code.is_tlb() => {
                debug!("tlb exception {code}");
                self.pass_up_or_die(m, saved, PassUpIndex::PageFault)
            }
            Some(ExceptionCode::Syscall) => self.handle_syscall(m, saved),
            code => {
                // program traps, and any cause code the hardware may grow
                debug!("program trap {code:?}");
                self.pass_up_or_die(m, saved, PassUpIndex::General)
            }
        }
    }

    /// Hands the exception to the process's support layer, or terminates
    /// the whole offending subtree if it never registered one.
    ///
    /// The state written into the support structure is the one saved at
    /// the original trap, not the copy held in the PCB.
    pub(crate) fn pass_up_or_die(
        &mut self,
        m: &mut impl Machine,
        saved: ProcessorState,
        index: PassUpIndex,
    ) -> Control {
        let Some(pid) = self.current else {
            return Control::Panic("exception with no current process");
        };

        match self.pool[pid].support {
            Some(support) => {
                write_pod(m, support.byte_add(SupportStruct::state_offset(index)), &saved);
                self.charge_current(m);
                let context: Context =
                    read_pod(m, support.byte_add(SupportStruct::context_offset(index)));
                Control::LoadContext(context)
            }
            None => {
                debug!("process {pid} dies on pass-up with no support structure");
                self.terminate_subtree(m, pid);
                self.current = None;
                self.schedule(m)
            }
        }
    }
}
