//! Boots the nucleus on the simulated machine and walks two processes
//! through a semaphore hand-off and a terminal write.
//!
//! Run with `LOG=trace cargo run --example demo` to watch the nucleus
//! narrate every decision.

use core::time::Duration;

use opandos_kernel::{Nucleus, device_sem_addr};
use opandos_machine::{Control, Machine as _, MemAddr};
use opandos_sim::SimMachine;
use opandos_types::{ProcessorState, Status, SyscallCode, reg};

const ENTRY: MemAddr = MemAddr::new(0x2000_8000);
const CHILD_STATE: MemAddr = MemAddr::new(0x2002_0000);
const SEM: MemAddr = MemAddr::new(0x2002_1000);

fn syscall(
    m: &mut SimMachine,
    nuc: &mut Nucleus,
    running: &ProcessorState,
    code: SyscallCode,
    args: [u32; 3],
) -> Control {
    let mut state = *running;
    state.regs[reg::A0] = code as u32;
    state.regs[reg::A1] = args[0];
    state.regs[reg::A2] = args[1];
    state.regs[reg::A3] = args[2];
    m.deliver_syscall(&state);
    nuc.handle_trap(m)
}

fn loaded(control: Control) -> ProcessorState {
    match control {
        Control::LoadState(state) => state,
        other => panic!("expected a dispatch, got {other:?}"),
    }
}

fn main() {
    opandos_sim::init_logger();

    let mut m = SimMachine::new();
    let mut nuc = Nucleus::new();
    let parent = loaded(nuc.boot(&mut m, ENTRY));
    println!("booted; first process entered at {:#x}", parent.pc);

    // stage a child and spawn it
    let mut child_state = ProcessorState::zeroed();
    child_state.set_entry_point(0x2000_9000);
    child_state.set_sp(0x2003_0000);
    child_state.status =
        (Status::INT_ENABLE_PREVIOUS | Status::PLT_ENABLE | Status::INT_MASK_ALL).bits();
    m.write_state(CHILD_STATE, &child_state);
    let parent = loaded(syscall(
        &mut m,
        &mut nuc,
        &parent,
        SyscallCode::CreateProcess,
        [CHILD_STATE.addr(), 0, 0],
    ));
    println!("created a child; {} processes live", nuc.process_count());

    // parent consumes, child produces
    m.write_word(SEM, 0);
    m.advance(Duration::from_micros(250));
    let child = loaded(syscall(
        &mut m,
        &mut nuc,
        &parent,
        SyscallCode::Passeren,
        [SEM.addr(), 0, 0],
    ));
    println!("parent blocked on the semaphore; child dispatched");
    let child = loaded(syscall(
        &mut m,
        &mut nuc,
        &child,
        SyscallCode::Verhogen,
        [SEM.addr(), 0, 0],
    ));
    println!("child signalled; parent is ready again");

    // child writes to terminal 0 and blocks until the transmitter is done
    let control = syscall(&mut m, &mut nuc, &child, SyscallCode::WaitForIo, [7, 0, 0]);
    let parent = loaded(control);
    println!(
        "child awaits terminal 0; semaphore {} = {}",
        device_sem_addr(40),
        m.read_word(device_sem_addr(40)) as i32
    );

    m.advance(Duration::from_micros(900));
    m.raise_device(7, 0, 5, true);
    m.deliver_interrupt(&parent, 7);
    let resumed = loaded(nuc.handle_trap(&mut m));
    println!("transmitter done; interrupted process resumes at {:#x}", resumed.pc);

    // the root's termination takes the whole tree with it
    let control = syscall(&mut m, &mut nuc, &resumed, SyscallCode::TerminateProcess, [0, 0, 0]);
    assert_eq!(control, Control::Halt);
    println!("all processes gone; machine halts");
}
