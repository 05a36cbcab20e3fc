//! Synchronous I/O: WAIT_FOR_IO, device interrupts and the pseudo-clock.

mod common;

use common::{Harness, expect_load};

use opandos_kernel::device_sem_addr;
use opandos_kernel_params as param;
use opandos_machine::{Control, Machine as _, memlayout};
use opandos_types::SyscallCode;

/// Semaphore slot of terminal 0's transmitter: `(7 - 3) * 8 + 0 + 8`.
const TERM0_TRANSMIT_SLOT: usize = 40;

#[test]
fn terminal_write_blocks_then_returns_the_status() {
    let (mut h, first) = Harness::boot();

    // wait for a write on terminal line 7, device 0
    let control = h.syscall(&first, SyscallCode::WaitForIo, [7, 0, 0]);
    assert_eq!(control, Control::Wait);

    let sem = device_sem_addr(TERM0_TRANSMIT_SLOT);
    assert_eq!(h.sem_value(sem), -1);
    assert_eq!(h.nuc.soft_blocked_count(), 1);

    // the transmitter finishes with status 0x5
    h.m.raise_device(7, 0, 0x5, true);
    let control = h.interrupt(None, 7);

    let resumed = expect_load(control);
    assert_eq!(resumed.v0(), 0x5);
    assert_eq!(resumed.pc, first.pc + 4);
    assert_eq!(h.sem_value(sem), 0);
    assert_eq!(h.nuc.soft_blocked_count(), 0);

    // ACK landed in the transmit command sub-register
    let transm_command = h.m.read_word(memlayout::dev_reg_addr(7, 0).byte_add(12));
    assert_eq!(transm_command, 1);
}

#[test]
fn terminal_read_uses_the_receiver_slot() {
    let (mut h, first) = Harness::boot();

    let control = h.syscall(&first, SyscallCode::WaitForIo, [7, 0, 1]);
    assert_eq!(control, Control::Wait);
    // receiver slot, not the transmitter
    assert_eq!(h.sem_value(device_sem_addr(32)), -1);
    assert_eq!(h.sem_value(device_sem_addr(TERM0_TRANSMIT_SLOT)), 0);

    h.m.raise_device(7, 0, 0x5, false);
    let resumed = expect_load(h.interrupt(None, 7));
    assert_eq!(resumed.v0(), 0x5);
}

#[test]
fn disk_io_round_trip() {
    let (mut h, first) = Harness::boot();

    // disk line 3, device 2
    let control = h.syscall(&first, SyscallCode::WaitForIo, [3, 2, 0]);
    assert_eq!(control, Control::Wait);
    assert_eq!(h.sem_value(device_sem_addr(2)), -1);

    h.m.raise_device(3, 2, 1, false);
    let resumed = expect_load(h.interrupt(None, 3));
    assert_eq!(resumed.v0(), 1);
    assert_eq!(h.nuc.soft_blocked_count(), 0);
}

#[test]
fn lowest_numbered_device_is_serviced_first() {
    let (mut h, parent) = Harness::boot();

    // two processes wait on devices 5 and 1 of the same line
    let parent = h.create_child(&parent, 0);
    let child = expect_load(h.syscall(&parent, SyscallCode::WaitForIo, [4, 5, 0]));
    let control = h.syscall(&child, SyscallCode::WaitForIo, [4, 1, 0]);
    assert_eq!(control, Control::Wait);
    let sem_dev1 = device_sem_addr((4 - 3) * 8 + 1);
    let sem_dev5 = device_sem_addr((4 - 3) * 8 + 5);
    assert_eq!(h.sem_value(sem_dev1), -1);
    assert_eq!(h.sem_value(sem_dev5), -1);

    // both complete at once; device 1 outranks device 5
    h.m.raise_device(4, 5, 1, false);
    h.m.raise_device(4, 1, 1, false);
    let _ = h.interrupt(None, 4);
    assert_eq!(h.sem_value(sem_dev1), 0);
    assert_eq!(h.sem_value(sem_dev5), -1);
    assert_eq!(h.nuc.soft_blocked_count(), 1);

    // the next interrupt trap services the remaining device
    let _ = h.interrupt(None, 4);
    assert_eq!(h.sem_value(sem_dev5), 0);
    assert_eq!(h.nuc.soft_blocked_count(), 0);
}

#[test]
fn pseudo_clock_tick_releases_every_waiter_in_order() {
    let (mut h, parent) = Harness::boot();

    // four children, then rotate the parent behind them so the children
    // block first and terminating one never tears down the others
    let mut running = parent;
    for slot in 0..4 {
        running = h.create_child(&running, slot);
    }
    running = expect_load(h.expire_slice(&running));

    let mut waiters = vec![];
    let mut control = Control::Halt;
    for _ in 0..5 {
        waiters.push(h.nuc.current().unwrap());
        control = h.syscall(&running, SyscallCode::WaitForClock, [0, 0, 0]);
        if let Control::LoadState(next) = control {
            running = next;
        }
    }
    assert_eq!(control, Control::Wait);

    let clock = device_sem_addr(param::CLOCK_SEM);
    assert_eq!(h.sem_value(clock), -5);
    assert_eq!(h.nuc.soft_blocked_count(), 5);

    // one tick empties the queue and zeroes the semaphore
    let control = h.pseudo_clock_tick(None);
    assert_eq!(h.sem_value(clock), 0);
    assert_eq!(h.nuc.soft_blocked_count(), 0);
    assert_eq!(h.nuc.ready_count(), 4);

    // dispatch order equals blocking order
    let mut released = vec![];
    let mut running = expect_load(control);
    for _ in 0..5 {
        released.push(h.nuc.current().unwrap());
        match h.syscall(&running, SyscallCode::TerminateProcess, [0, 0, 0]) {
            Control::LoadState(next) => running = next,
            Control::Halt => break,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(released, waiters);
}

#[test]
fn wait_for_io_on_a_bad_line_is_fatal_without_support() {
    let (mut h, first) = Harness::boot();
    let control = h.syscall(&first, SyscallCode::WaitForIo, [9, 0, 0]);
    // the lone process dies, so the machine halts in good order
    assert_eq!(control, Control::Halt);
    assert_eq!(h.nuc.process_count(), 0);
}

#[test]
fn local_timer_with_no_current_process_is_a_panic() {
    let (mut h, first) = Harness::boot();
    let control = h.syscall(&first, SyscallCode::WaitForClock, [0, 0, 0]);
    assert_eq!(control, Control::Wait);

    let control = h.interrupt(None, param::PLT_LINE);
    assert!(matches!(control, Control::Panic(_)), "got {control:?}");
}
