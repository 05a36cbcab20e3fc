//! SYS2: recursive teardown of whole process subtrees.

mod common;

use common::{Harness, expect_load};

use opandos_kernel::device_sem_addr;
use opandos_kernel_params as param;
use opandos_machine::Control;
use opandos_types::SyscallCode;

#[test]
fn create_fails_cleanly_when_the_pool_is_empty() {
    let (mut h, mut running) = Harness::boot();

    // fill the table: the first process plus MAX_PROC - 1 children
    for slot in 0..param::MAX_PROC - 1 {
        running = h.create_child(&running, slot);
    }
    assert_eq!(h.nuc.process_count(), param::MAX_PROC);
    assert_eq!(h.nuc.free_pcbs(), 0);

    // one more returns -1 and changes nothing
    let staged = h.stage_state(param::MAX_PROC);
    let control = h.syscall(&running, SyscallCode::CreateProcess, [staged.addr(), 0, 0]);
    let resumed = expect_load(control);
    assert_eq!(resumed.v0() as i32, -1);
    assert_eq!(h.nuc.process_count(), param::MAX_PROC);
    assert_eq!(h.nuc.ready_count(), param::MAX_PROC - 1);
}

#[test]
fn terminating_the_root_reclaims_everything() {
    let (mut h, parent) = Harness::boot();
    let descriptors_idle = h.nuc.free_sem_descriptors();
    let sem_a = h.user_sem(0);
    let sem_b = h.user_sem(1);
    let sem_c = h.user_sem(2);

    // root spawns c1 and blocks on sem_a
    let parent = h.create_child(&parent, 0);
    let c1 = expect_load(h.syscall(&parent, SyscallCode::Passeren, [sem_a.addr(), 0, 0]));

    // c1 spawns c2, c3 and a grandchild of its own, then blocks on sem_b
    let c1 = h.create_child(&c1, 1);
    let c1 = h.create_child(&c1, 2);
    let c1 = h.create_child(&c1, 3);
    let c2 = expect_load(h.syscall(&c1, SyscallCode::Passeren, [sem_b.addr(), 0, 0]));

    // c2 waits on the pseudo-clock
    let c3 = expect_load(h.syscall(&c2, SyscallCode::WaitForClock, [0, 0, 0]));

    // c3 releases the root, then blocks on sem_c
    let c3 = expect_load(h.syscall(&c3, SyscallCode::Verhogen, [sem_a.addr(), 0, 0]));
    let grandchild = expect_load(h.syscall(&c3, SyscallCode::Passeren, [sem_c.addr(), 0, 0]));

    // the grandchild joins c1 on sem_b; the root is the only runnable left
    let root = expect_load(h.syscall(&grandchild, SyscallCode::Passeren, [sem_b.addr(), 0, 0]));

    assert_eq!(h.nuc.process_count(), 5);
    assert_eq!(h.nuc.soft_blocked_count(), 1);
    assert_eq!(h.sem_value(sem_b), -2);

    // one SYS2 takes the whole family with it
    let control = h.syscall(&root, SyscallCode::TerminateProcess, [0, 0, 0]);
    assert_eq!(control, Control::Halt);

    assert_eq!(h.nuc.process_count(), 0);
    assert_eq!(h.nuc.soft_blocked_count(), 0);
    assert_eq!(h.nuc.free_pcbs(), param::MAX_PROC);
    assert_eq!(h.nuc.free_sem_descriptors(), descriptors_idle);

    // terminated waiters on process semaphores hand back their missing V
    assert_eq!(h.sem_value(sem_b), 0);
    assert_eq!(h.sem_value(sem_c), 0);
    // the pseudo-clock semaphore is signalling, not counting: untouched
    assert_eq!(h.sem_value(device_sem_addr(param::CLOCK_SEM)), -1);
}

#[test]
fn terminating_a_blocked_child_restores_the_semaphore() {
    let (mut h, parent) = Harness::boot();
    let sem = h.user_sem(0);

    let parent = h.create_child(&parent, 0);
    let parent_pid = h.nuc.current().unwrap();

    // rotate: child blocks on the semaphore, parent runs again
    let child = expect_load(h.expire_slice(&parent));
    let parent_back = expect_load(h.syscall(&child, SyscallCode::Passeren, [sem.addr(), 0, 0]));
    assert_eq!(h.nuc.current(), Some(parent_pid));
    assert_eq!(h.sem_value(sem), -1);

    let control = h.syscall(&parent_back, SyscallCode::TerminateProcess, [0, 0, 0]);
    assert_eq!(control, Control::Halt);
    // the child's missing V came back with its termination
    assert_eq!(h.sem_value(sem), 0);
    assert_eq!(h.nuc.blocked_head(sem), None);
}

#[test]
fn terminating_a_ready_child_removes_it_from_the_queue() {
    let (mut h, parent) = Harness::boot();
    let parent = h.create_child(&parent, 0);
    assert_eq!(h.nuc.ready_count(), 1);

    let control = h.syscall(&parent, SyscallCode::TerminateProcess, [0, 0, 0]);
    assert_eq!(control, Control::Halt);
    assert_eq!(h.nuc.ready_count(), 0);
    assert_eq!(h.nuc.free_pcbs(), param::MAX_PROC);
}

#[test]
fn termination_of_a_soft_blocked_child_fixes_the_count() {
    let (mut h, parent) = Harness::boot();

    let parent = h.create_child(&parent, 0);
    let child = expect_load(h.expire_slice(&parent));
    let parent_back = expect_load(h.syscall(&child, SyscallCode::WaitForClock, [0, 0, 0]));
    assert_eq!(h.nuc.soft_blocked_count(), 1);

    let control = h.syscall(&parent_back, SyscallCode::TerminateProcess, [0, 0, 0]);
    assert_eq!(control, Control::Halt);
    assert_eq!(h.nuc.soft_blocked_count(), 0);
}
