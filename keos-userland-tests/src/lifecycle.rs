//! Process-lifecycle bookkeeping that doesn't require a loaded ELF: the
//! parent/child rendezvous ([`ProcessStatus`]), `wait`'s one-shot contract,
//! and [`JoinStatus`]'s exclusive claim.
use keos::thread::ThreadBuilder;
use keos_userland::{UserThread, process, status::JoinStatus, status::ProcessStatus};

pub fn process_status_rendezvous() {
    let status = ProcessStatus::new();
    let child = status.clone();

    ThreadBuilder::new("child").spawn(move || {
        for _ in 0..10_000 {
            core::hint::spin_loop();
        }
        child.set_pid(42);
        child.wait_sema.signal();
    });

    status.wait_sema.wait();
    assert_eq!(status.pid(), 42);
}

pub fn wait_on_unknown_pid_fails() {
    let thread = UserThread::default();
    assert_eq!(process::wait(&thread.pcb, 999), -1);
}

pub fn wait_is_not_repeatable() {
    let thread = UserThread::default();
    let child_status = ProcessStatus::new();
    child_status.set_pid(7);
    child_status.set_exit_status(5);
    child_status.wait_sema.signal();
    thread.pcb.add_child(child_status);

    assert_eq!(process::wait(&thread.pcb, 7), 5);
    assert_eq!(
        process::wait(&thread.pcb, 7),
        -1,
        "a second wait on an already-reaped pid must fail"
    );
}

pub fn join_status_claim_is_exclusive() {
    let js = JoinStatus::new();
    assert!(js.claim());
    assert!(!js.claim(), "a join-status record may be claimed only once");
}

/// Reproduces the scenario `exit_main` relies on: once a join-status record
/// has been claimed (as `thread::join` does), it must be unlinked from the
/// process's join list, not merely marked claimed. Otherwise a later
/// `claim_any_other_join_status` scan finds the same already-claimed record
/// forever and never makes progress.
pub fn claiming_a_join_status_unlinks_it() {
    let thread = UserThread::default();
    let other = JoinStatus::new();
    other.set_tid(thread.tid + 1);
    thread.pcb.register_thread(other.tid(), other.clone());

    let claimed = thread
        .pcb
        .claim_join_status(other.tid())
        .expect("freshly registered join-status must be claimable");
    assert_eq!(claimed.tid(), other.tid());

    // If the record were left in the list, this would hand back the same
    // already-claimed record and `exit_main`'s loop would spin forever.
    assert!(
        thread.pcb.claim_any_other_join_status(thread.tid).is_none(),
        "a claimed join-status record must be unlinked, not merely marked"
    );
}
