//! # Process lifecycle: exec, wait, exit (C7).
//!
//! `exec` and `wait` are rendezvous protocols built on [`ProcessStatus`];
//! `exit` is the teardown sequence that every process thread eventually
//! reaches, either directly (the thread that calls it) or indirectly
//! (a sibling thread waiting out `exit_cond`, see [`Pcb::begin_exit`]).
//!
//! The "child loads inside its own kernel thread, then publishes its PCB"
//! staging this mirrors doesn't fit `keos::thread::ThreadBuilder` the way
//! the teacher's `Process`/`attach_task` construction did: `attach_task`
//! has to run before `spawn`, before the child thread has run a single
//! instruction, so there is no PCB yet to attach. Instead the spawned
//! thread starts with no task at all — which, conveniently, is exactly the
//! "null address space" state §4.4 asks for while a PCB isn't published yet,
//! since a taskless thread's context switches fall back to the kernel-only
//! directory (see [`crate::pcb`]) — and calls [`keos::thread::with_current`]
//! to attach its own [`UserThread`] once the loader has finished, right
//! before jumping to user mode. There is never a window where a task is
//! attached but its address space is not yet ready.
use crate::{
    loader,
    pcb::{Pcb, UserThread},
    status::{JoinStatus, ProcessStatus},
};
use alloc::{boxed::Box, string::String, sync::Arc};
use keos::thread::{Current, ThreadBuilder, with_current};

/// The program-name token: the prefix of `cmdline` up to its first space.
fn program_name(cmdline: &str) -> &str {
    cmdline.split(' ').next().filter(|s| !s.is_empty()).unwrap_or(cmdline)
}

/// The first 15 bytes of `name`, per the console-exit-line contract (§6).
///
/// Splits on a byte boundary, not a `char` boundary: a name is an opaque
/// program-name token, not necessarily UTF-8-safe to cut anywhere, so this
/// falls back to the nearest preceding boundary rather than panicking.
fn truncated_name(name: &str) -> &str {
    let mut end = name.len().min(15);
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Start a new process running `cmdline`, blocking until it has either
/// loaded successfully or failed (§4.6.1).
///
/// Returns the child's pid, or `-1` if the load failed.
pub fn execute(caller: &Pcb, cmdline: &str) -> i64 {
    let status = ProcessStatus::new();
    let cmd = String::from(cmdline);
    let child_status = status.clone();

    ThreadBuilder::new(String::from(program_name(cmdline))).spawn(move || start_process(cmd, child_status));

    status.wait_sema.wait();

    let pid = status.pid();
    if pid == -1 {
        -1
    } else {
        caller.add_child(status);
        pid
    }
}

/// The body of the kernel thread created by [`execute`] (§4.6.2).
fn start_process(cmdline: String, status: Arc<ProcessStatus>) -> ! {
    let tid = Current::get_tid();
    match loader::load(&cmdline) {
        Ok(loaded) => {
            let join_status = JoinStatus::new();
            join_status.set_tid(tid);
            let pcb = Pcb::new(
                String::from(program_name(&cmdline)),
                loaded.address_space,
                status.clone(),
                tid,
                join_status.clone(),
            );
            let mut exec_file = pcb.exec_file.lock();
            *exec_file = Some(loaded.exec_file);
            exec_file.unlock();

            status.set_pid(tid as i64);
            with_current(|th| {
                th.task = Some(Box::new(UserThread {
                    tid,
                    is_main: true,
                    pcb,
                    join_status,
                    stack_va: None,
                }));
            });
            status.wait_sema.signal();

            loaded.regs.launch();
        }
        Err(e) => {
            keos::warning!("load failed for {:?}: {:?}", program_name(&cmdline), e);
            status.set_pid(-1);
            status.wait_sema.signal();
            Current::exit(-1);
        }
    }
}

/// Wait for the child process `pid` to exit, returning its exit status
/// (§4.6.3).
///
/// Returns `-1` if `pid` is not a live or not-yet-reaped child of `caller`.
pub fn wait(caller: &Pcb, pid: i64) -> i32 {
    let Some(status) = caller.take_child(pid) else {
        return -1;
    };
    status.wait_sema.wait();
    let exit_status = status.exit_status();
    ProcessStatus::release(&status, true);
    exit_status
}

/// Tear down `thread`'s process and terminate the calling thread (§4.6.4).
///
/// Every [`UserThread`] this crate ever attaches carries a [`Pcb`] from the
/// moment it is created (a thread with a failed load never runs user code
/// and never reaches a syscall, so it never reaches this function); the
/// "thread has no PCB" case of step 1 therefore never arises on this path,
/// unlike the kernel this is modeled on, where `thread_exit` is also the
/// generic kernel-thread-teardown entry point.
///
/// If some other thread of the same process already began this teardown,
/// `thread` instead just runs its own per-thread exit (§4.7.4) and this
/// function does not return either way.
pub fn exit(thread: &UserThread, status: i32) -> ! {
    let pcb = &thread.pcb;

    if !pcb.begin_exit() {
        crate::thread::exit_current(thread);
    }

    drop(pcb.take_join_statuses());

    for child_status in pcb.take_children() {
        ProcessStatus::release(&child_status, true);
    }

    {
        let mut file_struct = pcb.file_struct.lock();
        file_struct.close_all();
        file_struct.unlock();
    }

    {
        let mut exec_file = pcb.exec_file.lock();
        let _ = crate::pcb::close_exec_file(&mut exec_file);
        exec_file.unlock();
    }

    pcb.own_status.set_exit_status(status);
    pcb.own_status.wait_sema.signal();
    ProcessStatus::release(&pcb.own_status, false);

    keos::println!("{}: exit({})", truncated_name(&pcb.name), status);

    Current::exit(status);
}
