//! Syscall-dispatch-level tests: drive `syscall::dispatch` itself with a
//! forged register frame, the way a real `syscall` trap would, rather than
//! calling the underlying `file_struct`/`process` operations directly. This
//! is the only level at which the return-value convention each syscall is
//! supposed to honor (§4.8's literal sentinels, pintos boolean success) is
//! actually observable.
use alloc::{boxed::Box, string::String};
use keos::{addressing::Va, mm::page_table::Permission, syscall::Registers, thread::with_current};
use keos_userland::{
    mm::AddressSpace,
    pcb::{Pcb, UserThread},
    status::{JoinStatus, ProcessStatus},
    syscall,
};

const CREATE: usize = 5;
const REMOVE: usize = 6;

/// Build a process with one mapped, writable user page at `va`, containing
/// `path` as a NUL-terminated C string, and install it as the current
/// thread's task so `UserCString`/friends can validate against it.
///
/// Returns a second handle to the same process, for the caller to pass
/// directly to `syscall::dispatch`.
fn process_with_path_at(va: Va, path: &str) -> UserThread {
    let mut address_space = AddressSpace::new();
    address_space
        .install(va, 0x1000, Permission::USER | Permission::READ | Permission::WRITE)
        .expect("failed to install a single user page");
    address_space.activate();

    let mut bytes = alloc::vec::Vec::with_capacity(path.len() + 1);
    bytes.extend_from_slice(path.as_bytes());
    bytes.push(0);
    address_space
        .with_page_mut(va, |page, off| page[off..off + bytes.len()].copy_from_slice(&bytes))
        .expect("path must fit within the installed page");

    let tid = keos::thread::Current::get_tid();
    let own_status = ProcessStatus::new();
    let join_status = JoinStatus::new();
    join_status.set_tid(tid);
    let pcb = Pcb::new(String::from("dispatch-test"), address_space, own_status, tid, join_status.clone());

    with_current(|th| {
        th.task = Some(Box::new(UserThread {
            tid,
            is_main: true,
            pcb: pcb.clone(),
            join_status: join_status.clone(),
            stack_va: None,
        }));
    });

    UserThread {
        tid,
        is_main: true,
        pcb,
        join_status,
        stack_va: None,
    }
}

pub fn create_reports_success_as_nonzero() {
    let path_va = Va::new(0x1000).unwrap();
    let mut thread = process_with_path_at(path_va, "dispatch-create-test");

    let mut regs = Registers::new();
    regs.gprs.rax = CREATE;
    regs.gprs.rdi = path_va.into_usize();
    syscall::dispatch(&mut thread, &mut regs);

    assert_eq!(
        regs.gprs.rax, 1,
        "a successful CREATE must report success as a nonzero value, not 0"
    );
}

pub fn remove_reports_success_as_nonzero() {
    let path_va = Va::new(0x1000).unwrap();
    let mut thread = process_with_path_at(path_va, "dispatch-remove-test");

    let mut create_regs = Registers::new();
    create_regs.gprs.rax = CREATE;
    create_regs.gprs.rdi = path_va.into_usize();
    syscall::dispatch(&mut thread, &mut create_regs);
    assert_eq!(create_regs.gprs.rax, 1);

    let mut remove_regs = Registers::new();
    remove_regs.gprs.rax = REMOVE;
    remove_regs.gprs.rdi = path_va.into_usize();
    syscall::dispatch(&mut thread, &mut remove_regs);

    assert_eq!(
        remove_regs.gprs.rax, 1,
        "a successful REMOVE must report success as a nonzero value, not 0"
    );
}
