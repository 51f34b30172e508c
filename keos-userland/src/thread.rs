//! # Thread lifecycle within a process: spawn, join, exit (C8).
//!
//! Additional user threads sharing one process's address space. Every
//! operation here takes a `&UserThread` for the calling kernel thread
//! instead of rediscovering it through `keos::thread::with_current`, since
//! the only callers are [`crate::syscall::dispatch`] and
//! [`crate::process::exit`], both of which already have one in hand.
//!
//! This module is deliberately not wired to any entry in [`crate::syscall`]'s
//! dispatch table: the closed 14-syscall set this crate exposes has no
//! `pthread_create`/`pthread_join`/`pthread_exit` entries, even though this
//! subsystem is fully specified and implemented. It exists to be called from
//! within the kernel (and from tests), not from user space.
use crate::{
    loader,
    mm::AddressSpace,
    pcb::{Pcb, UserThread},
    status::{JoinStatus, TID_ERROR},
};
use alloc::{boxed::Box, string::String, sync::Arc};
use keos::{KernelError, addressing::Va, mm::page_table::Permission, syscall::Registers, thread::{Current, ThreadBuilder, with_current}};

/// Spawn a new thread in `caller`'s process running `stub(func, arg)` in
/// user mode, blocking until it reports whether it started (§4.7.1).
///
/// Returns the new thread's tid, or `-1` on failure.
pub fn spawn(caller: &UserThread, stub: usize, func: usize, arg: usize) -> i64 {
    let join_status = JoinStatus::new();
    let pcb = caller.pcb.clone();
    let child_join_status = join_status.clone();

    ThreadBuilder::new(String::from("pthread")).spawn(move || start_thread(pcb, child_join_status, stub, func, arg));

    join_status.join_sema.wait();
    let tid = join_status.tid();
    if tid == TID_ERROR { -1 } else { tid as i64 }
}

/// The body of the kernel thread created by [`spawn`] (§4.7.2).
fn start_thread(pcb: Arc<Pcb>, join_status: Arc<JoinStatus>, stub: usize, func: usize, arg: usize) -> ! {
    let tid = Current::get_tid();

    let mut address_space = pcb.address_space.lock();
    address_space.activate();
    let built = allocate_stack_page(&mut address_space)
        .and_then(|stack_va| build_thread_stack(&mut address_space, stack_va, func, arg).map(|sp| (stack_va, sp)));
    address_space.unlock();

    match built {
        Ok((stack_va, sp)) => {
            join_status.set_tid(tid);
            pcb.register_thread(tid, join_status.clone());
            with_current(|th| {
                th.task = Some(Box::new(UserThread {
                    tid,
                    is_main: false,
                    pcb,
                    join_status,
                    stack_va: Some(stack_va),
                }));
            });
            join_status.join_sema.signal();

            let mut regs = Registers::new();
            *regs.rip() = stub;
            *regs.rsp() = sp.into_usize();
            regs.launch();
        }
        Err(_) => {
            join_status.join_sema.signal();
            Current::exit(-1);
        }
    }
}

/// Find a free page at the highest unused user address below the shared
/// stack region, scanning downward from [`loader::STACK_TOP`] (§4.7.2 step
/// 2), and install it read/write/user.
fn allocate_stack_page(address_space: &mut AddressSpace) -> Result<Va, KernelError> {
    let mut candidate = loader::STACK_TOP - 0x1000;
    loop {
        if candidate < 0x1000 {
            return Err(KernelError::NoMemory);
        }
        candidate -= 0x1000;
        let va = Va::new(candidate).ok_or(KernelError::NoMemory)?;
        match address_space.install(va, 0x1000, Permission::USER | Permission::READ | Permission::WRITE) {
            Ok(()) => return Ok(va),
            Err(_) => continue,
        }
    }
}

/// Lay out the new thread's initial user stack per §4.7.2 step 3: 8 bytes
/// of alignment padding, then `arg`, then `func`, then a zero fake return
/// address, each 4 bytes, so the stub sees `(func, arg)` just above its own
/// return address.
fn build_thread_stack(address_space: &mut AddressSpace, stack_va: Va, func: usize, arg: usize) -> Result<Va, KernelError> {
    let mut sp = stack_va.into_usize() + 0x1000 - 8;
    push32(address_space, &mut sp, arg as u32)?;
    push32(address_space, &mut sp, func as u32)?;
    push32(address_space, &mut sp, 0)?;
    Va::new(sp).ok_or(KernelError::InvalidArgument)
}

fn push32(address_space: &mut AddressSpace, sp: &mut usize, word: u32) -> Result<(), KernelError> {
    *sp -= 4;
    let va = Va::new(*sp).ok_or(KernelError::InvalidArgument)?;
    address_space.with_page_mut(va, |page, off| {
        page[off..off + 4].copy_from_slice(&word.to_ne_bytes())
    })?;
    Ok(())
}

/// Join the thread `tid` in `caller`'s process (§4.7.3).
///
/// Returns `tid` once it has terminated, or [`TID_ERROR`] as `i64` if `tid`
/// names no live, unjoined thread of this process.
pub fn join(caller: &UserThread, tid: u64) -> i64 {
    match caller.pcb.claim_join_status(tid) {
        None => TID_ERROR as i64,
        Some(js) => {
            js.join_sema.wait();
            tid as i64
        }
    }
}

/// Terminate the calling thread without touching the rest of its process
/// (§4.7.4): free its own stack page if it has one, leave the thread list,
/// wake any joiner, and possibly wake a sibling waiting out
/// [`Pcb::begin_exit`] if this was the last thread standing.
pub fn exit_current(thread: &UserThread) -> ! {
    if let Some(stack_va) = thread.stack_va {
        let mut address_space = thread.pcb.address_space.lock();
        let _ = address_space.free_page(stack_va);
        address_space.unlock();
    }
    thread.pcb.unregister_thread(thread.tid);
    thread.join_status.join_sema.signal();
    Current::exit(0);
}

/// The process's main thread explicitly calling thread-exit rather than
/// returning from `main` or calling `EXIT` (§4.7.5): join every other live
/// thread first, then run process-exit with status 0.
pub fn exit_main(thread: &UserThread) -> ! {
    while let Some(js) = thread.pcb.claim_any_other_join_status(thread.tid) {
        js.join_sema.wait();
    }
    crate::process::exit(thread, 0)
}
