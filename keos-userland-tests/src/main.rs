//! Test driver for `keos-userland`.
//!
//! This is test & bootstrap implementation, in the same spirit as the course
//! projects' own `grader` crates: it boots the kernel, optionally mounts a
//! disk-backed filesystem, and runs a fixed list of tests through
//! [`keos::TestDriver`].
#![no_std]
#![no_main]
#![allow(clippy::missing_safety_doc)]

extern crate alloc;
extern crate keos;
extern crate keos_userland;

mod dispatch;
mod file_struct;
mod lifecycle;
mod sync;

use keos::SystemConfigurationBuilder;
use keos_userland::pcb::UserThread;

#[unsafe(no_mangle)]
pub unsafe fn main(_config_builder: SystemConfigurationBuilder) {
    if let Ok(fs) = simple_fs::FileSystem::load(1) {
        keos::info!("Filesystem: use `SimpleFS`.");
        keos::fs::FileSystem::register(fs)
    }

    keos::TestDriver::<UserThread>::start([
        &sync::semaphore_orders_wait_after_signal,
        &sync::semaphore_wakes_one_waiter,
        &lifecycle::process_status_rendezvous,
        &lifecycle::wait_on_unknown_pid_fails,
        &lifecycle::wait_is_not_repeatable,
        &lifecycle::join_status_claim_is_exclusive,
        &lifecycle::claiming_a_join_status_unlinks_it,
        &file_struct::stdio_descriptors_are_preinstalled,
        &file_struct::descriptor_numbers_never_repeat,
        &file_struct::too_many_open_files_is_rejected,
        &file_struct::close_and_seek_on_unknown_fd_are_silent_no_ops,
        &dispatch::create_reports_success_as_nonzero,
        &dispatch::remove_reports_success_as_nonzero,
    ]);
}

#[unsafe(no_mangle)]
pub unsafe fn ap_main() {}
