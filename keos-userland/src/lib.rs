//! # Userland: process and thread lifecycle for KeOS
//!
//! This crate is the userland subsystem of a small educational kernel:
//! starting and tearing down processes, spawning and joining threads within
//! a process, validating every pointer a system call receives before the
//! kernel touches it, and dispatching the closed set of system calls user
//! programs may invoke.
//!
//! ## Modifiable files
//!
//! Unlike `keos-project1`/`keos-project4`, this crate does not ship as a set
//! of course-project stubs with a handful of files left for students to
//! fill in — every module here is a complete implementation.
//!
//! ## Module outline
//!
//! - [`uaccess`]: validated user-pointer accessors (C1).
//! - [`file_struct`]: per-process file descriptor table (C2).
//! - [`status`]: process-status and join-status rendezvous records (C3, C4).
//! - [`mm`], [`page_table`]: per-process address space (part of C5).
//! - [`pcb`]: the process control block and the [`Task`] attached to every
//!   user thread (C5).
//! - [`loader`]: ELF loading and argument packing (C6).
//! - [`process`]: process lifecycle — exec, wait, exit (C7).
//! - [`thread`]: thread lifecycle within a process — spawn, join, exit (C8).
//! - [`syscall`], [`syscall_abi`]: system call dispatch (C9).
//!
//! [`Task`]: keos::task::Task
#![no_std]
#![no_main]
#![deny(rustdoc::broken_intra_doc_links)]

extern crate alloc;
#[allow(unused_imports)]
#[macro_use]
extern crate keos;

pub mod file_struct;
pub mod loader;
pub mod mm;
pub mod page_table;
pub mod pcb;
pub mod process;
pub mod status;
pub mod sync;
pub mod syscall;
pub mod syscall_abi;
pub mod thread;
pub mod uaccess;

pub use pcb::UserThread;
