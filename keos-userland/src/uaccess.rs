//! # User memory validation.
//!
//! Every system call argument that is a pointer into user space must be
//! validated before the kernel dereferences it: a malicious or buggy user
//! program can pass any integer as a "pointer," including addresses that
//! fall in kernel space or are simply unmapped.
//!
//! [`keos::syscall::uaccess`] already provides one-shot, TOCTOU-safe
//! accessors that check [`Task::access_ok`] before touching the address and
//! fail with [`KernelError::BadAddress`] otherwise: [`UserPtrRO`],
//! [`UserPtrWO`], [`UserU8SliceRO`], [`UserU8SliceWO`], [`UserCString`].
//! This crate re-exports them as-is rather than re-deriving the same
//! validate-then-access logic.
//!
//! Unlike a syscall that fails with a normal negative return value, a bad
//! pointer anywhere in a syscall's arguments is fatal to the whole process:
//! [`crate::syscall::dispatch`] maps any [`KernelError::BadAddress`] surfaced
//! while decoding arguments to an immediate `exit(-1)`, matching the
//! observable behavior of a segfaulting user program.
///
/// [`Task::access_ok`]: keos::task::Task::access_ok
pub use keos::syscall::uaccess::{UserCString, UserPtrRO, UserPtrWO, UserU8SliceRO, UserU8SliceWO};
