//! # Synchronization Primitives.
//!
//! The process and thread lifecycle machinery in this crate blocks in several
//! places: a parent waiting on a child's load, a joiner waiting on a thread's
//! termination, an exiting thread waiting for its siblings to finish. None of
//! these waits are appropriate for a busy-spinning [`SpinLock`]: they may take
//! an arbitrarily long time (a file read, a user program running to
//! completion), so the waiting thread should sleep instead of burning CPU.
//!
//! This module builds three such sleeping primitives on top of
//! [`SpinLock`] and the scheduler's park/unpark handles:
//!
//! - [`Mutex`]: mutual exclusion with an explicit `.unlock()`.
//! - [`ConditionVariable`]: wait-for-predicate, always paired with a [`Mutex`].
//! - [`Semaphore`]: a counting primitive built from the two above, used for
//!   every rendezvous in this crate (process-status, join-status).
//!
//! | Primitive             | Blocks thread? | Typical use here                         |
//! |-----------------------|----------------|-------------------------------------------|
//! | [`SpinLock`]          | No (busy wait) | Protecting the few words in a status record|
//! | [`Mutex`]             | Yes            | A PCB's master lock                        |
//! | [`ConditionVariable`] | Yes            | "Last thread standing" at process exit     |
//! | [`Semaphore`]         | Yes            | wait/join rendezvous                       |
//!
//! [`SpinLock`]: keos::sync::SpinLock

pub mod condition_variable;
pub mod mutex;
pub mod semaphore;

pub use condition_variable::*;
pub use mutex::*;
pub use semaphore::*;
