//! # Rendezvous records: process-status (C3) and join-status (C4).
//!
//! Both types exist for the same reason: two threads that do not share a
//! lock-protected PCB yet (a parent and its not-yet-loaded child; a joiner
//! and the thread it is joining) still need to hand a single small piece of
//! data to each other exactly once. Each is a [`Semaphore`] plus the data it
//! guards, shared through an [`Arc`] so neither side has to outlive the
//! other.
//!
//! Memory reclamation itself is `Arc`'s ordinary drop-the-last-clone rule;
//! what [`ProcessStatus::release`] adds on top is the bookkeeping that only
//! the parent may ever unlink the record from its own child list, since that
//! list lives inside the parent's PCB and nothing else may touch it.
use crate::sync::Semaphore;
use alloc::sync::Arc;
use keos::sync::SpinLock;

/// Shared rendezvous between a parent and exactly one child.
///
/// Both sides hold an `Arc<ProcessStatus>`: the parent in its child list,
/// the child as its own PCB's `own_status`. Neither side frees the record
/// directly; it is freed whenever the last `Arc` clone is dropped, which
/// [`ProcessStatus::release`] arranges to happen once both sides are done
/// with it.
pub struct ProcessStatus {
    /// The child's pid once loaded, or `-1` while loading or on load failure.
    pid: SpinLock<i64>,
    /// The child's exit status, valid only after `wait_sema` is upped.
    exit_status: SpinLock<i32>,
    /// Upped exactly once by the child: on load failure, or on exit.
    pub wait_sema: Semaphore,
    /// Number of sides (parent, child) still holding a reference.
    ref_count: SpinLock<u8>,
}

impl ProcessStatus {
    /// Create a fresh record with both the parent's and child's reference
    /// already accounted for.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pid: SpinLock::new(-1),
            exit_status: SpinLock::new(0),
            wait_sema: Semaphore::new(0),
            ref_count: SpinLock::new(2),
        })
    }

    /// The child's pid, or `-1` if still loading or if load failed.
    pub fn pid(&self) -> i64 {
        let guard = self.pid.lock();
        let pid = *guard;
        guard.unlock();
        pid
    }

    /// Record the pid assigned on successful load.
    pub fn set_pid(&self, pid: i64) {
        let mut guard = self.pid.lock();
        *guard = pid;
        guard.unlock();
    }

    /// The exit status most recently recorded by [`Self::set_exit_status`].
    pub fn exit_status(&self) -> i32 {
        let guard = self.exit_status.lock();
        let status = *guard;
        guard.unlock();
        status
    }

    /// Record the exit status, to be observed by a parent waiting in
    /// [`Self::wait_sema`].
    pub fn set_exit_status(&self, status: i32) {
        let mut guard = self.exit_status.lock();
        *guard = status;
        guard.unlock();
    }

    /// Release this side's reference on the record.
    ///
    /// Decrements `ref_count` under its lock; if the count reaches zero and
    /// `is_parent` is true, the caller is also responsible for unlinking the
    /// record from the parent's child list (this only ever happens from the
    /// `wait` path, which already holds the list it is unlinking from).
    /// Actual deallocation is not this function's concern: it happens when
    /// the `Arc` passed in is dropped, by either side, whichever drops last.
    ///
    /// Returns whether the caller should unlink the record from the parent's
    /// child list.
    pub fn release(status: &Arc<Self>, is_parent: bool) -> bool {
        let mut guard = status.ref_count.lock();
        *guard -= 1;
        let hit_zero = *guard == 0;
        guard.unlock();
        hit_zero && is_parent
    }
}

/// Per-thread rendezvous record used by `thread_spawn`/`thread_join`.
///
/// `join_sema` is upped twice in sequence over the record's life: once by
/// the newly spawned thread to report whether it started successfully (and
/// with what tid), and once more, later, by that same thread as it exits, to
/// wake a joiner. At most one joiner may ever consume the second rendezvous;
/// [`JoinStatus::claim`] enforces that with `was_joined`.
pub struct JoinStatus {
    /// The spawned thread's kernel tid, valid after the first rendezvous.
    tid: SpinLock<u64>,
    /// Whether some joiner has already claimed the right to the second
    /// rendezvous.
    was_joined: SpinLock<bool>,
    /// Upped once on spawn completion, once more on thread exit.
    pub join_sema: Semaphore,
}

/// Sentinel recorded in a [`JoinStatus`] whose spawn failed, and returned by
/// `thread_spawn`/`thread_join` on failure. Real tids are always small,
/// monotonically increasing values starting at 0, so this is chosen well out
/// of their range rather than reusing 0, which the very first kernel thread
/// in the system legitimately holds.
pub const TID_ERROR: u64 = u64::MAX;

impl JoinStatus {
    /// Create a fresh record, not yet associated with a spawned thread.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tid: SpinLock::new(TID_ERROR),
            was_joined: SpinLock::new(false),
            join_sema: Semaphore::new(0),
        })
    }

    /// The spawned thread's tid, valid once the first rendezvous has
    /// completed.
    pub fn tid(&self) -> u64 {
        let guard = self.tid.lock();
        let tid = *guard;
        guard.unlock();
        tid
    }

    /// Record the spawned thread's tid, ahead of the first `join_sema.up()`.
    pub fn set_tid(&self, tid: u64) {
        let mut guard = self.tid.lock();
        *guard = tid;
        guard.unlock();
    }

    /// Attempt to claim the right to the second rendezvous (i.e. to be the
    /// one joiner that blocks on thread termination and frees the record).
    ///
    /// Returns `true` exactly once per record; every later call (concurrent
    /// or sequential) returns `false`.
    pub fn claim(&self) -> bool {
        let mut guard = self.was_joined.lock();
        let first = !*guard;
        *guard = true;
        guard.unlock();
        first
    }
}
