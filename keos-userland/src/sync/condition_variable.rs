//! A condition variable, always paired with a [`Mutex`].
use super::{Mutex, MutexGuard};
use alloc::collections::VecDeque;
use keos::sync::SpinLock;
use keos::thread::{Current, ParkHandle};

/// A condition variable.
///
/// Unlike a [`super::Semaphore`], a condition variable carries no state of
/// its own: every wait re-checks a caller-supplied predicate against the
/// data guarded by the paired [`Mutex`], so spurious wakeups are harmless.
pub struct ConditionVariable {
    waiters: SpinLock<VecDeque<ParkHandle>>,
}

impl ConditionVariable {
    /// Create a new condition variable with no waiters.
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    /// Block the current thread until `predicate` returns `false`,
    /// re-acquiring `mutex` each time it wakes to re-check it.
    ///
    /// The mutex must not be held by the caller already.
    pub fn wait_while<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        predicate: impl Fn(&mut T) -> bool,
    ) -> MutexGuard<'a, T> {
        let mut guard = mutex.lock();
        while predicate(&mut guard) {
            guard.unlock();
            Current::park_with(|park| {
                let mut waiters = self.waiters.lock();
                waiters.push_back(park);
                waiters.unlock();
            });
            guard = mutex.lock();
        }
        guard
    }

    /// Wake one thread blocked in [`Self::wait_while`], releasing `guard`.
    pub fn signal<T>(&self, guard: MutexGuard<'_, T>) {
        guard.unlock();
        let mut waiters = self.waiters.lock();
        let woken = waiters.pop_front();
        waiters.unlock();
        if let Some(w) = woken {
            w.unpark();
        }
    }

    /// Wake every thread blocked in [`Self::wait_while`], releasing `guard`.
    pub fn broadcast<T>(&self, guard: MutexGuard<'_, T>) {
        guard.unlock();
        let mut waiters = self.waiters.lock();
        let woken: VecDeque<ParkHandle> = waiters.drain(..).collect();
        waiters.unlock();
        for w in woken {
            w.unpark();
        }
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}
