//! A sleeping mutual-exclusion lock.
use alloc::collections::VecDeque;
use core::ops::{Deref, DerefMut};
use keos::sync::{SpinLock, SpinLockGuard};
use keos::thread::{Current, ParkHandle};

/// A mutex that parks waiting threads instead of spinning.
///
/// Every blocking wait in this crate (a parent waiting on a child's status,
/// a joiner waiting on a thread) is eventually built from this type plus
/// [`super::ConditionVariable`] and [`super::Semaphore`].
pub struct Mutex<T> {
    t: SpinLock<T>,
    waiters: SpinLock<VecDeque<ParkHandle>>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create a new, unlocked mutex wrapping `t`.
    pub const fn new(t: T) -> Self {
        Self {
            t: SpinLock::new(t),
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    /// Acquire the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            if let Ok(guard) = self.t.try_lock() {
                return MutexGuard {
                    guard: Some(guard),
                    lock: self,
                };
            }
            Current::park_with(|park| {
                let mut waiters = self.waiters.lock();
                waiters.push_back(park);
                waiters.unlock();
            });
        }
    }

    /// Attempt to acquire the lock without blocking.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, keos::sync::WouldBlock> {
        self.t.try_lock().map(|guard| MutexGuard {
            guard: Some(guard),
            lock: self,
        })
    }

    /// Consume the mutex, returning the wrapped value.
    pub fn into_inner(self) -> T {
        self.t.into_inner()
    }

    fn wake_one(&self) {
        let mut waiters = self.waiters.lock();
        let woken = waiters.pop_front();
        waiters.unlock();
        if let Some(w) = woken {
            w.unpark();
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// RAII guard returned by [`Mutex::lock`]. Must be released with
/// [`MutexGuard::unlock`]; dropping it bare is a bug and panics.
pub struct MutexGuard<'a, T> {
    guard: Option<SpinLockGuard<'a, T>>,
    lock: &'a Mutex<T>,
}

impl<T> !Send for MutexGuard<'_, T> {}
unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T> MutexGuard<'a, T> {
    /// Release the lock, waking one waiter if any is parked.
    pub fn unlock(mut self) {
        let guard = self.guard.take().unwrap();
        guard.unlock();
        let lock = self.lock;
        core::mem::forget(self);
        lock.wake_one();
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.guard.as_ref().unwrap()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().unwrap()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        panic!("`.unlock()` must be explicitly called for MutexGuard.");
    }
}
