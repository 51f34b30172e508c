//! A counting semaphore, built from [`Mutex`] and [`ConditionVariable`].
//!
//! Every blocking rendezvous in this crate — a parent waiting for its
//! child's load to finish, a joiner waiting for a thread to terminate, a
//! spawner waiting for a start routine to report its outcome — is this type
//! started at zero permits, with one [`Self::signal`] marking exactly one
//! occurrence of the event `wait` is waiting for. Unlike a lock, a permit
//! carries no payload to give back: `wait` simply blocks until the count is
//! positive, then consumes one.
use super::{ConditionVariable, Mutex};

/// A counting semaphore with `permits` starting at some non-negative count.
pub struct Semaphore {
    count: Mutex<usize>,
    cond: ConditionVariable,
}

impl Semaphore {
    /// Create a semaphore starting with `permits` available permits.
    pub const fn new(permits: usize) -> Self {
        Self {
            count: Mutex::new(permits),
            cond: ConditionVariable::new(),
        }
    }

    /// Block until a permit is available, then consume it.
    pub fn wait(&self) {
        let mut guard = self.cond.wait_while(&self.count, |c| *c == 0);
        *guard -= 1;
        guard.unlock();
    }

    /// Make one more permit available, waking one blocked waiter if any.
    pub fn signal(&self) {
        let mut guard = self.count.lock();
        *guard += 1;
        self.cond.signal(guard);
    }
}
