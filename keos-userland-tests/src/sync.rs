//! Rendezvous ordering for [`keos_userland::sync::Semaphore`], in the same
//! busy-wait style the course projects' own `grader/src/sync.rs` uses for
//! mutex/condition-variable tests: no disk or loaded process needed.
use alloc::sync::Arc;
use keos::sync::atomic::{AtomicBool, AtomicUsize};
use keos::thread::ThreadBuilder;
use keos_userland::sync::Semaphore;

pub fn semaphore_orders_wait_after_signal() {
    let sema = Arc::new(Semaphore::new(0));
    let flag = Arc::new(AtomicBool::new(false));

    {
        let sema = sema.clone();
        let flag = flag.clone();
        ThreadBuilder::new("signaler").spawn(move || {
            for _ in 0..10_000 {
                core::hint::spin_loop();
            }
            flag.store(true);
            sema.signal();
        });
    }

    sema.wait();
    assert!(flag.load(), "wait() returned before its matching signal()");
}

pub fn semaphore_wakes_one_waiter() {
    let sema = Arc::new(Semaphore::new(0));
    let woken = Arc::new(AtomicUsize::new(0));

    let handles: alloc::vec::Vec<_> = (0..2)
        .map(|_| {
            let sema = sema.clone();
            let woken = woken.clone();
            ThreadBuilder::new("waiter").spawn(move || {
                sema.wait();
                woken.fetch_add(1);
            })
        })
        .collect();

    for _ in 0..50_000 {
        core::hint::spin_loop();
    }
    sema.signal();
    while woken.load() < 1 {
        core::hint::spin_loop();
    }
    assert_eq!(woken.load(), 1, "one signal() must wake exactly one waiter");

    sema.signal();
    for h in handles {
        h.join();
    }
    assert_eq!(woken.load(), 2);
}
