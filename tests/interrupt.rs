use std::sync::atomic::{AtomicUsize, Ordering::*};
use std::thread;
use std::time::Duration;

use easy_parallel::Parallel;

use blocking_queue::{BlockingQueue, Interrupt, PutError, TakeError};

const SETTLE: Duration = Duration::from_millis(100);

#[test]
fn interrupt_blocked_take() {
    let q = BlockingQueue::<u32>::new(2);
    let stop = Interrupt::new();

    let (results, ()) = Parallel::new()
        .add(|| q.take_interruptible(&stop))
        .finish(|| {
            thread::sleep(SETTLE);
            stop.interrupt();
        });

    assert_eq!(results, vec![Err(TakeError::Interrupted)]);
    assert!(q.is_empty());
}

#[test]
fn interrupt_blocked_put() {
    let q = BlockingQueue::new(2);
    let stop = Interrupt::new();

    q.put(1).unwrap();
    q.put(2).unwrap();

    let (results, ()) = Parallel::new()
        .add(|| q.put_interruptible(3, &stop))
        .finish(|| {
            thread::sleep(SETTLE);
            stop.interrupt();
        });

    assert_eq!(results, vec![Err(PutError::Interrupted(3))]);
    assert_eq!(q.len(), 2);
    assert_eq!(q.take(), Ok(1));
    assert_eq!(q.take(), Ok(2));
    assert!(q.is_empty());
}

#[test]
fn rejected_value_is_returned() {
    let q = BlockingQueue::new(1);
    let stop = Interrupt::new();
    stop.interrupt();

    q.put(String::from("first")).unwrap();

    let err = q
        .put_interruptible(String::from("second"), &stop)
        .unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(err.into_inner(), "second");
}

#[test]
fn fired_token_only_matters_when_blocking() {
    let q = BlockingQueue::new(1);
    let stop = Interrupt::new();
    stop.interrupt();

    q.put_interruptible(1, &stop).unwrap();
    assert_eq!(
        q.put_interruptible(2, &stop),
        Err(PutError::Interrupted(2))
    );

    assert_eq!(q.take_interruptible(&stop), Ok(1));
    assert_eq!(q.take_interruptible(&stop), Err(TakeError::Interrupted));
}

#[test]
fn uninterrupted_calls_complete() {
    let q = BlockingQueue::new(1);
    let stop = Interrupt::new();

    let (results, ()) = Parallel::new()
        .add(|| q.take_interruptible(&stop))
        .finish(|| {
            thread::sleep(SETTLE);
            q.put_interruptible(5, &stop).unwrap();
        });

    assert_eq!(results, vec![Ok(5)]);
    assert!(!stop.is_interrupted());
}

#[test]
fn one_token_stops_every_waiter() {
    const WAITERS: usize = 4;

    let full = BlockingQueue::new(1);
    let empty = BlockingQueue::<usize>::new(1);
    let stop = Interrupt::new();

    full.put(0).unwrap();

    let (puts, takes) = Parallel::new()
        .each(0..WAITERS, |i| full.put_interruptible(i + 1, &stop))
        .finish(|| {
            let (takes, ()) = Parallel::new()
                .each(0..WAITERS, |_| empty.take_interruptible(&stop))
                .finish(|| {
                    thread::sleep(SETTLE);
                    stop.interrupt();
                });
            takes
        });

    assert!(puts.iter().all(|r| r.as_ref().is_err_and(|e| e.is_interrupted())));
    assert!(takes.iter().all(|r| *r == Err(TakeError::Interrupted)));
    assert_eq!(full.len(), 1);
    assert!(empty.is_empty());
}

#[test]
fn token_is_not_tied_to_one_queue() {
    let a = BlockingQueue::<u8>::new(1);
    let b = BlockingQueue::<u8>::new(1);
    let stop = Interrupt::new();

    let (results, ()) = Parallel::new()
        .add(|| a.take_interruptible(&stop))
        .add(|| b.take_interruptible(&stop))
        .finish(|| {
            thread::sleep(SETTLE);
            stop.interrupt();
        });

    assert_eq!(results, vec![Err(TakeError::Interrupted); 2]);
}

#[test]
fn interrupt_keeps_accounting_exact() {
    const RUNS: usize = if cfg!(miri) { 5 } else { 50 };
    const THREADS: usize = 3;

    for _ in 0..RUNS {
        let q = BlockingQueue::new(2);
        let stop = Interrupt::new();
        let produced = AtomicUsize::new(0);
        let consumed = AtomicUsize::new(0);

        Parallel::new()
            .each(0..THREADS, |_| {
                let mut i = 0;
                while !stop.is_interrupted() && q.put_interruptible(i, &stop).is_ok() {
                    produced.fetch_add(1, SeqCst);
                    i += 1;
                }
            })
            .each(0..THREADS, |_| {
                while !stop.is_interrupted() && q.take_interruptible(&stop).is_ok() {
                    consumed.fetch_add(1, SeqCst);
                }
            })
            .finish(|| {
                thread::sleep(Duration::from_millis(fastrand::u64(1..20)));
                stop.interrupt();
            });

        let left = q.len();
        assert!(left <= 2);
        assert_eq!(produced.load(SeqCst), consumed.load(SeqCst) + left);
    }
}
