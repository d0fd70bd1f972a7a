//! Cooperative cancellation for blocked queue calls.

use std::fmt;
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::*;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::Waker;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Interrupted;

/// A shareable cancellation token.
///
/// Firing the token wakes every blocked
/// [`put_interruptible`](crate::BlockingQueue::put_interruptible),
/// [`take_interruptible`](crate::BlockingQueue::take_interruptible) and
/// [`sleep`](Interrupt::sleep) waiting on it, or on any of its clones. The flag
/// is sticky: once fired, every later call that would block fails immediately.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use blocking_queue::{BlockingQueue, Interrupt, TakeError};
///
/// let q = BlockingQueue::<u32>::new(1);
/// let stop = Interrupt::new();
///
/// let consumer = thread::spawn({
///     let (q, stop) = (q.clone(), stop.clone());
///     move || q.take_interruptible(&stop)
/// });
///
/// stop.interrupt();
/// assert_eq!(consumer.join().unwrap(), Err(TakeError::Interrupted));
/// ```
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    interrupted: AtomicBool,
    state: Mutex<State>,
    cvar: Condvar,
}

#[derive(Default)]
struct State {
    next_id: usize,
    waiters: Vec<(usize, Waker)>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Calling it again has no further effect.
    pub fn interrupt(&self) {
        let waiters = {
            let mut state = self.inner.lock();
            if self.inner.interrupted.swap(true, AcqRel) {
                return;
            }
            mem::take(&mut state.waiters)
        };

        debug!(waiters = waiters.len(), "interrupt fired");

        self.inner.cvar.notify_all();
        for (_, waker) in waiters {
            waker.wake();
        }
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Acquire)
    }

    /// Sleeps for `duration`, or until the token fires.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now().checked_add(duration);
        let mut state = self.inner.lock();

        loop {
            if self.is_interrupted() {
                return Err(Interrupted);
            }

            state = match deadline {
                None => self
                    .inner
                    .cvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.inner
                        .cvar
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Registers `waker` to be woken when the token fires.
    ///
    /// The waker is dropped from the token when the returned guard goes out of
    /// scope. Nothing is registered if the token already fired; callers must
    /// check [`is_interrupted`](Self::is_interrupted) before blocking.
    pub(crate) fn register(&self, waker: Waker) -> Registration<'_> {
        let mut state = self.inner.lock();

        if self.is_interrupted() {
            return Registration {
                interrupt: self,
                id: None,
            };
        }

        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        state.waiters.push((id, waker));

        Registration {
            interrupt: self,
            id: Some(id),
        }
    }
}

impl Inner {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Keeps a waker registered on an [`Interrupt`] while alive.
pub(crate) struct Registration<'a> {
    interrupt: &'a Interrupt,
    id: Option<usize>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            let mut state = self.interrupt.inner.lock();
            state.waiters.retain(|(other, _)| *other != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;
    use std::thread;

    use super::*;

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, SeqCst);
        }
    }

    fn counter() -> (Arc<Counter>, Waker) {
        let c = Arc::new(Counter(AtomicUsize::new(0)));
        (c.clone(), Waker::from(c))
    }

    #[test]
    fn sticky() {
        let i = Interrupt::new();
        assert!(!i.is_interrupted());

        i.interrupt();
        i.interrupt();
        assert!(i.is_interrupted());
        assert!(i.clone().is_interrupted());
    }

    #[test]
    fn wakes_registered_once() {
        let i = Interrupt::new();
        let (c, waker) = counter();

        let registration = i.register(waker);
        i.interrupt();
        i.interrupt();

        assert_eq!(c.0.load(SeqCst), 1);
        drop(registration);
    }

    #[test]
    fn guard_deregisters() {
        let i = Interrupt::new();
        let (c, waker) = counter();

        drop(i.register(waker));
        assert!(i.inner.lock().waiters.is_empty());

        i.interrupt();
        assert_eq!(c.0.load(SeqCst), 0);
    }

    #[test]
    fn register_after_fire() {
        let i = Interrupt::new();
        i.interrupt();

        let (_, waker) = counter();
        let registration = i.register(waker);
        assert!(registration.id.is_none());
        assert!(i.inner.lock().waiters.is_empty());
    }

    #[test]
    fn sleep_full_duration() {
        let dur = Duration::from_millis(50);
        let start = Instant::now();

        assert_eq!(Interrupt::new().sleep(dur), Ok(()));
        assert!(start.elapsed() >= dur);
    }

    #[test]
    fn sleep_cut_short() {
        let i = Interrupt::new();
        let start = Instant::now();

        let sleeper = thread::spawn({
            let i = i.clone();
            move || i.sleep(Duration::from_secs(60))
        });

        thread::sleep(Duration::from_millis(50));
        i.interrupt();

        assert_eq!(sleeper.join().unwrap(), Err(Interrupted));
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
