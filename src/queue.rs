use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Wake, Waker};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{CapacityError, PutError, TakeError};
use crate::interrupt::Interrupt;
use crate::ring::Ring;

/// A bounded, blocking, multi-producer multi-consumer FIFO queue.
///
/// `put` waits while the queue is full and `take` waits while it is empty.
/// Both run under a single lock; waiting releases it.
///
/// The queue is a handle: clones refer to the same buffer.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use blocking_queue::BlockingQueue;
///
/// let q = BlockingQueue::new(2);
///
/// let producer = thread::spawn({
///     let q = q.clone();
///     move || {
///         for i in 0..10 {
///             q.put(i).unwrap();
///         }
///     }
/// });
///
/// for i in 0..10 {
///     assert_eq!(q.take(), Ok(i));
/// }
/// producer.join().unwrap();
/// ```
pub struct BlockingQueue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    /// Producers wait here while the ring is full.
    not_full: Condvar,
    /// Consumers wait here while the ring is empty.
    not_empty: Condvar,
}

struct Inner<T> {
    ring: Ring<T>,
    closed: bool,
}

/// How a call behaves when it cannot proceed.
#[derive(Clone, Copy)]
enum Block<'a> {
    Never,
    Forever,
    Until(Instant),
    Interruptible(&'a Interrupt),
}

/// Why a wait gave up.
enum Stop {
    WouldBlock,
    TimedOut,
    Interrupted,
}

impl<'a> Block<'a> {
    fn timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Block::Until(deadline),
            None => Block::Forever,
        }
    }
}

impl Stop {
    fn put_error<T>(self, value: T) -> PutError<T> {
        match self {
            Stop::WouldBlock => PutError::Full(value),
            Stop::TimedOut => PutError::Timeout(value),
            Stop::Interrupted => PutError::Interrupted(value),
        }
    }

    fn take_error(self) -> TakeError {
        match self {
            Stop::WouldBlock => TakeError::Empty,
            Stop::TimedOut => TakeError::Timeout,
            Stop::Interrupted => TakeError::Interrupted,
        }
    }
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    ring: Ring::new(capacity),
                    closed: false,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Like [`new`](Self::new), but reports a zero capacity as an error.
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError);
        }
        Ok(Self::new(capacity))
    }

    /// Appends `value`, waiting for space.
    ///
    /// Fails only if the queue is closed.
    pub fn put(&self, value: T) -> Result<(), PutError<T>> {
        self.put_with(value, Block::Forever)
    }

    /// Appends `value`, waiting at most `timeout` for space.
    pub fn put_timeout(&self, value: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.put_with(value, Block::timeout(timeout))
    }

    /// Appends `value` only if there is space right now.
    pub fn try_put(&self, value: T) -> Result<(), PutError<T>> {
        self.put_with(value, Block::Never)
    }

    /// Removes the head, waiting for an element.
    ///
    /// Fails only once the queue is closed and drained.
    pub fn take(&self) -> Result<T, TakeError> {
        self.take_with(Block::Forever)
    }

    /// Removes the head, waiting at most `timeout` for an element.
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, TakeError> {
        self.take_with(Block::timeout(timeout))
    }

    /// Removes the head only if there is one right now.
    pub fn try_take(&self) -> Result<T, TakeError> {
        self.take_with(Block::Never)
    }

    /// Closes the queue and wakes every blocked caller.
    ///
    /// Later puts fail; takes drain what is left and then fail. Returns
    /// `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.closed {
            return false;
        }
        inner.closed = true;
        drop(inner);

        debug!("queue closed");
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn len(&self) -> usize {
        self.shared.lock().ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().ring.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.lock().ring.is_full()
    }

    /// The remaining capacity.
    pub fn slack(&self) -> usize {
        self.shared.lock().ring.slack()
    }

    fn put_with(&self, mut value: T, block: Block<'_>) -> Result<(), PutError<T>> {
        let mut inner = self.shared.lock();

        loop {
            if inner.closed {
                return Err(PutError::Closed(value));
            }
            value = match inner.ring.push(value) {
                Ok(()) => break,
                Err(value) => value,
            };
            inner = match self.shared.wait(inner, &self.shared.not_full, block) {
                Ok(inner) => inner,
                Err(stop) => return Err(stop.put_error(value)),
            };
        }
        drop(inner);

        self.shared.not_empty.notify_all();
        Ok(())
    }

    fn take_with(&self, block: Block<'_>) -> Result<T, TakeError> {
        let mut inner = self.shared.lock();

        let value = loop {
            if let Some(value) = inner.ring.pop() {
                break value;
            }
            if inner.closed {
                return Err(TakeError::Closed);
            }
            inner = self
                .shared
                .wait(inner, &self.shared.not_empty, block)
                .map_err(Stop::take_error)?;
        };
        drop(inner);

        self.shared.not_full.notify_all();
        Ok(value)
    }
}

impl<T: Send + 'static> BlockingQueue<T> {
    /// Appends `value`, waiting for space until `interrupt` fires.
    ///
    /// A queue with space accepts the value even if `interrupt` already fired.
    pub fn put_interruptible(&self, value: T, interrupt: &Interrupt) -> Result<(), PutError<T>> {
        let _registration = interrupt.register(self.waker());
        self.put_with(value, Block::Interruptible(interrupt))
    }

    /// Removes the head, waiting for an element until `interrupt` fires.
    ///
    /// A non-empty queue hands out its head even if `interrupt` already fired.
    pub fn take_interruptible(&self, interrupt: &Interrupt) -> Result<T, TakeError> {
        let _registration = interrupt.register(self.waker());
        self.take_with(Block::Interruptible(interrupt))
    }

    fn waker(&self) -> Waker {
        Waker::from(Arc::clone(&self.shared))
    }
}

impl<T> Shared<T> {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits once on `cvar`. The caller re-checks its predicate afterwards.
    fn wait<'a>(
        &self,
        inner: MutexGuard<'a, Inner<T>>,
        cvar: &Condvar,
        block: Block<'_>,
    ) -> Result<MutexGuard<'a, Inner<T>>, Stop> {
        match block {
            Block::Never => Err(Stop::WouldBlock),
            Block::Forever => {
                trace!(len = inner.ring.len(), "blocking");
                Ok(cvar.wait(inner).unwrap_or_else(PoisonError::into_inner))
            }
            Block::Until(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    trace!("deadline expired");
                    return Err(Stop::TimedOut);
                }
                trace!(len = inner.ring.len(), "blocking with deadline");
                let (inner, _) = cvar
                    .wait_timeout(inner, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(inner)
            }
            Block::Interruptible(interrupt) => {
                if interrupt.is_interrupted() {
                    trace!("interrupted");
                    return Err(Stop::Interrupted);
                }
                trace!(len = inner.ring.len(), "blocking until interrupted");
                Ok(cvar.wait(inner).unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}

/// Waking the queue kicks every waiter so it re-checks its interrupt.
impl<T: Send> Wake for Shared<T> {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        drop(self.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

impl<T> Clone for BlockingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &inner.ring.len())
            .field("capacity", &inner.ring.capacity())
            .field("closed", &inner.closed)
            .finish()
    }
}
