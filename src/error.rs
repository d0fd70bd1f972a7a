use std::fmt;

use thiserror::Error;

/// Returned by [`BlockingQueue::try_new`](crate::BlockingQueue::try_new) for a zero capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity must be positive")]
pub struct CapacityError;

/// Returned by [`Interrupt::sleep`](crate::Interrupt::sleep) when the token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted")]
pub struct Interrupted;

/// A failed put. The rejected value is always handed back.
#[derive(Clone, PartialEq, Eq, Error)]
pub enum PutError<T> {
    #[error("queue is full")]
    Full(T),
    #[error("timed out waiting for space")]
    Timeout(T),
    #[error("interrupted while waiting for space")]
    Interrupted(T),
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PutError<T> {
    /// Recovers the value that was not inserted.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value)
            | Self::Timeout(value)
            | Self::Interrupted(value)
            | Self::Closed(value) => value,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full(_) => "Full",
            Self::Timeout(_) => "Timeout",
            Self::Interrupted(_) => "Interrupted",
            Self::Closed(_) => "Closed",
        };
        f.debug_tuple(name).field(&"..").finish()
    }
}

/// A failed take. Nothing was removed from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TakeError {
    #[error("queue is empty")]
    Empty,
    #[error("timed out waiting for an item")]
    Timeout,
    #[error("interrupted while waiting for an item")]
    Interrupted,
    #[error("queue is closed and drained")]
    Closed,
}
