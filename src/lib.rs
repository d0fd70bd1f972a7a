//! A bounded, blocking FIFO queue for coordinating producer and consumer threads.
//!
//! [`BlockingQueue::put`] waits while the queue is full and
//! [`BlockingQueue::take`] waits while it is empty. Blocked calls can be given
//! a deadline (`*_timeout`), made cancellable with an [`Interrupt`]
//! (`*_interruptible`), or released for good with [`BlockingQueue::close`].

mod error;
mod interrupt;
mod queue;
mod ring;

pub mod demo;
pub mod trace;

pub use error::{CapacityError, Interrupted, PutError, TakeError};
pub use interrupt::Interrupt;
pub use queue::BlockingQueue;
