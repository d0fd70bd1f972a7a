use std::fmt;

/// A fixed-capacity FIFO ring.
///
/// The ring never reallocates: once `len == capacity` every further push is
/// handed back to the caller.
pub struct Ring<T> {
    head: usize,
    len: usize,
    slots: Box<[Option<T>]>,
}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            head: 0,
            len: 0,
            slots: slots.into_boxed_slice(),
        }
    }

    /// Returns `Err(value)` if the ring is full.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }

        let tail = (self.head + self.len) % self.slots.len();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let value = self.slots[self.head].take();
        debug_assert!(value.is_some());
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// The remaining capacity.
    #[inline]
    pub fn slack(&self) -> usize {
        self.slots.len() - self.len
    }
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
