use parking_lot::Mutex;
use thiserror::Error;

/// The number of samples kept per sensor unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 100;

/// Returned by the non-draining single element reads on an empty buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("ring buffer is empty")]
pub struct EmptyBufferError;

/// Anything that can be located in time by [`crate::find_closest`].
pub trait Timestamped {
    /// The timestamp used for correlation, in seconds.
    fn timestamp(&self) -> f64;
}

impl Timestamped for crate::Sample {
    fn timestamp(&self) -> f64 {
        self.source_timestamp
    }
}

/// A fixed-capacity circular buffer which overwrites its oldest element when full.
///
/// Every operation takes the same lock, so a single sensor producer and a single capture
/// consumer can share the buffer through an `Arc` without ever observing a partially updated
/// state. Operations are O(1) except the `*_all` snapshots, which are O(capacity).
///
/// ```
/// use posecap_core::TimestampedRingBuffer;
///
/// let buffer = TimestampedRingBuffer::new(2);
/// buffer.push(1);
/// buffer.push(2);
/// buffer.push(3);
/// assert_eq!(buffer.pop_all(), vec![2, 3]);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct TimestampedRingBuffer<T> {
    slots: Mutex<Slots<T>>,
}

/// `head == tail` both when empty and when full; `length` tells the two apart.
#[derive(Debug)]
struct Slots<T> {
    contents: Vec<Option<T>>,
    head: usize,
    tail: usize,
    length: usize,
}

impl<T> Slots<T> {
    fn capacity(&self) -> usize {
        self.contents.len()
    }

    fn advance(&self, index: usize) -> usize {
        if index + 1 >= self.capacity() {
            0
        } else {
            index + 1
        }
    }

    fn take_oldest(&mut self) -> Option<T> {
        if self.length == 0 {
            return None;
        }
        let item = self.contents[self.tail].take();
        self.tail = self.advance(self.tail);
        self.length -= 1;
        item
    }
}

impl<T> TimestampedRingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut contents = Vec::with_capacity(capacity);
        contents.resize_with(capacity, || None);
        Self {
            slots: Mutex::new(Slots {
                contents,
                head: 0,
                tail: 0,
                length: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().length
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().length == 0
    }

    pub fn is_full(&self) -> bool {
        let slots = self.slots.lock();
        slots.length >= slots.capacity()
    }

    /// Appends `item`, evicting the oldest element first if the buffer is full.
    ///
    /// Returns the remaining free capacity, which is informational only.
    pub fn push(&self, item: T) -> usize {
        let mut slots = self.slots.lock();
        if slots.length >= slots.capacity() {
            slots.tail = slots.advance(slots.tail);
            slots.length -= 1;
        }
        let head = slots.head;
        slots.contents[head] = Some(item);
        slots.head = slots.advance(head);
        slots.length += 1;
        slots.capacity() - slots.length
    }

    /// Removes and returns the oldest element.
    pub fn pop(&self) -> Result<T, EmptyBufferError> {
        self.slots.lock().take_oldest().ok_or(EmptyBufferError)
    }

    /// Drains the buffer, returning its elements oldest first.
    ///
    /// This never fails; an empty buffer produces an empty vector.
    pub fn pop_all(&self) -> Vec<T> {
        let mut slots = self.slots.lock();
        let mut drained = Vec::with_capacity(slots.length);
        while let Some(item) = slots.take_oldest() {
            drained.push(item);
        }
        drained
    }

    /// Resets the buffer to empty. Stale slots are left in place and overwritten by later pushes.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        slots.head = 0;
        slots.tail = 0;
        slots.length = 0;
    }
}

impl<T: Clone> TimestampedRingBuffer<T> {
    /// Returns a copy of the oldest element without removing it.
    pub fn peek(&self) -> Result<T, EmptyBufferError> {
        let slots = self.slots.lock();
        if slots.length == 0 {
            return Err(EmptyBufferError);
        }
        slots.contents[slots.tail].clone().ok_or(EmptyBufferError)
    }

    /// Returns a copy of the oldest element, or `empty` if there is none.
    pub fn peek_or(&self, empty: T) -> T {
        self.peek().unwrap_or(empty)
    }

    /// A non-destructive snapshot of the contents, oldest first.
    pub fn peek_all(&self) -> Vec<T> {
        let slots = self.slots.lock();
        let mut snapshot = Vec::with_capacity(slots.length);
        let mut index = slots.tail;
        for _ in 0..slots.length {
            if let Some(item) = &slots.contents[index] {
                snapshot.push(item.clone());
            }
            index = slots.advance(index);
        }
        snapshot
    }
}

impl<T> Default for TimestampedRingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
