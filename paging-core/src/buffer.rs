//! Pending update buffer for pagekit.
//!
//! While a diff is in flight, every update submitted after it waits here in
//! FIFO order. Once the diff result is applied the buffer is drained in
//! order. When the in-flight diff is superseded, everything waiting behind
//! it is discarded without being applied.

use std::collections::VecDeque;
use thiserror::Error;

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Buffer is at capacity.
    #[error("buffer full (capacity: {capacity})")]
    Full {
        /// Current buffer capacity.
        capacity: usize,
    },
}

/// FIFO of operations waiting for the current diff to finish.
#[derive(Debug)]
pub struct OpBuffer<O> {
    /// Maximum number of waiting operations.
    max_size: usize,
    /// Operations in submission order.
    queue: VecDeque<O>,
}

impl<O> OpBuffer<O> {
    /// Create a new buffer with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            queue: VecDeque::new(),
        }
    }

    /// Add an operation behind the ones already waiting.
    ///
    /// Returns an error if the buffer is full.
    pub fn enqueue(&mut self, op: O) -> Result<(), BufferError> {
        if self.queue.len() >= self.max_size {
            return Err(BufferError::Full {
                capacity: self.max_size,
            });
        }
        self.queue.push_back(op);
        Ok(())
    }

    /// Remove and return the oldest waiting operation.
    pub fn dequeue(&mut self) -> Option<O> {
        self.queue.pop_front()
    }

    /// Drop every waiting operation, returning them oldest first.
    pub fn discard_all(&mut self) -> Vec<O> {
        self.queue.drain(..).collect()
    }

    /// Number of waiting operations.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if another operation would be rejected.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.max_size
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_queues_ops() {
        let mut buffer = OpBuffer::new(100);
        buffer.enqueue("remove").unwrap();
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn buffer_respects_max_size() {
        let mut buffer = OpBuffer::new(2);

        buffer.enqueue(1).unwrap();
        buffer.enqueue(2).unwrap();
        let overflow = buffer.enqueue(3);

        assert_eq!(overflow, Err(BufferError::Full { capacity: 2 }));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn buffer_dequeues_in_order() {
        let mut buffer = OpBuffer::new(100);
        buffer.enqueue(1).unwrap();
        buffer.enqueue(2).unwrap();
        buffer.enqueue(3).unwrap();

        assert_eq!(buffer.dequeue(), Some(1));
        assert_eq!(buffer.dequeue(), Some(2));
        assert_eq!(buffer.dequeue(), Some(3));
        assert_eq!(buffer.dequeue(), None);
    }

    #[test]
    fn discard_all_returns_oldest_first() {
        let mut buffer = OpBuffer::new(100);
        buffer.enqueue("a").unwrap();
        buffer.enqueue("b").unwrap();

        let dropped = buffer.discard_all();

        assert_eq!(dropped, vec!["a", "b"]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.discard_all(), Vec::<&str>::new());
    }

    #[test]
    fn discard_frees_space() {
        let mut buffer = OpBuffer::new(1);
        buffer.enqueue(1).unwrap();
        assert!(buffer.enqueue(2).is_err());

        buffer.discard_all();
        assert!(buffer.enqueue(2).is_ok());
        assert_eq!(buffer.capacity(), 1);
    }
}
