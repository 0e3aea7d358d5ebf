//! Rolling sample buffer for analog trend rendering.
//!
//! Keeps a fixed-capacity window of recent samples, newest first. Pushing into a
//! full buffer drops the oldest sample.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingSampleBuffer<T> {
    /// Maximum number of samples to keep
    capacity: usize,
    /// Samples, newest first
    samples: VecDeque<T>,
}

impl<T> RollingSampleBuffer<T> {
    /// Create a new buffer with specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Prepend a sample, dropping the oldest one when full
    pub fn push(&mut self, sample: T) {
        if self.capacity == 0 {
            return;
        }
        self.samples.push_front(sample);
        self.samples.truncate(self.capacity);
    }

    /// Samples, newest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.front()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<T: Clone> RollingSampleBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_first() {
        let mut buffer = RollingSampleBuffer::new(4);
        assert!(buffer.is_empty());

        buffer.push(1);
        buffer.push(2);
        buffer.push(3);

        assert_eq!(buffer.to_vec(), vec![3, 2, 1]);
        assert_eq!(buffer.latest(), Some(&3));
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buffer = RollingSampleBuffer::new(3);
        for v in 1..=4 {
            buffer.push(v);
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.to_vec(), vec![4, 3, 2]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = RollingSampleBuffer::new(32);
        for v in 0..1000 {
            buffer.push(v);
            assert!(buffer.len() <= buffer.capacity());
        }
        assert_eq!(buffer.latest(), Some(&999));
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let mut buffer = RollingSampleBuffer::new(0);
        buffer.push(1);
        assert!(buffer.is_empty());
    }
}
