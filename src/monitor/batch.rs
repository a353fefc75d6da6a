use std::collections::VecDeque;

use crate::capture::Frame;

/// The most recent frames awaiting analysis, oldest first.
pub struct CaptureBatch {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl CaptureBatch {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a frame, dropping the oldest one once the batch is at capacity.
    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Empties the batch and hands back its frames.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }
}
