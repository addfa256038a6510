use std::collections::VecDeque;

use parking_lot::Mutex;

use super::model::FeedbackRecord;

/// Bounded FIFO of feedback records; the oldest record is evicted when full.
#[derive(Debug)]
pub struct FeedbackBuffer {
    capacity: usize,
    records: Mutex<VecDeque<FeedbackRecord>>,
}

impl FeedbackBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record, returning the evicted one if the buffer was full.
    pub fn push(&self, record: FeedbackRecord) -> Option<FeedbackRecord> {
        let mut records = self.records.lock();
        let evicted = if records.len() >= self.capacity {
            records.pop_front()
        } else {
            None
        };
        records.push_back(record);
        evicted
    }

    /// Removes and returns every buffered record, oldest first.
    pub fn drain(&self) -> Vec<FeedbackRecord> {
        self.records.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
