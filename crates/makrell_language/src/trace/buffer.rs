//! Bounded record storage.

use std::collections::VecDeque;

use super::record::{TraceEvent, TraceRecord};

/// The most recent trace records of a context, oldest first.
///
/// Record ids keep counting across evictions and drains, so a consumer that
/// drains periodically can tell whether records were lost in between.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    capacity: usize,
    next_id: u64,
}

impl TraceBuffer {
    /// Creates a buffer holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            next_id: 0,
        }
    }

    /// Appends a record for `event` and returns its id.
    pub fn push(&mut self, depth: usize, timestamp_ns: u64, event: TraceEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        if self.capacity > 0 {
            self.records
                .push_back(TraceRecord::new(id, depth, timestamp_ns, event));
        }
        id
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// The newest record.
    #[must_use]
    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.back()
    }

    /// Removes every record, returning them oldest first.
    pub fn drain(&mut self) -> Vec<TraceRecord> {
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expanded(name: &str) -> TraceEvent {
        TraceEvent::MacroExpanded {
            name: name.into(),
            produced: 1,
        }
    }

    #[test]
    fn full_buffers_drop_the_oldest_record() {
        let mut buffer = TraceBuffer::new(2);
        for name in ["a", "b", "c"] {
            buffer.push(0, 0, expanded(name));
        }
        let ids: Vec<u64> = buffer.iter().map(|r| r.id).collect();
        assert_eq!(ids, [1, 2]);
        assert_eq!(buffer.last().map(|r| r.id), Some(2));
    }

    #[test]
    fn ids_continue_after_a_drain() {
        let mut buffer = TraceBuffer::new(8);
        buffer.push(0, 0, expanded("a"));
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.push(2, 0, expanded("b")), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut buffer = TraceBuffer::new(0);
        buffer.push(0, 0, expanded("a"));
        assert!(buffer.is_empty());
    }
}
