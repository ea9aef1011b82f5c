use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::packet::PacketRecord;

/// Bounded FIFO of the most recent packet records.
///
/// Pushing into a full buffer evicts the oldest record. Readers get consistent
/// snapshots: the lock is only held while the record handles are cloned.
#[derive(Debug)]
pub struct RetentionBuffer {
    capacity: usize,
    records: RwLock<VecDeque<Arc<PacketRecord>>>,
}

impl RetentionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest one when full. Returns the number evicted.
    pub fn push(&self, record: Arc<PacketRecord>) -> usize {
        let mut records = self.records.write();
        let mut evicted = 0;
        while records.len() >= self.capacity {
            records.pop_front();
            evicted += 1;
        }
        records.push_back(record);
        evicted
    }

    /// Most recent records in capture order, optionally limited to the last `limit`
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<PacketRecord> {
        let handles: Vec<Arc<PacketRecord>> = {
            let records = self.records.read();
            let skip = match limit {
                Some(limit) => records.len().saturating_sub(limit),
                None => 0,
            };
            records.iter().skip(skip).cloned().collect()
        };

        handles.iter().map(|record| record.as_ref().clone()).collect()
    }

    /// Records with an id greater than `after_id`, in capture order
    pub fn since(&self, after_id: u64) -> Vec<PacketRecord> {
        let handles: Vec<Arc<PacketRecord>> = {
            let records = self.records.read();
            let start = records.partition_point(|record| record.id <= after_id);
            records.iter().skip(start).cloned().collect()
        };

        handles.iter().map(|record| record.as_ref().clone()).collect()
    }

    /// Remove every record, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut records = self.records.write();
        let count = records.len();
        records.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::PacketTimestamp;
    use std::time::Duration;

    fn record(id: u64) -> Arc<PacketRecord> {
        Arc::new(PacketRecord {
            id,
            timestamp: PacketTimestamp::now(Duration::from_millis(id)),
            interface: "lo".to_string(),
            length: 60,
            link_layer: None,
            network_layer: None,
            transport_layer: None,
            src_address: None,
            dst_address: None,
            src_port: None,
            dst_port: None,
            protocol_label: "OTHER".to_string(),
            payload_preview: None,
        })
    }

    fn ids(records: &[PacketRecord]) -> Vec<u64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let buffer = RetentionBuffer::new(3);
        let evicted: usize = (1..=5).map(|id| buffer.push(record(id))).sum();

        assert_eq!(evicted, 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(ids(&buffer.snapshot(None)), vec![3, 4, 5]);
    }

    #[test]
    fn test_snapshot_limit_returns_most_recent() {
        let buffer = RetentionBuffer::new(10);
        for id in 1..=6 {
            buffer.push(record(id));
        }

        assert_eq!(ids(&buffer.snapshot(Some(2))), vec![5, 6]);
        assert_eq!(ids(&buffer.snapshot(Some(100))).len(), 6);
        assert!(buffer.snapshot(Some(0)).is_empty());
    }

    #[test]
    fn test_since_and_clear() {
        let buffer = RetentionBuffer::new(10);
        for id in 1..=4 {
            buffer.push(record(id));
        }

        assert_eq!(ids(&buffer.since(2)), vec![3, 4]);
        assert!(buffer.since(4).is_empty());

        assert_eq!(buffer.clear(), 4);
        assert!(buffer.is_empty());
        assert!(buffer.snapshot(None).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = RetentionBuffer::new(0);
        buffer.push(record(1));
        buffer.push(record(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(ids(&buffer.snapshot(None)), vec![2]);
    }
}
