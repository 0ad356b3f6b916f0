use std::time::{Duration, Instant};

use crate::domain::MergedEvent;

/// Accumulates merged events in CSV mode and decides when to flush.
/// Single-owner, `&mut self` throughout.
pub struct Batcher {
    buffer: Vec<MergedEvent>,
    last_flush: Instant,
    max_size: usize,
    interval: Duration,
}

impl Batcher {
    pub fn new(max_size: usize, interval: Duration) -> Self {
        Batcher {
            buffer: Vec::new(),
            last_flush: Instant::now(),
            max_size,
            interval,
        }
    }

    fn due(&self, force: bool) -> bool {
        if force {
            return !self.buffer.is_empty();
        }
        if self.buffer.is_empty() {
            return false;
        }
        self.buffer.len() >= self.max_size || self.last_flush.elapsed() >= self.interval
    }

    /// Appends `event`, returning a drained batch if a size or time
    /// trigger fired as a result.
    pub fn add(&mut self, event: MergedEvent) -> Option<Vec<MergedEvent>> {
        self.buffer.push(event);
        self.flush(false)
    }

    /// Checks the flush trigger without adding anything. Used on the
    /// periodic ticker so idle streams still flush within the interval.
    pub fn check(&mut self) -> Option<Vec<MergedEvent>> {
        self.flush(false)
    }

    /// Extracts the buffer if due. `force` only matters when the buffer
    /// is non-empty; an empty buffer never produces a flush, forced or
    /// not.
    pub fn flush(&mut self, force: bool) -> Option<Vec<MergedEvent>> {
        if !self.due(force) {
            return None;
        }
        let drained = std::mem::take(&mut self.buffer);
        self.last_flush = Instant::now();
        Some(drained)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> MergedEvent {
        MergedEvent::InventoryUpdate {
            product: json!({"product_id": "p1"}),
            customer_summary: crate::domain::CustomerSummary { total_customers: 0 },
        }
    }

    #[test]
    fn size_trigger_flushes_at_threshold() {
        let mut b = Batcher::new(3, Duration::from_secs(3600));
        assert!(b.add(event()).is_none());
        assert!(b.add(event()).is_none());
        let flushed = b.add(event()).unwrap();
        assert_eq!(flushed.len(), 3);
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn time_trigger_flushes_after_interval() {
        let mut b = Batcher::new(100, Duration::from_millis(50));
        assert!(b.add(event()).is_none());
        std::thread::sleep(Duration::from_millis(80));
        let flushed = b.check().unwrap();
        assert_eq!(flushed.len(), 1);
    }

    #[test]
    fn forced_flush_on_empty_buffer_is_noop() {
        let mut b = Batcher::new(10, Duration::from_secs(10));
        assert!(b.flush(true).is_none());
    }

    #[test]
    fn forced_flush_drains_partial_buffer() {
        let mut b = Batcher::new(10, Duration::from_secs(10));
        b.add(event());
        let flushed = b.flush(true).unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(b.len(), 0);
    }
}
