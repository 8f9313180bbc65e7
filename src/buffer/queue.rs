use super::batch::Batch;
use crate::domain::Event;
use std::collections::VecDeque;
use tracing::debug;

/// Bounded FIFO of unsent batches.
///
/// Every insertion that pushes the queue past `max_batches` evicts from the
/// front until the queue is back at capacity. Callers get back the number of
/// events lost to eviction, never an error: the producer is never blocked.
#[derive(Debug)]
pub struct BatchQueue {
    batches: VecDeque<Batch>,
    batch_size: usize,
    max_batches: usize,
}

impl BatchQueue {
    pub fn new(batch_size: usize, max_batches: usize) -> Self {
        Self {
            batches: VecDeque::with_capacity(max_batches + 1),
            batch_size: batch_size.max(1),
            max_batches: max_batches.max(1),
        }
    }

    /// Slice `events` into batches of at most `batch_size` and enqueue them.
    ///
    /// Returns the number of events dropped by capacity eviction.
    pub fn create_batches(&mut self, mut events: Vec<Event>) -> usize {
        let mut dropped = 0;

        while !events.is_empty() {
            let rest = if events.len() > self.batch_size {
                events.split_off(self.batch_size)
            } else {
                Vec::new()
            };
            let chunk = std::mem::replace(&mut events, rest);
            dropped += self.push(Batch::new(chunk));
        }

        dropped
    }

    /// Put a previously failed batch back at the tail.
    pub fn requeue_batch(&mut self, batch: Batch) -> usize {
        self.push(batch)
    }

    pub fn take_next_batch(&mut self) -> Option<Batch> {
        self.batches.pop_front()
    }

    pub fn take_all_batches(&mut self) -> Vec<Batch> {
        self.batches.drain(..).collect()
    }

    pub fn has_full_batch(&self) -> bool {
        self.batches.iter().any(|b| b.size() >= self.batch_size)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn total_events(&self) -> usize {
        self.batches.iter().map(Batch::size).sum()
    }

    fn push(&mut self, batch: Batch) -> usize {
        self.batches.push_back(batch);

        let mut dropped = 0;
        while self.batches.len() > self.max_batches {
            if let Some(evicted) = self.batches.pop_front() {
                debug!(
                    batch_id = evicted.id(),
                    events = evicted.size(),
                    attempts = evicted.attempts(),
                    "Evicted oldest batch, queue over capacity"
                );
                dropped += evicted.size();
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(n: usize) -> Vec<Event> {
        (0..n).map(|i| Event::at(format!("event_{i}"), i as i64)).collect()
    }

    #[test]
    fn test_create_batches_splits_with_remainder() {
        let mut queue = BatchQueue::new(100, 10);

        let dropped = queue.create_batches(events(250));

        assert_eq!(dropped, 0);
        let sizes: Vec<_> = queue.take_all_batches().iter().map(Batch::size).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_create_batches_batch_count_matches_ceiling() {
        for (n, b) in [(1, 1), (7, 3), (9, 3), (10, 4), (99, 100), (301, 100)] {
            let mut queue = BatchQueue::new(b, 1000);
            queue.create_batches(events(n));

            let batches = queue.take_all_batches();
            assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");

            let expected_last = if n % b == 0 { b } else { n % b };
            assert_eq!(batches.last().map(Batch::size), Some(expected_last));
            assert_eq!(batches.iter().map(Batch::size).sum::<usize>(), n);
        }
    }

    #[test]
    fn test_create_batches_preserves_event_order() {
        let mut queue = BatchQueue::new(2, 10);
        queue.create_batches(events(5));

        let names: Vec<_> = queue
            .take_all_batches()
            .into_iter()
            .flat_map(Batch::into_events)
            .map(|e| e.event_name)
            .collect();
        assert_eq!(
            names,
            vec!["event_0", "event_1", "event_2", "event_3", "event_4"]
        );
    }

    #[test]
    fn test_overflow_evicts_oldest_batch() {
        let mut queue = BatchQueue::new(100, 10);
        for i in 0..10 {
            assert_eq!(queue.create_batches(vec![Event::at(format!("b{i}"), 0)]), 0);
        }

        let dropped = queue.create_batches(vec![Event::at("b10", 0)]);

        assert_eq!(dropped, 1);
        assert_eq!(queue.len(), 10);
        let oldest = queue.take_next_batch().unwrap();
        assert_eq!(oldest.events()[0].event_name, "b1");
    }

    #[test]
    fn test_dropped_count_is_sum_of_evicted_events() {
        let mut queue = BatchQueue::new(5, 2);
        queue.create_batches(events(3));
        queue.create_batches(events(4));

        // Two more batches (5 + 2) push out the 3- and 4-event batches.
        let dropped = queue.create_batches(events(7));

        assert_eq!(dropped, 7);
        let sizes: Vec<_> = queue.take_all_batches().iter().map(Batch::size).collect();
        assert_eq!(sizes, vec![5, 2]);
    }

    #[test]
    fn test_requeue_goes_to_tail_and_keeps_attempts() {
        let mut queue = BatchQueue::new(10, 3);
        queue.create_batches(events(1));
        let mut failed = queue.take_next_batch().unwrap();
        failed.increment_attempts();
        let failed_id = failed.id().to_string();

        queue.create_batches(events(2));
        assert_eq!(queue.requeue_batch(failed), 0);

        let batches = queue.take_all_batches();
        assert_eq!(batches.last().unwrap().id(), failed_id);
        assert_eq!(batches.last().unwrap().attempts(), 1);
    }

    #[test]
    fn test_requeue_over_capacity_reports_eviction() {
        let mut queue = BatchQueue::new(10, 2);
        queue.create_batches(events(4));
        queue.create_batches(events(10));
        let mut failed = Batch::new(events(3));
        failed.increment_attempts();

        assert_eq!(queue.requeue_batch(failed), 4);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_has_full_batch() {
        let mut queue = BatchQueue::new(3, 10);
        queue.create_batches(events(2));
        assert!(!queue.has_full_batch());

        queue.create_batches(events(3));
        assert!(queue.has_full_batch());

        queue.take_all_batches();
        assert!(!queue.has_full_batch());
        assert!(queue.take_next_batch().is_none());
    }
}
