use crate::domain::Event;
use std::time::Instant;
use uuid::Uuid;

/// A group of events delivered as one request.
///
/// Batches are created by [`super::BatchQueue`] and survive across failed
/// sends; the attempt counter only ever moves forward.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    events: Vec<Event>,
    attempts: u32,
    created_at: Instant,
}

impl Batch {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events,
            attempts: 0,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn increment_attempts(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_batch_starts_at_zero_attempts() {
        let batch = Batch::new(vec![Event::at("a", 0)]);
        assert_eq!(batch.attempts(), 0);
        assert_eq!(batch.size(), 1);
        assert!(!batch.id().is_empty());
    }

    #[test]
    fn test_attempts_only_increase_and_events_are_kept() {
        let mut batch = Batch::new(vec![Event::at("a", 0), Event::at("b", 1)]);
        let id = batch.id().to_string();

        for expected in 1..=3 {
            batch.increment_attempts();
            assert_eq!(batch.attempts(), expected);
        }

        assert_eq!(batch.id(), id);
        let names: Vec<_> = batch.events().iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
