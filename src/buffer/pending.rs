use crate::domain::Event;

/// Append-only staging area for freshly enqueued events.
///
/// There is no eviction here. Bounding happens in [`super::BatchQueue`] so that
/// only whole batches are ever dropped.
#[derive(Debug)]
pub struct PendingEvents {
    events: Vec<Event>,
    batch_size: usize,
}

impl PendingEvents {
    pub fn new(batch_size: usize) -> Self {
        Self {
            events: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    pub fn add(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn has_full_batch(&self) -> bool {
        self.events.len() >= self.batch_size
    }

    pub fn take_all(&mut self) -> Vec<Event> {
        std::mem::replace(&mut self.events, Vec::with_capacity(self.batch_size))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
