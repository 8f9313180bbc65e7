pub mod batch;
pub mod pending;
pub mod queue;

pub use batch::Batch;
pub use pending::PendingEvents;
pub use queue::BatchQueue;

/// Events per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Upper bound on unsent batches held in memory.
pub const MAX_PENDING_BATCHES: usize = 10;
