pub mod clock;
pub mod coordinator;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{FlushConfig, FlushCoordinator, FlushType, PrepareHook};
pub use scheduler::{ManualScheduler, Scheduler, TimerCallback, TimerHandle, TokioScheduler};
