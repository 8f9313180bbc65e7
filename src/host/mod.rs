pub mod lifecycle;

pub use lifecycle::{HostLifecycle, UnloadProbe, Visibility};
