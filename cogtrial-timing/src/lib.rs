pub mod set;
pub mod stats;
pub mod timer;

pub use set::{TimerHandle, TimerSet};
pub use stats::{LatencyStats, LatencySummary};
pub use timer::{HighPrecisionTimer, ManualTimer, TimestampMethod, Timer};
