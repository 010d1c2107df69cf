mod host;
mod scheduler;

pub use host::{AlarmHost, TracingAlarmHost};
pub use scheduler::AlarmScheduler;
