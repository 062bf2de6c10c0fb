pub mod cron;
pub mod status;
pub mod trigger;

pub use cron::{CronError, CronSchedule};
pub use status::{SchedulerStatus, spawn_status_reporter};
pub use trigger::{ScheduleError, Scheduler, SchedulerConfig};
