use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{task::JoinHandle, time::interval};
use tracing::info;

use super::Scheduler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub next_execution: Option<DateTime<Utc>>,
}

/// スケジューラの状態を一定間隔でログに出す。最初の1回は即時。
pub fn spawn_status_reporter(scheduler: Arc<Scheduler>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let status = scheduler.status();
            info!(
                running = status.running,
                next_execution = %status
                    .next_execution
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                "scheduler status"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_json() {
        let status = SchedulerStatus {
            running: false,
            next_execution: None,
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "running": false, "next_execution": null })
        );
    }
}
