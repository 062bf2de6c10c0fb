use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::{sync::Mutex as AsyncMutex, task::JoinHandle, time::sleep};
use tracing::{info, warn};

use super::{
    SchedulerStatus,
    cron::{CronError, CronSchedule},
};
use crate::observability::metrics::Metrics;
use crate::pipeline::{CompletedRun, PipelineError, PipelineRunner, RunContext, RunTrigger};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression `{expression}`: {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: CronError,
    },
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

/// スケジューラ設定。構築後は変更しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub expression: String,
    /// IANA タイムゾーン名。未指定または空文字は UTC。
    pub timezone: Option<String>,
    pub enabled: bool,
    /// 実行中の回がある間は定期起動をスキップし、`run_now` は完了を待つ。
    pub single_flight: bool,
}

impl SchedulerConfig {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            timezone: None,
            enabled: true,
            single_flight: false,
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_single_flight(mut self, single_flight: bool) -> Self {
        self.single_flight = single_flight;
        self
    }

    /// 式とタイムゾーンを検証して解決する。
    ///
    /// # Errors
    /// 式が不正、またはタイムゾーンが未知の場合は [`ScheduleError`] を返す。
    pub fn resolve(&self) -> Result<(CronSchedule, Tz), ScheduleError> {
        let schedule = CronSchedule::parse(&self.expression).map_err(|source| {
            ScheduleError::InvalidExpression {
                expression: self.expression.clone(),
                source,
            }
        })?;

        let tz = match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))?,
        };

        Ok((schedule, tz))
    }
}

/// cron 式に従って `PipelineRunner` を定期実行する。
pub struct Scheduler {
    config: SchedulerConfig,
    runner: Arc<PipelineRunner>,
    metrics: Option<Arc<Metrics>>,
    gate: Option<Arc<AsyncMutex<()>>>,
    trigger: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        runner: Arc<PipelineRunner>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let gate = config
            .single_flight
            .then(|| Arc::new(AsyncMutex::new(())));
        Self {
            config,
            runner,
            metrics,
            gate,
            trigger: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// トリガーを登録する。
    ///
    /// 無効化されている場合は何も登録せずに成功する。既にトリガーが動いている
    /// 場合も何もしない。
    ///
    /// # Errors
    /// 式またはタイムゾーンが不正な場合は [`ScheduleError`] を返し、トリガーは登録されない。
    pub fn start(&self) -> Result<(), ScheduleError> {
        let (schedule, tz) = self.config.resolve()?;

        if !self.config.enabled {
            info!(
                expression = %self.config.expression,
                "scheduler disabled; no trigger registered"
            );
            return Ok(());
        }

        let mut slot = self.trigger.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            info!("scheduler already running; start ignored");
            return Ok(());
        }

        info!(
            expression = %schedule,
            timezone = %tz,
            single_flight = self.config.single_flight,
            "scheduler started"
        );
        let trigger = Trigger {
            schedule,
            tz,
            runner: Arc::clone(&self.runner),
            metrics: self.metrics.clone(),
            gate: self.gate.clone(),
        };
        *slot = Some(trigger.spawn());
        Ok(())
    }

    /// トリガーを解除する。実行中の回は中断しない。何度呼んでもよい。
    pub fn stop(&self) {
        let handle = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("scheduler stopped");
        }
    }

    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let running = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());

        let next_execution = if running {
            self.config
                .resolve()
                .ok()
                .and_then(|(schedule, tz)| schedule.next_after(Utc::now(), tz))
        } else {
            None
        };

        SchedulerStatus {
            running,
            next_execution,
        }
    }

    /// パイプラインを即時に1回実行する。
    ///
    /// # Errors
    /// トピック取得またはアイデア生成に失敗した場合は [`PipelineError`] を返す。
    pub async fn run_now(&self) -> Result<CompletedRun, PipelineError> {
        self.run_with(RunContext::new(RunTrigger::Manual)).await
    }

    pub(crate) async fn run_with(
        &self,
        context: RunContext,
    ) -> Result<CompletedRun, PipelineError> {
        let _permit = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        self.runner.execute(&context).await.into_result()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Trigger {
    schedule: CronSchedule,
    tz: Tz,
    runner: Arc<PipelineRunner>,
    metrics: Option<Arc<Metrics>>,
    gate: Option<Arc<AsyncMutex<()>>>,
}

impl Trigger {
    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut last_fired: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            // タイマーが早く起きても同じ時刻で二度発火しない
            let from = last_fired.map_or(now, |fired| fired.max(now));
            let Some(next) = self.schedule.next_after(from, self.tz) else {
                warn!(
                    expression = %self.schedule,
                    "schedule has no upcoming execution; trigger stopped"
                );
                return;
            };

            let wait = duration_until(next, now);
            info!(
                next_run_utc = %next.to_rfc3339(),
                next_run_local = %next.with_timezone(&self.tz).to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "next pipeline run scheduled"
            );
            sleep(wait).await;
            last_fired = Some(next);

            self.fire();
        }
    }

    fn fire(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.scheduler_ticks.inc();
        }

        let permit = match &self.gate {
            Some(gate) => match Arc::clone(gate).try_lock_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!("previous run still in flight; scheduled tick skipped");
                    if let Some(metrics) = &self.metrics {
                        metrics.scheduler_ticks_skipped.inc();
                    }
                    return;
                }
            },
            None => None,
        };

        let runner = Arc::clone(&self.runner);
        let context = RunContext::new(RunTrigger::Scheduled);
        tokio::spawn(async move {
            let _permit = permit;
            // 失敗の記録はランナー側で行い、トリガーは継続する
            let _ = runner.execute(&context).await;
        });
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
