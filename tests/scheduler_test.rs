mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockGenerator, MockPublisher, MockSource, runner, topic};
use saas_genie::observability::Telemetry;
use saas_genie::pipeline::{PipelineError, PublishStatus};
use saas_genie::scheduler::{ScheduleError, Scheduler, SchedulerConfig};

const EVERY_SECOND: &str = "* * * * * *";

fn scheduler_with(config: SchedulerConfig, generator: Arc<MockGenerator>) -> Scheduler {
    let runner = runner(
        5,
        MockSource::returning(vec![topic("copa", 10)]),
        generator,
        None,
        false,
    );
    Scheduler::new(config, Arc::new(runner), None)
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

#[tokio::test]
async fn disabled_scheduler_registers_no_trigger() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("0 9 * * *").with_enabled(false),
        MockGenerator::replying("ideias"),
    );

    scheduler.start().expect("disabled start is not an error");

    let status = scheduler.status();
    assert!(!status.running);
    assert!(status.next_execution.is_none());
}

#[tokio::test]
async fn malformed_expression_fails_without_trigger() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("61 * * * *"),
        MockGenerator::replying("ideias"),
    );

    let error = scheduler.start().expect_err("malformed expression");

    assert!(matches!(error, ScheduleError::InvalidExpression { .. }));
    assert!(!scheduler.status().running);
}

#[tokio::test]
async fn malformed_expression_is_rejected_even_when_disabled() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("not cron").with_enabled(false),
        MockGenerator::replying("ideias"),
    );

    assert!(scheduler.start().is_err());
}

#[tokio::test]
async fn unknown_timezone_fails_without_trigger() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("0 9 * * *").with_timezone("Atlantis/Capital"),
        MockGenerator::replying("ideias"),
    );

    assert!(matches!(
        scheduler.start(),
        Err(ScheduleError::UnknownTimezone(_))
    ));
    assert!(!scheduler.status().running);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("0 9 * * *"),
        MockGenerator::replying("ideias"),
    );

    scheduler.stop();
    scheduler.stop();

    scheduler.start().expect("start succeeds");
    assert!(scheduler.status().running);
    assert!(scheduler.status().next_execution.is_some());

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.status().running);
}

#[tokio::test]
async fn second_start_keeps_the_live_trigger() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("0 9 * * *").with_timezone("America/Sao_Paulo"),
        MockGenerator::replying("ideias"),
    );

    scheduler.start().expect("first start");
    scheduler.start().expect("second start is a no-op");

    assert!(scheduler.status().running);
    scheduler.stop();
    assert!(!scheduler.status().running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trigger_fires_on_schedule() {
    let generator = MockGenerator::replying("ideias");
    let scheduler = scheduler_with(SchedulerConfig::new(EVERY_SECOND), generator.clone());

    scheduler.start().expect("start succeeds");
    let fired = wait_until(Duration::from_secs(4), || generator.calls() >= 2).await;
    scheduler.stop();

    assert!(fired, "expected at least two scheduled runs");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_runs_keep_the_trigger_alive() {
    let generator = MockGenerator::failing();
    let scheduler = scheduler_with(SchedulerConfig::new(EVERY_SECOND), generator.clone());

    scheduler.start().expect("start succeeds");
    let fired = wait_until(Duration::from_secs(4), || generator.calls() >= 2).await;

    assert!(fired, "trigger kept firing after a failed run");
    assert!(scheduler.status().running);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_runs_do_not_block_the_trigger_by_default() {
    let generator = MockGenerator::slow("ideias", Duration::from_millis(2500));
    let scheduler = scheduler_with(SchedulerConfig::new(EVERY_SECOND), generator.clone());

    scheduler.start().expect("start succeeds");
    let overlapped = wait_until(Duration::from_secs(4), || generator.calls() >= 2).await;
    scheduler.stop();

    assert!(overlapped, "a second run started while the first was in flight");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_flight_skips_overlapping_ticks() {
    let telemetry = Telemetry::new().expect("telemetry");
    let metrics = telemetry.metrics();
    let generator = MockGenerator::slow("ideias", Duration::from_secs(3));
    let runner = runner(
        5,
        MockSource::returning(vec![topic("copa", 10)]),
        generator.clone(),
        None,
        false,
    );
    let scheduler = Scheduler::new(
        SchedulerConfig::new(EVERY_SECOND).with_single_flight(true),
        Arc::new(runner),
        Some(Arc::clone(&metrics)),
    );

    scheduler.start().expect("start succeeds");
    let skipped = wait_until(Duration::from_secs(4), || {
        metrics.scheduler_ticks_skipped.get() >= 1.0
    })
    .await;
    scheduler.stop();

    assert!(skipped, "a tick was skipped while the run was in flight");
    assert_eq!(generator.calls(), 1);
    assert!(metrics.scheduler_ticks.get() >= 2.0);
}

#[tokio::test]
async fn run_now_surfaces_stage_errors() {
    let scheduler = scheduler_with(
        SchedulerConfig::new("0 9 * * *").with_enabled(false),
        MockGenerator::failing(),
    );

    let error = scheduler.run_now().await.expect_err("generation fails");

    assert!(matches!(error, PipelineError::Generation(_)));
}

#[tokio::test]
async fn run_now_treats_publish_failure_as_success() {
    let publisher = MockPublisher::failing();
    let runner = runner(
        5,
        MockSource::returning(vec![topic("copa", 10)]),
        MockGenerator::replying("ideias"),
        Some(publisher.clone()),
        true,
    );
    let scheduler = Scheduler::new(SchedulerConfig::new("0 9 * * *"), Arc::new(runner), None);

    let run = scheduler.run_now().await.expect("publish failure is not fatal");

    assert_eq!(run.content.text, "ideias");
    assert!(matches!(run.publish, PublishStatus::Failed(_)));
    assert_eq!(publisher.calls(), 1);
}
