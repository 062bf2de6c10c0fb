/// Prometheusメトリクス定義。
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, Registry, register_counter_vec_with_registry,
    register_counter_with_registry, register_gauge_with_registry,
    register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub runs_completed: Counter,
    pub runs_failed: Counter,
    pub stage_failures: CounterVec,
    pub publish_results: CounterVec,
    pub scheduler_ticks: Counter,
    pub scheduler_ticks_skipped: Counter,

    // ヒストグラム
    pub run_duration: Histogram,

    // ゲージ
    pub runs_in_flight: Gauge,
}

impl Metrics {
    /// 指定されたレジストリにメトリクスを登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            runs_completed: register_counter_with_registry!(
                "saas_genie_runs_completed_total",
                "Pipeline runs that produced generated content",
                registry
            )?,
            runs_failed: register_counter_with_registry!(
                "saas_genie_runs_failed_total",
                "Pipeline runs aborted by a fetch or generation failure",
                registry
            )?,
            stage_failures: register_counter_vec_with_registry!(
                "saas_genie_stage_failures_total",
                "Stage failures by stage",
                &["stage"],
                registry
            )?,
            publish_results: register_counter_vec_with_registry!(
                "saas_genie_publish_results_total",
                "Publish stage results by status (published, skipped, failed)",
                &["status"],
                registry
            )?,
            scheduler_ticks: register_counter_with_registry!(
                "saas_genie_scheduler_ticks_total",
                "Scheduler trigger firings",
                registry
            )?,
            scheduler_ticks_skipped: register_counter_with_registry!(
                "saas_genie_scheduler_ticks_skipped_total",
                "Scheduler firings skipped because a run was already in flight",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                "saas_genie_run_duration_seconds",
                "Duration of a full pipeline run",
                vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0],
                registry
            )?,
            runs_in_flight: register_gauge_with_registry!(
                "saas_genie_runs_in_flight",
                "Pipeline runs currently executing",
                registry
            )?,
        })
    }
}
