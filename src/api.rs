pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod runs;
pub(crate) mod status;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/scheduler/status", get(status::scheduler_status))
        .route("/v1/runs", post(runs::trigger_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::app::AppState;
    use crate::observability::Telemetry;
    use crate::pipeline::{
        GeneratedContent, IdeaGenerator, PipelineRunner, Topic, TopicQuery, TopicSource,
        UpstreamError,
    };
    use crate::scheduler::{Scheduler, SchedulerConfig};

    pub(crate) struct FixedSource;

    #[async_trait]
    impl TopicSource for FixedSource {
        async fn fetch(&self, _query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError> {
            Ok(vec![Topic::new("copa", 10)])
        }
    }

    pub(crate) struct FixedGenerator;

    #[async_trait]
    impl IdeaGenerator for FixedGenerator {
        async fn generate(&self, topics: &[Topic]) -> Result<GeneratedContent, UpstreamError> {
            Ok(GeneratedContent::new("ideias", topics.to_vec()))
        }

        async fn analyze(&self, _topics: &[Topic]) -> Result<String, UpstreamError> {
            Ok("analysis".into())
        }
    }

    pub(crate) fn state(config: SchedulerConfig) -> AppState {
        let telemetry = Telemetry::new().expect("telemetry");
        let runner = PipelineRunner::builder(
            TopicQuery::new("BR", "pt", 5),
            Arc::new(FixedSource),
            Arc::new(FixedGenerator),
        )
        .metrics(telemetry.metrics())
        .build();
        let scheduler = Scheduler::new(config, Arc::new(runner), Some(telemetry.metrics()));
        AppState::new(Arc::new(scheduler), telemetry)
    }
}
