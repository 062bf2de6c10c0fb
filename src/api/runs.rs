use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::pipeline::{RunContext, RunTrigger};

#[derive(Debug, Serialize)]
struct RunAccepted {
    run_id: Uuid,
    status: &'static str,
}

/// 手動実行をバックグラウンドで開始し、すぐに 202 を返す。
pub(crate) async fn trigger_run(State(state): State<AppState>) -> impl IntoResponse {
    let context = RunContext::new(RunTrigger::Api);
    let run_id = context.run_id;
    let scheduler = std::sync::Arc::clone(state.scheduler());

    tokio::spawn(async move {
        match scheduler.run_with(context).await {
            Ok(run) => info!(%run_id, publish = run.publish.label(), "api-triggered run finished"),
            Err(error) => error!(%run_id, error = %error, "api-triggered run failed"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            run_id,
            status: "accepted",
        }),
    )
}
