use axum::{Json, extract::State};

use crate::app::AppState;
use crate::scheduler::SchedulerStatus;

pub(crate) async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler().status())
}
