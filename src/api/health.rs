use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    status: &'static str,
}

pub(crate) async fn live() -> Json<HealthReport> {
    Json(HealthReport { status: "live" })
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::api::{router, test_support};
    use crate::scheduler::SchedulerConfig;

    #[tokio::test]
    async fn live_reports_ok() {
        let app = router(test_support::state(SchedulerConfig::new("0 9 * * *")));

        let response = app
            .oneshot(Request::get("/health/live").body(Body::empty()).expect("request"))
            .await
            .expect("request succeeds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("valid json");
        assert_eq!(payload["status"], "live");
    }
}
