pub mod metrics;
pub mod tracing;

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// プロセス単位のメトリクスレジストリ。
#[derive(Clone)]
pub struct Telemetry {
    registry: Registry,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// # Errors
    /// メトリクスの登録に失敗した場合はエラーを返す。
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).context("failed to register metrics")?;
        Ok(Self {
            registry,
            metrics: Arc::new(metrics),
        })
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Prometheus テキスト形式で出力する。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(error) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            ::tracing::warn!(error = %error, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
