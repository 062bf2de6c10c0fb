use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "saas-genie";

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `otlp_endpoint` が指定されていれば OTLP エクスポーターでもトレースを送信する。
/// エクスポーターの構築に失敗した場合は JSON ログのみで続行する。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init(otlp_endpoint: Option<&str>, sampling_ratio: f64) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        let tracer = otlp_endpoint.map(|endpoint| (endpoint, init_tracer(endpoint, sampling_ratio)));
        match tracer {
            Some((endpoint, Ok(tracer))) => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init()
                    .map_err(|e| Error::msg(e.to_string()))?;
                info!(
                    otel_enabled = true,
                    endpoint = %endpoint,
                    sampling_ratio,
                    "tracing initialized with OpenTelemetry"
                );
            }
            Some((_, Err(error))) => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e| Error::msg(e.to_string()))?;
                warn!(
                    otel_enabled = false,
                    error = %error,
                    "tracing initialized without OpenTelemetry (exporter init failed)"
                );
            }
            None => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e| Error::msg(e.to_string()))?;
                info!(otel_enabled = false, "tracing initialized");
            }
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

fn init_tracer(endpoint: &str, sampling_ratio: f64) -> Result<SdkTracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(provider.clone());
    // shutdown() で未送信スパンを流すために保持する
    let _ = TRACER_PROVIDER.set(provider);

    Ok(tracer)
}

/// 未送信のスパンをフラッシュしてエクスポーターを閉じる。OTLP 無効時は何もしない。
pub fn shutdown() {
    let Some(provider) = TRACER_PROVIDER.get() else {
        return;
    };
    if let Err(error) = provider.shutdown() {
        warn!(error = %error, "failed to shut down tracer provider");
    }
}
