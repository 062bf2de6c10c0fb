use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use saas_genie::{
    app::{ComponentRegistry, build_router},
    config::Config,
    observability,
    pipeline::{ExecutionResult, PublishStatus, RunContext, RunTrigger, TrendFeed},
    scheduler::spawn_status_reporter,
    shutdown,
};

/// トレンドから SaaS アイデアを生成し、任意で Forem に公開する。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    /// Run once against the daily trends feed
    #[default]
    Daily,
    /// Run once against the realtime trends feed
    Realtime,
    /// Fetch topics and log a trend analysis without publishing
    Analyze,
    /// Run on the configured cron schedule until SIGINT/SIGTERM
    Scheduler,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    observability::tracing::init(config.otel_exporter_endpoint(), config.otel_sampling_ratio())
        .context("failed to initialize tracing")?;
    install_panic_hook();
    config.log_summary();

    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;
    let mode = cli.mode.unwrap_or_default();
    info!(mode = ?mode, "saas genie starting");

    let outcome = match mode {
        Mode::Daily => run_once(&registry, TrendFeed::Daily).await,
        Mode::Realtime => run_once(&registry, TrendFeed::RealTime).await,
        Mode::Analyze => analyze(&registry).await,
        Mode::Scheduler => run_scheduler(&registry).await,
    };

    observability::tracing::shutdown();
    outcome
}

async fn run_once(registry: &ComponentRegistry, feed: TrendFeed) -> anyhow::Result<()> {
    let runner = registry.runner(feed);
    let context = RunContext::new(RunTrigger::OneShot);
    let result = runner.execute(&context).await;
    report_run(feed, result)
}

/// 1回の実行結果をログに出し、終了コードに対応する結果へ変換する。
///
/// 公開の失敗は警告に留め、トピック取得・アイデア生成の失敗のみをエラーとする。
fn report_run(feed: TrendFeed, result: ExecutionResult) -> anyhow::Result<()> {
    let run_id = result.run_id();
    let run = result
        .into_result()
        .with_context(|| format!("{} run {run_id} failed", feed.as_str()))?;

    info!(
        run_id = %run.run_id,
        topics = ?run.content.topic_titles(),
        ideas = %run.content.text,
        "saas ideas generated"
    );
    match &run.publish {
        PublishStatus::Published(outcome) => info!(
            run_id = %run.run_id,
            url = outcome.url.as_deref().unwrap_or_default(),
            "run finished with published article"
        ),
        PublishStatus::Skipped(reason) => info!(
            run_id = %run.run_id,
            reason = reason.as_str(),
            "run finished without publishing"
        ),
        PublishStatus::Failed(error) => warn!(
            run_id = %run.run_id,
            error = %error,
            "run finished but the article was not published"
        ),
    }
    Ok(())
}

async fn analyze(registry: &ComponentRegistry) -> anyhow::Result<()> {
    let context = RunContext::new(RunTrigger::OneShot);
    let analysis = registry
        .runner(TrendFeed::Daily)
        .analyze(&context)
        .await
        .with_context(|| format!("trend analysis {} failed", context.run_id))?;
    info!(run_id = %context.run_id, analysis = %analysis, "trend analysis completed");
    Ok(())
}

async fn run_scheduler(registry: &ComponentRegistry) -> anyhow::Result<()> {
    let config = registry.config();
    let scheduler = registry.scheduler();
    scheduler.start().context("failed to start scheduler")?;

    let reporter = spawn_status_reporter(Arc::clone(&scheduler), config.scheduler_status_interval());

    let server = match config.http_bind() {
        Some(bind_addr) => {
            let listener = TcpListener::bind(bind_addr)
                .await
                .with_context(|| format!("failed to bind listener on {bind_addr}"))?;
            info!(%bind_addr, "control plane listening");
            let router = build_router(registry.app_state());
            Some(tokio::spawn(async move {
                if let Err(error) = axum::serve(listener, router).await {
                    warn!(error = %error, "control plane exited with error");
                }
            }))
        }
        None => None,
    };

    let signal = shutdown::wait_for_signal()
        .await
        .context("failed to listen for shutdown signals")?;

    scheduler.stop();
    reporter.abort();
    if let Some(server) = server {
        server.abort();
    }
    info!(%signal, "saas genie stopped");
    Ok(())
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        match panic_info.location() {
            Some(location) => error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            ),
            None => error!(thread = thread_name, message, "panic occurred"),
        }
    }));
}
