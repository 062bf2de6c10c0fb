use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use crate::{
    api,
    clients::{ForemClient, GoogleTrendsClient, OpenAiClient},
    config::Config,
    observability::Telemetry,
    pipeline::{IdeaGenerator, PipelineRunner, Publisher, TopicSource, TrendFeed},
    scheduler::Scheduler,
};

/// コントロールプレーンのハンドラが共有する状態。
#[derive(Clone)]
pub struct AppState {
    scheduler: Arc<Scheduler>,
    telemetry: Telemetry,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, telemetry: Telemetry) -> Self {
        Self {
            scheduler,
            telemetry,
        }
    }

    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    topic_source: Arc<dyn TopicSource>,
    idea_generator: Arc<dyn IdeaGenerator>,
    publisher: Option<Arc<dyn Publisher>>,
    scheduler: Arc<Scheduler>,
}

impl ComponentRegistry {
    /// 設定から外部クライアント・パイプライン・スケジューラをまとめて構築する。
    ///
    /// # Errors
    /// メトリクス登録や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;

        let topic_source: Arc<dyn TopicSource> = Arc::new(
            GoogleTrendsClient::new(
                config.trends_base_url(),
                config.upstream_connect_timeout(),
                config.upstream_timeout(),
            )
            .context("failed to build google-trends client")?,
        );
        let idea_generator: Arc<dyn IdeaGenerator> = Arc::new(
            OpenAiClient::new(
                config.openai_base_url(),
                config.openai_api_key(),
                config.openai_model(),
                config.upstream_connect_timeout(),
                config.llm_timeout(),
            )
            .context("failed to build openai client")?,
        );
        let publisher = config
            .forem_api_key()
            .map(|api_key| {
                ForemClient::new(
                    config.forem_base_url(),
                    api_key,
                    config.upstream_connect_timeout(),
                    config.upstream_timeout(),
                )
                .map(|client| {
                    Arc::new(client.as_draft(config.forem_publish_as_draft())) as Arc<dyn Publisher>
                })
            })
            .transpose()
            .context("failed to build forem client")?;

        let daily_runner = assemble_runner(
            &config,
            &telemetry,
            &topic_source,
            &idea_generator,
            publisher.as_ref(),
            TrendFeed::Daily,
        );
        let scheduler = Arc::new(Scheduler::new(
            config.scheduler_config(),
            Arc::new(daily_runner),
            Some(telemetry.metrics()),
        ));

        Ok(Self {
            config,
            telemetry,
            topic_source,
            idea_generator,
            publisher,
            scheduler,
        })
    }

    /// 指定フィードを対象にしたパイプラインを組み立てる。
    #[must_use]
    pub fn runner(&self, feed: TrendFeed) -> PipelineRunner {
        assemble_runner(
            &self.config,
            &self.telemetry,
            &self.topic_source,
            &self.idea_generator,
            self.publisher.as_ref(),
            feed,
        )
    }

    #[must_use]
    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState::new(self.scheduler(), self.telemetry.clone())
    }
}

fn assemble_runner(
    config: &Config,
    telemetry: &Telemetry,
    topic_source: &Arc<dyn TopicSource>,
    idea_generator: &Arc<dyn IdeaGenerator>,
    publisher: Option<&Arc<dyn Publisher>>,
    feed: TrendFeed,
) -> PipelineRunner {
    PipelineRunner::builder(
        config.topic_query(feed),
        Arc::clone(topic_source),
        Arc::clone(idea_generator),
    )
    .publisher(publisher.cloned())
    .publish_enabled(config.publish_article())
    .metrics(telemetry.metrics())
    .build()
}

pub fn build_router(state: AppState) -> Router {
    api::router(state)
}
