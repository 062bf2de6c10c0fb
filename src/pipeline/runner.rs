use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{
    CompletedRun, ExecutionResult, GeneratedContent, IdeaGenerator, PipelineError, PublishStatus,
    Publisher, RunContext, SkipReason, Topic, TopicQuery, TopicSource, rank_topics,
};
use crate::observability::metrics::Metrics;

/// トピック取得 → アイデア生成 → 記事公開 を1回分実行する。
///
/// 実行間で状態を持たないため、`Arc` で共有して並行に呼び出してよい。
pub struct PipelineRunner {
    query: TopicQuery,
    publish_enabled: bool,
    topic_source: Arc<dyn TopicSource>,
    idea_generator: Arc<dyn IdeaGenerator>,
    publisher: Option<Arc<dyn Publisher>>,
    metrics: Option<Arc<Metrics>>,
}

pub struct PipelineBuilder {
    query: TopicQuery,
    publish_enabled: bool,
    topic_source: Arc<dyn TopicSource>,
    idea_generator: Arc<dyn IdeaGenerator>,
    publisher: Option<Arc<dyn Publisher>>,
    metrics: Option<Arc<Metrics>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn publisher(mut self, publisher: Option<Arc<dyn Publisher>>) -> Self {
        self.publisher = publisher;
        self
    }

    #[must_use]
    pub fn publish_enabled(mut self, enabled: bool) -> Self {
        self.publish_enabled = enabled;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineRunner {
        PipelineRunner {
            query: self.query,
            publish_enabled: self.publish_enabled,
            topic_source: self.topic_source,
            idea_generator: self.idea_generator,
            publisher: self.publisher,
            metrics: self.metrics,
        }
    }
}

impl PipelineRunner {
    pub fn builder(
        query: TopicQuery,
        topic_source: Arc<dyn TopicSource>,
        idea_generator: Arc<dyn IdeaGenerator>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            query,
            publish_enabled: false,
            topic_source,
            idea_generator,
            publisher: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn query(&self) -> &TopicQuery {
        &self.query
    }

    /// パイプラインを1回実行する。
    ///
    /// ステージ1・2の失敗は `ExecutionResult::Failed` になる。公開の失敗は
    /// `PublishStatus::Failed` として `Completed` に含まれ、生成結果は失われない。
    pub async fn execute(&self, context: &RunContext) -> ExecutionResult {
        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.runs_in_flight.inc();
        }

        info!(
            run_id = %context.run_id,
            trigger = context.trigger.as_str(),
            feed = self.query.feed.as_str(),
            geo = %self.query.geo,
            lang = %self.query.lang,
            max_count = self.query.max_count,
            "pipeline run started"
        );

        let result = self.run_stages(context).await;

        if let Some(metrics) = &self.metrics {
            metrics.runs_in_flight.dec();
            metrics.run_duration.observe(started.elapsed().as_secs_f64());
            match &result {
                ExecutionResult::Completed(run) => {
                    metrics.runs_completed.inc();
                    metrics
                        .publish_results
                        .with_label_values(&[run.publish.label()])
                        .inc();
                }
                ExecutionResult::Failed { stage, .. } => {
                    metrics.runs_failed.inc();
                    metrics
                        .stage_failures
                        .with_label_values(&[stage.as_str()])
                        .inc();
                }
            }
        }

        match &result {
            ExecutionResult::Completed(run) => info!(
                run_id = %context.run_id,
                publish = run.publish.label(),
                elapsed_ms = started.elapsed().as_millis(),
                "pipeline run completed"
            ),
            ExecutionResult::Failed { stage, error, .. } => error!(
                run_id = %context.run_id,
                stage = stage.as_str(),
                error = %error,
                elapsed_ms = started.elapsed().as_millis(),
                "pipeline run failed"
            ),
        }

        result
    }

    /// トピックを取得し、傾向分析テキストを返す。公開は行わない。
    ///
    /// # Errors
    /// トピック取得または分析生成に失敗した場合は [`PipelineError`] を返す。
    pub async fn analyze(&self, context: &RunContext) -> Result<String, PipelineError> {
        let topics = self.fetch_topics(context).await?;
        let analysis = self
            .idea_generator
            .analyze(&topics)
            .await
            .map_err(PipelineError::Generation)?;
        info!(run_id = %context.run_id, chars = analysis.len(), "trend analysis generated");
        Ok(analysis)
    }

    async fn run_stages(&self, context: &RunContext) -> ExecutionResult {
        let topics = match self.fetch_topics(context).await {
            Ok(topics) => topics,
            Err(error) => return ExecutionResult::failed(context.run_id, error),
        };

        let content = match self.idea_generator.generate(&topics).await {
            Ok(content) => content,
            Err(source) => {
                return ExecutionResult::failed(context.run_id, PipelineError::Generation(source));
            }
        };
        info!(
            run_id = %context.run_id,
            chars = content.text.len(),
            "ideas generated"
        );

        let publish = self.publish(context, &content).await;

        ExecutionResult::Completed(CompletedRun {
            run_id: context.run_id,
            content,
            publish,
        })
    }

    async fn fetch_topics(&self, context: &RunContext) -> Result<Vec<Topic>, PipelineError> {
        let fetched = self
            .topic_source
            .fetch(&self.query)
            .await
            .map_err(PipelineError::TopicFetch)?;
        let topics = rank_topics(fetched, self.query.max_count);

        info!(
            run_id = %context.run_id,
            count = topics.len(),
            topics = ?topics.iter().map(|topic| topic.title.as_str()).collect::<Vec<_>>(),
            "trending topics fetched"
        );
        Ok(topics)
    }

    async fn publish(&self, context: &RunContext, content: &GeneratedContent) -> PublishStatus {
        let publisher = match self.skip_reason(content) {
            Ok(publisher) => publisher,
            Err(reason) => {
                info!(
                    run_id = %context.run_id,
                    reason = reason.as_str(),
                    "publish stage skipped"
                );
                return PublishStatus::Skipped(reason);
            }
        };

        match publisher.publish(&content.text, &content.topics).await {
            Ok(outcome) => {
                info!(
                    run_id = %context.run_id,
                    url = outcome.url.as_deref().unwrap_or_default(),
                    id = ?outcome.id,
                    "article published"
                );
                PublishStatus::Published(outcome)
            }
            Err(error) => {
                warn!(
                    run_id = %context.run_id,
                    error = %error,
                    "article publishing failed; generated ideas are kept"
                );
                PublishStatus::Failed(error)
            }
        }
    }

    fn skip_reason(&self, content: &GeneratedContent) -> Result<&Arc<dyn Publisher>, SkipReason> {
        if !self.publish_enabled {
            return Err(SkipReason::Disabled);
        }
        let Some(publisher) = self.publisher.as_ref() else {
            return Err(SkipReason::NoPublisher);
        };
        if content.is_blank() {
            return Err(SkipReason::EmptyContent);
        }
        Ok(publisher)
    }
}
