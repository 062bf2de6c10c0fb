#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use saas_genie::pipeline::{
    GeneratedContent, IdeaGenerator, PipelineRunner, PublishOutcome, Publisher, Topic, TopicQuery,
    TopicSource, UpstreamError,
};

pub fn topic(title: &str, traffic: u64) -> Topic {
    Topic::new(title, traffic)
}

#[derive(Default)]
pub struct MockSource {
    pub topics: Vec<Topic>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockSource {
    pub fn returning(topics: Vec<Topic>) -> Arc<Self> {
        Arc::new(Self {
            topics,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicSource for MockSource {
    async fn fetch(&self, _query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::decode("google-trends", "feed unavailable"));
        }
        Ok(self.topics.clone())
    }
}

#[derive(Default)]
pub struct MockGenerator {
    pub text: String,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub received: Mutex<Vec<Vec<String>>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received_titles(&self) -> Vec<Vec<String>> {
        self.received.lock().expect("received lock").clone()
    }
}

#[async_trait]
impl IdeaGenerator for MockGenerator {
    async fn generate(&self, topics: &[Topic]) -> Result<GeneratedContent, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .expect("received lock")
            .push(topics.iter().map(|t| t.title.clone()).collect());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(UpstreamError::decode("openai", "model overloaded"));
        }
        Ok(GeneratedContent::new(self.text.clone(), topics.to_vec()))
    }

    async fn analyze(&self, topics: &[Topic]) -> Result<String, UpstreamError> {
        if self.fail {
            return Err(UpstreamError::decode("openai", "model overloaded"));
        }
        Ok(format!("analysis of {} topics", topics.len()))
    }
}

#[derive(Default)]
pub struct MockPublisher {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockPublisher {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, _content: &str, _topics: &[Topic]) -> Result<PublishOutcome, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::decode("forem", "article rejected"));
        }
        Ok(PublishOutcome {
            success: true,
            url: Some("https://dev.to/genie/ideias".into()),
            id: Some(99),
        })
    }
}

pub fn runner(
    max: usize,
    source: Arc<MockSource>,
    generator: Arc<MockGenerator>,
    publisher: Option<Arc<MockPublisher>>,
    publish_enabled: bool,
) -> PipelineRunner {
    PipelineRunner::builder(TopicQuery::new("BR", "pt", max), source, generator)
        .publisher(publisher.map(|p| p as Arc<dyn Publisher>))
        .publish_enabled(publish_enabled)
        .build()
}

