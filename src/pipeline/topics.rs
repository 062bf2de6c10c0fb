use std::cmp::Reverse;

use async_trait::async_trait;
use serde::Serialize;

use super::UpstreamError;

/// トレンドとして取得したトピック。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub title: String,
    /// 検索ボリュームなどの順位付け指標。大きいほど上位。
    pub traffic: u64,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

impl Topic {
    pub fn new(title: impl Into<String>, traffic: u64) -> Self {
        Self {
            title: title.into(),
            traffic,
            url: None,
            snippet: None,
        }
    }
}

/// どのトレンドフィードから取得するか。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendFeed {
    #[default]
    Daily,
    RealTime,
}

impl TrendFeed {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::RealTime => "realtime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicQuery {
    pub geo: String,
    pub lang: String,
    pub max_count: usize,
    pub feed: TrendFeed,
}

impl TopicQuery {
    pub fn new(geo: impl Into<String>, lang: impl Into<String>, max_count: usize) -> Self {
        Self {
            geo: geo.into(),
            lang: lang.into(),
            max_count,
            feed: TrendFeed::Daily,
        }
    }

    #[must_use]
    pub fn with_feed(mut self, feed: TrendFeed) -> Self {
        self.feed = feed;
        self
    }
}

#[async_trait]
pub trait TopicSource: Send + Sync {
    /// トラフィック降順・`max_count` 件以内のトピック一覧を返す。
    async fn fetch(&self, query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError>;
}

/// トラフィック降順に並べ替え、上位 `max_count` 件に切り詰める。
///
/// 同じトラフィックのトピックは上流の順序を保つ（安定ソート）。
#[must_use]
pub fn rank_topics(mut topics: Vec<Topic>, max_count: usize) -> Vec<Topic> {
    topics.sort_by_key(|topic| Reverse(topic.traffic));
    topics.truncate(max_count);
    topics
}
