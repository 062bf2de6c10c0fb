use async_trait::async_trait;

use super::{Topic, UpstreamError};

/// アイデア生成の出力。生成元のトピックも記事化のために保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub text: String,
    pub topics: Vec<Topic>,
}

impl GeneratedContent {
    pub fn new(text: impl Into<String>, topics: Vec<Topic>) -> Self {
        Self {
            text: text.into(),
            topics,
        }
    }

    /// 空白のみの出力も空とみなす。
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    #[must_use]
    pub fn topic_titles(&self) -> Vec<&str> {
        self.topics.iter().map(|topic| topic.title.as_str()).collect()
    }
}

#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    /// トピックから SaaS アイデアを生成する。空のトピック一覧も有効な入力として扱う。
    async fn generate(&self, topics: &[Topic]) -> Result<GeneratedContent, UpstreamError>;

    /// トピックの傾向分析テキストを生成する（`analyze` モード用）。
    async fn analyze(&self, topics: &[Topic]) -> Result<String, UpstreamError>;
}
