use async_trait::async_trait;

use super::{Topic, UpstreamError};

/// 1回の公開試行の結果。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    pub success: bool,
    pub url: Option<String>,
    pub id: Option<u64>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, content: &str, topics: &[Topic])
    -> Result<PublishOutcome, UpstreamError>;
}

/// 公開ステージを実行しなかった理由。いずれもエラーではない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoPublisher,
    EmptyContent,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "publishing disabled",
            Self::NoPublisher => "no publisher",
            Self::EmptyContent => "empty content",
        }
    }
}

#[derive(Debug)]
pub enum PublishStatus {
    Published(PublishOutcome),
    Skipped(SkipReason),
    /// 公開に失敗したが、生成済みコンテンツは保持されている。
    Failed(UpstreamError),
}

impl PublishStatus {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Published(_) => "published",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&PublishOutcome> {
        match self {
            Self::Published(outcome) => Some(outcome),
            _ => None,
        }
    }

    #[must_use]
    pub fn warning(&self) -> Option<&UpstreamError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}
