use reqwest::StatusCode;
use thiserror::Error;

use super::Stage;

/// 上流の HTTP エラー本文はこの長さで切り詰めてから保持する。
const MAX_ERROR_BODY_CHARS: usize = 512;

/// 外部サービス（Trends / OpenAI / Forem）呼び出しの失敗。
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned error status {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{service} returned an unexpected payload: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    pub(crate) fn transport(service: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { service, source }
    }

    pub(crate) fn status(service: &'static str, status: StatusCode, body: &str) -> Self {
        Self::Status {
            service,
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }

    pub fn decode(service: &'static str, detail: impl Into<String>) -> Self {
        Self::Decode {
            service,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. } => service,
        }
    }
}

/// 1回のパイプライン実行を中断させる失敗。ステージ1・2のみが該当する。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch trending topics: {0}")]
    TopicFetch(#[source] UpstreamError),
    #[error("failed to generate ideas: {0}")]
    Generation(#[source] UpstreamError),
}

impl PipelineError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::TopicFetch(_) => Stage::Fetch,
            Self::Generation(_) => Stage::Generate,
        }
    }

    #[must_use]
    pub fn upstream(&self) -> &UpstreamError {
        match self {
            Self::TopicFetch(inner) | Self::Generation(inner) => inner,
        }
    }
}
