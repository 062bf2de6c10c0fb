pub mod forem;
pub mod google_trends;
pub mod openai;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::pipeline::UpstreamError;

pub use forem::ForemClient;
pub use google_trends::GoogleTrendsClient;
pub use openai::OpenAiClient;

const USER_AGENT: &str = concat!("saas-genie/", env!("CARGO_PKG_VERSION"));

/// 接続・全体タイムアウト付きの HTTP クライアントを作る。
pub(crate) fn build_http_client(
    service: &'static str,
    connect_timeout: Duration,
    total_timeout: Duration,
) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .timeout(total_timeout)
        .build()
        .with_context(|| format!("failed to build {service} client"))
}

/// ベース URL を解析する。`join` が最後のパス要素を置き換えないよう末尾に `/` を補う。
pub(crate) fn parse_base_url(service: &'static str, raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("invalid {service} base URL: {raw}"))
}

pub(crate) fn endpoint(service: &'static str, base: &Url, path: &str) -> Result<Url, UpstreamError> {
    base.join(path)
        .map_err(|error| UpstreamError::decode(service, format!("invalid endpoint {path}: {error}")))
}

/// 成功ステータスであることを確認し、本文を文字列で返す。
pub(crate) async fn read_body(service: &'static str, response: Response) -> Result<String, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::status(service, status, &body));
    }
    response
        .text()
        .await
        .map_err(|error| UpstreamError::transport(service, error))
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, UpstreamError> {
    let body = read_body(service, response).await?;
    serde_json::from_str(&body).map_err(|error| UpstreamError::decode(service, error.to_string()))
}
