//! Google Trends の dailytrends / realtimetrends を読むクライアント。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{build_http_client, endpoint, parse_base_url, read_body};
use crate::pipeline::{Topic, TopicQuery, TopicSource, TrendFeed, UpstreamError, rank_topics};

const SERVICE: &str = "google-trends";
/// JSON 本文の前に付く XSSI 対策のプレフィックス。
const XSSI_PREFIX: &str = ")]}'";
/// America/Sao_Paulo の UTC オフセット（分）。Trends API は符号を反転して受け取る。
const TZ_OFFSET_MINUTES: &str = "180";

#[derive(Debug, Clone)]
pub struct GoogleTrendsClient {
    client: Client,
    base_url: Url,
}

impl GoogleTrendsClient {
    /// # Errors
    /// HTTP クライアントの構築やベース URL の解析に失敗した場合はエラーを返す。
    pub fn new(base_url: &str, connect_timeout: Duration, total_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, connect_timeout, total_timeout)?,
            base_url: parse_base_url(SERVICE, base_url)?,
        })
    }

    async fn fetch_daily(&self, query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError> {
        let url = endpoint(SERVICE, &self.base_url, "dailytrends")?;
        let body = self
            .get(
                url,
                &[
                    ("hl", query.lang.as_str()),
                    ("geo", query.geo.as_str()),
                    ("tz", TZ_OFFSET_MINUTES),
                    ("ns", "15"),
                ],
            )
            .await?;
        let payload: DailyResponse = decode(&body)?;

        Ok(payload
            .default
            .trending_searches_days
            .into_iter()
            .flat_map(|day| day.trending_searches)
            .map(|search| {
                let traffic = parse_traffic(&search.formatted_traffic).unwrap_or_else(|| {
                    debug!(raw = %search.formatted_traffic, "unparseable traffic figure");
                    0
                });
                let article = search.articles.into_iter().next();
                Topic {
                    title: search.title.query,
                    traffic,
                    url: article.as_ref().and_then(|a| a.url.clone()),
                    snippet: article.and_then(|a| a.snippet),
                }
            })
            .collect())
    }

    async fn fetch_realtime(&self, query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError> {
        let url = endpoint(SERVICE, &self.base_url, "realtimetrends")?;
        let body = self
            .get(
                url,
                &[
                    ("hl", query.lang.as_str()),
                    ("geo", query.geo.as_str()),
                    ("tz", TZ_OFFSET_MINUTES),
                    ("cat", "all"),
                    ("fi", "0"),
                    ("fs", "0"),
                    ("ri", "300"),
                    ("rs", "20"),
                    ("sort", "0"),
                ],
            )
            .await?;
        let payload: RealtimeResponse = decode(&body)?;
        let stories = payload.story_summaries.trending_stories;
        let total = stories.len() as u64;

        // リアルタイムには検索数がないため上流の並び順で順位付けする
        Ok(stories
            .into_iter()
            .zip((1..=total).rev())
            .map(|(story, traffic)| {
                let article = story.articles.into_iter().next();
                Topic {
                    title: story.title,
                    traffic,
                    url: article.as_ref().and_then(|a| a.url.clone()),
                    snippet: article.and_then(|a| a.snippet),
                }
            })
            .collect())
    }

    async fn get(&self, url: Url, params: &[(&str, &str)]) -> Result<String, UpstreamError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|error| UpstreamError::transport(SERVICE, error))?;
        read_body(SERVICE, response).await
    }
}

#[async_trait]
impl TopicSource for GoogleTrendsClient {
    async fn fetch(&self, query: &TopicQuery) -> Result<Vec<Topic>, UpstreamError> {
        let topics = match query.feed {
            TrendFeed::Daily => self.fetch_daily(query).await?,
            TrendFeed::RealTime => self.fetch_realtime(query).await?,
        };
        debug!(feed = query.feed.as_str(), fetched = topics.len(), "trends feed decoded");
        Ok(rank_topics(topics, query.max_count))
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, UpstreamError> {
    let json = body.trim_start().strip_prefix(XSSI_PREFIX).unwrap_or(body);
    let json = json.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    serde_json::from_str(json).map_err(|error| UpstreamError::decode(SERVICE, error.to_string()))
}

/// `200K+` や `2,000+` 形式の検索ボリュームを数値にする。
fn parse_traffic(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('+')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let (number, multiplier) = match cleaned.chars().last()?.to_ascii_uppercase() {
        'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    let value = number.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((value * multiplier).round() as u64)
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    default: DailyDefault,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyDefault {
    #[serde(default)]
    trending_searches_days: Vec<TrendingDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingDay {
    #[serde(default)]
    trending_searches: Vec<TrendingSearch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingSearch {
    title: SearchTitle,
    #[serde(default)]
    formatted_traffic: String,
    #[serde(default)]
    articles: Vec<TrendArticle>,
}

#[derive(Debug, Deserialize)]
struct SearchTitle {
    query: String,
}

#[derive(Debug, Deserialize)]
struct TrendArticle {
    url: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeResponse {
    story_summaries: StorySummaries,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorySummaries {
    #[serde(default)]
    trending_stories: Vec<TrendingStory>,
}

#[derive(Debug, Deserialize)]
struct TrendingStory {
    title: String,
    #[serde(default)]
    articles: Vec<TrendArticle>,
}
