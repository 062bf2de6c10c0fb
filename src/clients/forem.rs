use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{build_http_client, endpoint, parse_base_url, read_json};
use crate::pipeline::{PublishOutcome, Publisher, Topic, UpstreamError};

const SERVICE: &str = "forem";
const TAGS: [&str; 4] = ["saas", "startup", "tendencias", "negocios"];
const TITLE_TOPICS: usize = 3;

/// Forem (dev.to) に記事を投稿する。
#[derive(Debug, Clone)]
pub struct ForemClient {
    client: Client,
    base_url: Url,
    api_key: String,
    as_draft: bool,
}

impl ForemClient {
    /// # Errors
    /// HTTP クライアントの構築やベース URL の解析に失敗した場合はエラーを返す。
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, connect_timeout, total_timeout)?,
            base_url: parse_base_url(SERVICE, base_url)?,
            api_key: api_key.into(),
            as_draft: false,
        })
    }

    /// 公開せず下書きとして作成する。
    #[must_use]
    pub fn as_draft(mut self, as_draft: bool) -> Self {
        self.as_draft = as_draft;
        self
    }
}

#[async_trait]
impl Publisher for ForemClient {
    async fn publish(&self, content: &str, topics: &[Topic]) -> Result<PublishOutcome, UpstreamError> {
        let url = endpoint(SERVICE, &self.base_url, "articles")?;
        let request = ArticleRequest {
            article: Article::compose(content, topics, !self.as_draft),
        };

        let response = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| UpstreamError::transport(SERVICE, error))?;
        let created: ArticleResponse = read_json(SERVICE, response).await?;

        if self.as_draft {
            let id = created
                .id
                .ok_or_else(|| UpstreamError::decode(SERVICE, "draft response has no id"))?;
            return Ok(PublishOutcome {
                success: true,
                url: created.url,
                id: Some(id),
            });
        }

        let url = created
            .url
            .ok_or_else(|| UpstreamError::decode(SERVICE, "published response has no url"))?;
        Ok(PublishOutcome {
            success: true,
            url: Some(url),
            id: created.id,
        })
    }
}

#[derive(Debug, Serialize)]
struct ArticleRequest {
    article: Article,
}

#[derive(Debug, Serialize)]
struct Article {
    title: String,
    body_markdown: String,
    published: bool,
    tags: [&'static str; 4],
    description: String,
}

impl Article {
    fn compose(content: &str, topics: &[Topic], published: bool) -> Self {
        let headline = topics
            .iter()
            .take(TITLE_TOPICS)
            .map(|topic| topic.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let all_topics = topics
            .iter()
            .map(|topic| topic.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let title = format!("💡 Ideias de SaaS Baseadas nas Tendências: {headline}");

        let body_markdown = format!(
            "# {title}\n\n\
             {content}\n\n\
             ---\n\n\
             *Este artigo foi gerado automaticamente pelo SaaS Genie, uma ferramenta que \
             identifica tendências e gera ideias de negócios SaaS inovadores.*\n\n\
             **Tópicos em alta analisados:** {all_topics}\n\n\
             #saas #startup #tendencias #negocios #inovacao"
        );

        Self {
            description: format!(
                "Ideias inovadoras de SaaS baseadas nas tendências atuais: {headline}"
            ),
            title,
            body_markdown,
            published,
            tags: TAGS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    id: Option<u64>,
    url: Option<String>,
}
