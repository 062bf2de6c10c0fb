use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_http_client, endpoint, parse_base_url, read_json};
use crate::pipeline::{GeneratedContent, IdeaGenerator, Topic, UpstreamError};

const SERVICE: &str = "openai";

/// Chat Completions API でアイデア生成と傾向分析を行う。
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// # Errors
    /// HTTP クライアントの構築やベース URL の解析に失敗した場合はエラーを返す。
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        connect_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, connect_timeout, total_timeout)?,
            base_url: parse_base_url(SERVICE, base_url)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let url = endpoint(SERVICE, &self.base_url, "chat/completions")?;
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "sending chat completion");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| UpstreamError::transport(SERVICE, error))?;

        let payload: ChatResponse = read_json(SERVICE, response).await?;
        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::decode(SERVICE, "response contained no choices"))?;

        // null の本文は空文字として扱う
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl IdeaGenerator for OpenAiClient {
    async fn generate(&self, topics: &[Topic]) -> Result<GeneratedContent, UpstreamError> {
        let text = self.complete(&ideas_prompt(topics)).await?;
        Ok(GeneratedContent::new(text, topics.to_vec()))
    }

    async fn analyze(&self, topics: &[Topic]) -> Result<String, UpstreamError> {
        self.complete(&analysis_prompt(topics)).await
    }
}

fn joined_titles(topics: &[Topic]) -> String {
    topics
        .iter()
        .map(|topic| topic.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn ideas_prompt(topics: &[Topic]) -> String {
    format!(
        "Os seguintes tópicos estão em alta no Brasil: {}.\n\
         Crie até 5 ideias de projetos SaaS inovadores que aproveitem essas tendências.\n\
         Para cada ideia, descreva:\n\
         - Tópico em alta\n\
         - Nome do SaaS\n\
         - Problema que resolve\n\
         - Público-alvo\n\
         - Solução\n\
         - Modelo de monetização\n",
        joined_titles(topics)
    )
}

fn analysis_prompt(topics: &[Topic]) -> String {
    format!(
        "Analise os seguintes tópicos em alta no Brasil: {}.\n\
         Forneça uma análise detalhada incluindo:\n\
         - Por que esses tópicos estão em alta\n\
         - Oportunidades de negócio identificadas\n\
         - Tendências de mercado relacionadas\n\
         - Recomendações para empreendedores\n",
        joined_titles(topics)
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            &format!("{}/v1", server.uri()),
            "sk-test",
            "gpt-4o-mini",
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .expect("client should build")
    }

    fn reply(content: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    #[test]
    fn prompt_lists_topics_in_order() {
        let prompt = ideas_prompt(&[Topic::new("copa", 2), Topic::new("chuva", 1)]);
        assert!(prompt.contains("copa, chuva"));
        assert!(prompt.contains("Modelo de monetização"));
    }

    #[tokio::test]
    async fn generate_returns_text_with_topics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(reply(serde_json::json!("1. CopaHub")))
            .expect(1)
            .mount(&server)
            .await;

        let topics = vec![Topic::new("copa", 10)];
        let content = client(&server)
            .generate(&topics)
            .await
            .expect("generation succeeds");

        assert_eq!(content.text, "1. CopaHub");
        assert_eq!(content.topics, topics);
    }

    #[tokio::test]
    async fn empty_topic_list_is_valid_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply(serde_json::json!("ideias genéricas")))
            .mount(&server)
            .await;

        let content = client(&server).generate(&[]).await.expect("generation succeeds");
        assert!(content.topics.is_empty());
        assert!(!content.is_blank());
    }

    #[tokio::test]
    async fn null_content_becomes_blank_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply(serde_json::Value::Null))
            .mount(&server)
            .await;

        let content = client(&server)
            .generate(&[Topic::new("copa", 1)])
            .await
            .expect("generation succeeds");
        assert!(content.is_blank());
    }

    #[tokio::test]
    async fn missing_choices_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let error = client(&server).analyze(&[]).await.expect_err("should fail");
        assert!(matches!(error, UpstreamError::Decode { .. }));
    }

    #[tokio::test]
    async fn unauthorized_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let error = client(&server).generate(&[]).await.expect_err("should fail");
        assert!(matches!(error, UpstreamError::Status { status, .. } if status.as_u16() == 401));
    }
}
