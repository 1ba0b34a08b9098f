//! Async HTTP client for chat-completion and embedding APIs
//!
//! Anthropic and OpenAI-compatible chat endpoints are both understood; the
//! embedding endpoint is always OpenAI-shaped. The model is chosen per call
//! so one client serves every cognitive function.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::{CollaboratorError, Result, ReverieError};

const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
const MAX_REPLY_TOKENS: u32 = 4096;

/// Wire dialect of the chat endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    fn for_url(url: &str) -> Self {
        if url.contains("anthropic.com") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    fn authorize(self, builder: RequestBuilder, key: &str) -> RequestBuilder {
        match self {
            Provider::Anthropic => builder.header("x-api-key", key).header("anthropic-version", "2023-06-01"),
            Provider::OpenAi => builder.bearer_auth(key),
        }
    }
}

pub struct LlmClient {
    http: Client,
    key: String,
    chat_url: String,
    embedding_url: String,
    provider: Provider,
}

impl LlmClient {
    pub fn new(key: String, chat_url: String, embedding_url: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReverieError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            key,
            provider: Provider::for_url(&chat_url),
            chat_url,
            embedding_url,
        })
    }

    /// Build from `LLM_API_KEY`, `LLM_API_URL` and `LLM_EMBEDDING_URL`
    ///
    /// Only the key is required; both URLs default to OpenAI.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let key = std::env::var("LLM_API_KEY").map_err(|_| ReverieError::Config("LLM_API_KEY not set".into()))?;
        let chat_url = std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_CHAT_URL.into());
        let embedding_url = std::env::var("LLM_EMBEDDING_URL").unwrap_or_else(|_| DEFAULT_EMBEDDING_URL.into());
        Self::new(key, chat_url, embedding_url, timeout)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Send one system + user exchange and return the raw text reply
    pub async fn complete(&self, model: &str, system: &str, user: &str) -> std::result::Result<String, CollaboratorError> {
        let text = match self.provider {
            Provider::Anthropic => {
                let body = MessagesBody {
                    model,
                    max_tokens: MAX_REPLY_TOKENS,
                    system,
                    messages: vec![Turn { role: "user", content: user }],
                };
                let reply: MessagesReply = self.post_json(&self.chat_url, &body).await?;
                reply.content.into_iter().next().map(|block| block.text)
            }
            Provider::OpenAi => {
                let body = ChatBody {
                    model,
                    messages: vec![
                        Turn { role: "system", content: system },
                        Turn { role: "user", content: user },
                    ],
                };
                let reply: ChatReply = self.post_json(&self.chat_url, &body).await?;
                reply.choices.into_iter().next().map(|choice| choice.message.content)
            }
        };
        text.ok_or_else(|| CollaboratorError::MalformedResponse("reply had no content".into()))
    }

    /// Request an embedding with exactly `dimensions` components
    pub async fn embed(&self, model: &str, text: &str, dimensions: usize) -> std::result::Result<Vec<f32>, CollaboratorError> {
        let body = EmbedBody {
            model,
            input: text,
            dimensions,
        };
        let request = self.http.post(&self.embedding_url).bearer_auth(&self.key).json(&body);
        let reply: EmbedReply = decode(request).await?;

        let embedding = reply
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| CollaboratorError::MalformedResponse("no embedding returned".into()))?;
        if embedding.len() != dimensions {
            return Err(CollaboratorError::MalformedResponse(format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                dimensions
            )));
        }
        Ok(embedding)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> std::result::Result<R, CollaboratorError> {
        let request = self.provider.authorize(self.http.post(url), &self.key).json(body);
        decode(request).await
    }
}

/// Send, map the status onto collaborator errors, then decode the body
async fn decode<R: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<R, CollaboratorError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            CollaboratorError::Timeout
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CollaboratorError::RateLimited);
    }
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::Transport(format!("{}: {}", status, detail)));
    }

    response
        .json()
        .await
        .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Turn<'a>>,
}

#[derive(Deserialize)]
struct MessagesReply {
    content: Vec<TextBlock>,
}

#[derive(Deserialize)]
struct TextBlock {
    text: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
}

#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbedReply {
    data: Vec<EmbedRow>,
}

#[derive(Deserialize)]
struct EmbedRow {
    embedding: Vec<f32>,
}
