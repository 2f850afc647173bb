//! Answer synthesis over retrieved documents.
//!
//! The synthesizer is a downstream consumer of search results: its failures are reported next to
//! the hits that were retrieved and never turn into a retrieval failure.

use crate::config::SynthesisConfig;
use crate::error::{SearchError, SynthesisError};
use crate::index::{Document, Index};
use crate::search::Hit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are an expert RAG system. Your task is to answer the user's question \
concisely and accurately based *only* on the provided context. Do not include any unnecessary information. \
If the answer cannot be found in the context, state that clearly.";

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, query: &str, retrieved: &[&Document]) -> Result<String, SynthesisError>;
}

/// Retrieved documents plus the synthesized answer, or the reason there is none.
#[derive(Debug)]
pub struct Answer<'a> {
    pub hits: Vec<Hit<'a>>,
    pub answer: Result<String, SynthesisError>,
}

/// Search, then hand the hits to the synthesizer.
pub async fn ask<'a>(
    index: &'a Index,
    synthesizer: &dyn Synthesizer,
    query: &str,
    k: usize,
) -> Result<Answer<'a>, SearchError> {
    let hits = index.search(query, k)?;
    let retrieved: Vec<&Document> = hits.iter().map(|h| h.document).collect();
    let answer = synthesizer.synthesize(query, &retrieved).await;
    if let Err(e) = &answer {
        tracing::warn!(error = %e, "answer synthesis failed");
    }
    Ok(Answer { hits, answer })
}

pub fn build_context(retrieved: &[&Document]) -> String {
    let mut context = String::new();
    for doc in retrieved {
        context.push_str(&format!("Source: {}\n", doc.source));
        context.push_str(&format!("Content: {}\n---\n", doc.content));
    }
    context
}

pub fn build_user_prompt(query: &str, retrieved: &[&Document]) -> String {
    format!("Context:\n{}\n\nQuestion: {query}", build_context(retrieved))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsSynthesizer {
    client: reqwest::Client,
    config: SynthesisConfig,
    api_key: Option<String>,
}

impl ChatCompletionsSynthesizer {
    /// The API key is read from `config.api_key_env`; a missing key surfaces on each call.
    pub fn from_config(config: SynthesisConfig) -> Result<Self, SynthesisError> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: SynthesisConfig, api_key: Option<String>) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config, api_key })
    }
}

#[async_trait]
impl Synthesizer for ChatCompletionsSynthesizer {
    async fn synthesize(&self, query: &str, retrieved: &[&Document]) -> Result<String, SynthesisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SynthesisError::MissingApiKey(self.config.api_key_env.clone()))?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system".into(), content: SYSTEM_PROMPT.into() },
                ChatMessage { role: "user".into(), content: build_user_prompt(query, retrieved) },
            ],
            temperature: self.config.temperature,
        };

        let resp = self.client.post(&url).bearer_auth(api_key).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SynthesisError::Status { status, body });
        }
        let body: ChatResponse = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(SynthesisError::EmptyResponse)
    }
}
