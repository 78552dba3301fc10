use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ResponseFormat, TextCfg};
use crate::error::{require_env, PipelineError, PipelineResult};

const SERVICE: &str = "text model";

/// A text-generation backend that answers one prompt with one completion.
///
/// Implementations return the completion body ready for JSON parsing
/// (fences already removed when the backend is configured for them).
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> PipelineResult<String>;
    fn name(&self) -> &str;
}

pub struct OpenAiTextModel {
    client: reqwest::Client,
    api_key: String,
    cfg: TextCfg,
}

impl OpenAiTextModel {
    pub fn new(api_key: String, cfg: TextCfg) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self { client, api_key, cfg })
    }

    /// Builds the client from the key named in `cfg.api_key_env`.
    pub fn from_env(cfg: TextCfg) -> PipelineResult<Self> {
        let key = require_env(&cfg.api_key_env)?;
        Self::new(key, cfg)
    }
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<FormatHint>,
}
#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct FormatHint {
    #[serde(rename = "type")]
    kind: &'static str,
}
#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: MsgOwned,
}
#[derive(Deserialize)]
struct MsgOwned {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextModel for OpenAiTextModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> PipelineResult<String> {
        let req = ChatReq {
            model: &self.cfg.model,
            messages: vec![Msg { role: "user", content: prompt }],
            temperature,
            response_format: match self.cfg.response_format {
                ResponseFormat::JsonObject => Some(FormatHint { kind: "json_object" }),
                ResponseFormat::Fenced => None,
            },
        };
        let url = format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'));
        tracing::debug!(model = %self.cfg.model, temperature, "sending chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| PipelineError::Transport { service: SERVICE, message: e.to_string() })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::Transport { service: SERVICE, message: e.to_string() })?;
        if !status.is_success() {
            tracing::error!(%status, "text model request rejected");
            return Err(PipelineError::Upstream { service: SERVICE, status: status.as_u16(), body });
        }

        let parsed: ChatResp = serde_json::from_str(&body).map_err(|e| PipelineError::Upstream {
            service: SERVICE,
            status: status.as_u16(),
            body: format!("unexpected completion envelope ({e}): {body}"),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                body: format!("completion had no content: {body}"),
            })?;

        Ok(match self.cfg.response_format {
            ResponseFormat::JsonObject => content.trim().to_string(),
            ResponseFormat::Fenced => strip_fences(&content).to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.cfg.model
    }
}

/// Returns the body of the first markdown code fence, or the trimmed content
/// when there is none. Text around the fence is dropped.
pub fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[start + 3..];
    // info string, e.g. "json", ends at whitespace or where the payload opens
    let info_len = rest
        .find(|c: char| c.is_whitespace() || c == '{' || c == '[')
        .unwrap_or(rest.len());
    let body = &rest[info_len..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
