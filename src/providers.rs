use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ImageCfg;
use crate::error::{require_env, PipelineError, PipelineResult};
use crate::reference::ReferenceImage;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    Http { status: u16, body: String },
    Transport(String),
    /// 2xx, but no `data[0].url` in the body.
    MissingImageData { body: String },
    Reference(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Http { status, body } => write!(f, "HTTP {status}. Response body: {body}"),
            ProviderError::Transport(msg) => write!(f, "request failed: {msg}"),
            ProviderError::MissingImageData { body } => {
                write!(f, "API did not return image data. Response: {body}")
            }
            ProviderError::Reference(msg) => write!(f, "reference image unreadable: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// A replace-background backend: keeps the reference object, synthesizes the scene.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Renders one scene and returns the URL of the result.
    async fn replace_background(&self, prompt: &str, reference: &ReferenceImage) -> Result<String, ProviderError>;
    fn name(&self) -> &'static str;
}

pub struct IdeogramProvider {
    client: reqwest::Client,
    api_key: String,
    cfg: ImageCfg,
}

impl IdeogramProvider {
    pub fn new(api_key: String, cfg: ImageCfg) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self { client, api_key, cfg })
    }

    pub fn from_env(cfg: ImageCfg) -> PipelineResult<Self> {
        let key = require_env(&cfg.api_key_env)?;
        Self::new(key, cfg)
    }
}

#[derive(Deserialize)]
struct ReplaceBgResp {
    #[serde(default)]
    data: Vec<RenderedData>,
}
#[derive(Deserialize)]
struct RenderedData {
    #[serde(default)]
    url: Option<String>,
}

/// Pulls `data[0].url` out of a success body.
fn first_url(body: &str) -> Option<String> {
    let parsed: ReplaceBgResp = serde_json::from_str(body).ok()?;
    parsed.data.into_iter().next()?.url.filter(|u| !u.is_empty())
}

#[async_trait]
impl ImageProvider for IdeogramProvider {
    async fn replace_background(&self, prompt: &str, reference: &ReferenceImage) -> Result<String, ProviderError> {
        let bytes = reference.read().await.map_err(|e| ProviderError::Reference(e.to_string()))?;
        let image = Part::bytes(bytes)
            .file_name(reference.file_name().to_string())
            .mime_str("image/png")
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("style_type", self.cfg.style_type.clone())
            .text("rendering_speed", self.cfg.rendering_speed.clone())
            .text("aspect_ratio", self.cfg.aspect_ratio.clone())
            .text("num_images", self.cfg.num_images.to_string())
            .part("image", image);

        let resp = self
            .client
            .post(&self.cfg.endpoint)
            .header("Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Http { status: status.as_u16(), body });
        }
        first_url(&body).ok_or(ProviderError::MissingImageData { body })
    }

    fn name(&self) -> &'static str {
        "ideogram"
    }
}

/// Offline provider: returns deterministic placeholder URLs without any network call.
pub struct MockProvider;

#[async_trait]
impl ImageProvider for MockProvider {
    async fn replace_background(&self, prompt: &str, reference: &ReferenceImage) -> Result<String, ProviderError> {
        let (w, h) = reference.dimensions();
        Ok(format!("mock://render/{w}x{h}/{}", slug::slugify(prompt.chars().take(48).collect::<String>())))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
