use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Ask the API for a strict JSON object; the body is parsed as-is.
    JsonObject,
    /// No format hint; the model wraps JSON in a markdown fence that gets stripped.
    Fenced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextCfg {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub copy_temperature: f32,
    pub prompt_temperature: f32,
    pub response_format: ResponseFormat,
    pub timeout_secs: u64,
}

impl Default for TextCfg {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            base_url: "https://api.openai.com/v1".into(),
            copy_temperature: 0.7,
            prompt_temperature: 0.8,
            response_format: ResponseFormat::JsonObject,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ideogram,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCfg {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub api_key_env: String,
    pub style_type: String,
    pub rendering_speed: String,
    pub aspect_ratio: String,
    pub num_images: u32,
    pub timeout_secs: u64,
}

impl Default for ImageCfg {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ideogram,
            endpoint: "https://api.ideogram.ai/v1/ideogram-v3/replace-background".into(),
            api_key_env: "IDEOGRAM_API_KEY".into(),
            style_type: "GENERAL".into(),
            rendering_speed: "TURBO".into(),
            aspect_ratio: "1x1".into(),
            num_images: 1,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub text: TextCfg,
    pub image: ImageCfg,
    /// Replaces the built-in channel briefs when set.
    pub briefs_file: Option<PathBuf>,
    pub out_dir: PathBuf,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            text: TextCfg::default(),
            image: ImageCfg::default(),
            briefs_file: None,
            out_dir: PathBuf::from("out"),
        }
    }
}

impl AppCfg {
    /// Loads YAML config if a path is given, then applies env overrides.
    pub async fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut cfg = match path {
            Some(p) => {
                let txt = tokio::fs::read_to_string(p).await.map_err(|e| {
                    PipelineError::Config(format!("failed to read {}: {e}", p.display()))
                })?;
                Self::from_yaml(&txt)?
            }
            None => Self::default(),
        };
        if let Ok(dir) = std::env::var("CONTENTGEN_OUT_DIR") {
            cfg.out_dir = PathBuf::from(dir);
        }
        Ok(cfg)
    }

    pub fn from_yaml(txt: &str) -> PipelineResult<Self> {
        let cfg: Self = serde_yaml::from_str(txt)
            .map_err(|e| PipelineError::Config(format!("failed to parse config YAML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.image.num_images == 0 {
            return Err(PipelineError::Config("image.num_images must be at least 1".into()));
        }
        if self.text.model.trim().is_empty() {
            return Err(PipelineError::Config("text.model cannot be empty".into()));
        }
        Ok(())
    }
}
