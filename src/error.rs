use thiserror::Error;

/// Pipeline stage names used in error reports and logs.
pub const STAGE_COPY: &str = "copy";
pub const STAGE_PROMPTS: &str = "prompts";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The text model answered, but not with the JSON shape we asked for.
    #[error("malformed {stage} response: {reason}")]
    MalformedModelOutput {
        stage: &'static str,
        reason: String,
        raw: String,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{0} is not set")]
    MissingCredential(String),

    #[error("missing input: {0}")]
    UserInputIncomplete(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn malformed(stage: &'static str, reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedModelOutput { stage, reason: reason.into(), raw: raw.into() }
    }

    /// Raw upstream body kept for diagnostics, if any.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::MalformedModelOutput { raw, .. } => Some(raw),
            Self::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedModelOutput { .. } => "malformed_model_output",
            Self::Upstream { .. } | Self::Transport { .. } => "upstream_error",
            Self::MissingCredential(_) => "missing_credential",
            Self::UserInputIncomplete(_) => "user_input_incomplete",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Reads a required secret from the environment.
pub fn require_env(name: &str) -> PipelineResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PipelineError::MissingCredential(name.to_string())),
    }
}
