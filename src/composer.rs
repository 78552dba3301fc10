//! Turns validated copy into a channel's image prompts by delegating
//! prompt authorship to the text model.

use serde::Serialize;

use crate::briefs::{Channel, ChannelBrief};
use crate::copy::{CopyField, ProductCopy};
use crate::error::{PipelineError, PipelineResult, STAGE_PROMPTS};
use crate::llm::TextModel;

/// Exactly `brief.count` prompts for one channel, in slot order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePromptSet {
    channel: Channel,
    persona: Option<String>,
    prompts: Vec<String>,
}

impl ImagePromptSet {
    pub fn new(channel: Channel, persona: Option<String>, prompts: Vec<String>, expected: usize) -> Result<Self, String> {
        if prompts.len() != expected {
            return Err(format!("expected {expected} prompts, got {}", prompts.len()));
        }
        Ok(Self { channel, persona, prompts })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn persona(&self) -> Option<&str> {
        self.persona.as_deref()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }
}

const CONTEXT_FIELDS: [(CopyField, &str); 6] = [
    (CopyField::ProductTitle, "Product Title"),
    (CopyField::ProductBenefits, "Key Benefits"),
    (CopyField::ProductFeatures, "Key Ingredients & Features"),
    (CopyField::HowToUse, "How to Use"),
    (CopyField::WhyYoullLoveIt, "Why Customers Love It"),
    (CopyField::KeyIngredients, "Key Ingredients"),
];

/// Grounding block for the brief. Absent fields read "N/A".
pub fn build_product_context(copy: &ProductCopy) -> String {
    CONTEXT_FIELDS
        .iter()
        .map(|(field, label)| format!("- {label}: {}", copy.grounding(*field)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt_request(copy: &ProductCopy, brief: &ChannelBrief) -> String {
    brief.render(&build_product_context(copy))
}

/// Validates the model's answer against the brief's cardinality.
pub fn parse_prompt_set(raw: &str, brief: &ChannelBrief) -> PipelineResult<ImagePromptSet> {
    let malformed = |reason: String| PipelineError::malformed(STAGE_PROMPTS, reason, raw);

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let obj = value.as_object().ok_or_else(|| malformed("expected a JSON object".into()))?;
    let list = obj
        .get("prompts")
        .ok_or_else(|| malformed("missing \"prompts\" key".into()))?
        .as_array()
        .ok_or_else(|| malformed("\"prompts\" is not a list".into()))?;

    let mut prompts = Vec::with_capacity(list.len());
    for (i, item) in list.iter().enumerate() {
        let text = item
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed(format!("prompt {i} is not a non-empty string")))?;
        prompts.push(with_suffix(text, brief.suffix.as_deref()));
    }

    let persona = obj
        .get("persona")
        .and_then(|p| p.as_str())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    ImagePromptSet::new(brief.channel, persona, prompts, brief.count).map_err(malformed)
}

fn with_suffix(prompt: &str, suffix: Option<&str>) -> String {
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) if !prompt.ends_with(s) => format!("{prompt} {s}"),
        _ => prompt.to_string(),
    }
}

/// Asks the text model to write the channel's prompts and validates the result.
pub async fn compose_prompts(
    model: &dyn TextModel,
    copy: &ProductCopy,
    brief: &ChannelBrief,
    temperature: f32,
) -> PipelineResult<ImagePromptSet> {
    let request = build_prompt_request(copy, brief);
    let raw = model.complete(&request, temperature).await?;
    let set = parse_prompt_set(&raw, brief)?;
    tracing::info!(
        channel = ?brief.channel,
        prompts = set.len(),
        persona = set.persona().unwrap_or("-"),
        "image prompts composed"
    );
    Ok(set)
}
