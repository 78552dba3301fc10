//! Marketing copy generation: one prompt in, one validated [`ProductCopy`] out.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult, STAGE_COPY};
use crate::llm::TextModel;

/// Placeholder used in grounding context when the model left a field out.
pub const MISSING_FIELD: &str = "N/A";

const COPY_PROMPT_TEMPLATE: &str = r#"You are an expert Amazon A+ content writer. Generate a comprehensive product content package from the input: "{title}". The tone should be professional, trustworthy, and customer-centric, optimized for marketplace search with the keywords a shopper would use for this product. Include specific sections for an A+ layout.

**Output Format (JSON only):**
{
  "product_title": "Styled title (150-200 characters) with brand emphasis and key benefits",
  "product_benefits": "Product Benefits\n\t• Benefit 1 with detail...\n\t• Benefit 2 with detail...",
  "product_features": "Product Features\n\t• Feature 1 with ingredient focus...\n\t• Feature 2 with technology highlight...",
  "how_to_use": "Direction of Use\n\t1. Step 1 with clear instruction...\n\t2. Step 2 with detail...",
  "why_youll_love_it": "Why You'll Love It:\n\t• Unique selling point 1...\n\t• Unique selling point 2...",
  "real_results": "Real Results, Real Relief:\n\t• Before condition...\n\t• After improvement...",
  "key_ingredients": "Our Key Ingredients:\n\t• Ingredient 1: Benefit...\n\t• Ingredient 2: Benefit...",
  "product_description": "Product Description\n\nFull marketing-friendly description (3-4 paragraphs) with SEO keywords and customer pain points addressed."
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyField {
    ProductTitle,
    ProductBenefits,
    ProductFeatures,
    HowToUse,
    WhyYoullLoveIt,
    RealResults,
    KeyIngredients,
    ProductDescription,
}

impl CopyField {
    pub const ALL: [CopyField; 8] = [
        CopyField::ProductTitle,
        CopyField::ProductBenefits,
        CopyField::ProductFeatures,
        CopyField::HowToUse,
        CopyField::WhyYoullLoveIt,
        CopyField::RealResults,
        CopyField::KeyIngredients,
        CopyField::ProductDescription,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CopyField::ProductTitle => "product_title",
            CopyField::ProductBenefits => "product_benefits",
            CopyField::ProductFeatures => "product_features",
            CopyField::HowToUse => "how_to_use",
            CopyField::WhyYoullLoveIt => "why_youll_love_it",
            CopyField::RealResults => "real_results",
            CopyField::KeyIngredients => "key_ingredients",
            CopyField::ProductDescription => "product_description",
        }
    }

    /// Section heading shown to the user.
    pub fn heading(self) -> &'static str {
        match self {
            CopyField::ProductTitle => "Product Title",
            CopyField::ProductBenefits => "Product Benefits",
            CopyField::ProductFeatures => "Product Features",
            CopyField::HowToUse => "Direction of Use",
            CopyField::WhyYoullLoveIt => "Why You'll Love It",
            CopyField::RealResults => "Real Results, Real Relief",
            CopyField::KeyIngredients => "Our Key Ingredients",
            CopyField::ProductDescription => "Product Description",
        }
    }

    /// Leading labels the model repeats inside the value itself.
    fn value_prefixes(self) -> &'static [&'static str] {
        match self {
            CopyField::ProductTitle => &[],
            CopyField::ProductBenefits => &["Product Benefits"],
            CopyField::ProductFeatures => &["Product Features"],
            CopyField::HowToUse => &["Direction of Use", "How to Use"],
            CopyField::WhyYoullLoveIt => &["Why You'll Love It:"],
            CopyField::RealResults => &["Real Results, Real Relief:"],
            CopyField::KeyIngredients => &["Our Key Ingredients:"],
            CopyField::ProductDescription => &["Product Description"],
        }
    }
}

/// Marketing copy returned by the text model.
///
/// Every field is optional on the wire; lookups decide how absence is shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductCopy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_benefits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_features: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_to_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_youll_love_it: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
}

impl ProductCopy {
    pub fn get(&self, field: CopyField) -> Option<&str> {
        let v = match field {
            CopyField::ProductTitle => &self.product_title,
            CopyField::ProductBenefits => &self.product_benefits,
            CopyField::ProductFeatures => &self.product_features,
            CopyField::HowToUse => &self.how_to_use,
            CopyField::WhyYoullLoveIt => &self.why_youll_love_it,
            CopyField::RealResults => &self.real_results,
            CopyField::KeyIngredients => &self.key_ingredients,
            CopyField::ProductDescription => &self.product_description,
        };
        v.as_deref()
    }

    /// Wire keys of the fields the model left out.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        CopyField::ALL.iter().filter(|f| self.get(**f).is_none()).map(|f| f.key()).collect()
    }

    /// Value for display: heading label stripped, `""` when absent.
    pub fn display(&self, field: CopyField) -> &str {
        self.get(field).map(|v| strip_label(v, field)).unwrap_or("")
    }

    /// Value for prompt grounding: heading label stripped, `"N/A"` when absent.
    pub fn grounding(&self, field: CopyField) -> &str {
        self.get(field).map(|v| strip_label(v, field)).unwrap_or(MISSING_FIELD)
    }

    /// Parses the model's JSON body. Anything but a single JSON object is malformed.
    pub fn parse(raw: &str) -> PipelineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| PipelineError::malformed(STAGE_COPY, format!("invalid JSON: {e}"), raw))?;
        if !value.is_object() {
            return Err(PipelineError::malformed(STAGE_COPY, "expected a JSON object", raw));
        }
        serde_json::from_value(value)
            .map_err(|e| PipelineError::malformed(STAGE_COPY, format!("unexpected field type: {e}"), raw))
    }
}

fn strip_label(value: &str, field: CopyField) -> &str {
    let trimmed = value.trim();
    for prefix in field.value_prefixes() {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    trimmed
}

pub fn build_copy_prompt(title: &str) -> String {
    COPY_PROMPT_TEMPLATE.replace("{title}", title.trim())
}

/// Asks the text model for the copy package of one product title.
pub async fn generate_copy(model: &dyn TextModel, title: &str, temperature: f32) -> PipelineResult<ProductCopy> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PipelineError::UserInputIncomplete("product title".into()));
    }
    let raw = model.complete(&build_copy_prompt(title), temperature).await?;
    let copy = ProductCopy::parse(&raw)?;
    let missing = copy.missing_fields();
    tracing::info!(model = model.name(), fields = CopyField::ALL.len() - missing.len(), "product copy generated");
    if !missing.is_empty() {
        tracing::warn!(missing = %missing.join(", "), "copy response is missing fields");
    }
    Ok(copy)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions in order and records the prompts it saw.
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<PipelineResult<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<PipelineResult<String>>) -> Self {
            Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(&self, prompt: &str, _temperature: f32) -> PipelineResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PipelineError::Config("no scripted reply left".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn full_copy_json() -> String {
        serde_json::json!({
            "product_title": "Bare Anatomy EXPERT Anti-Dandruff Conditioner",
            "product_benefits": "Product Benefits\n\t• Removes flakes\n\t• Soothes scalp",
            "product_features": "Product Features\n\t• Rosemary\n\t• Biotin",
            "how_to_use": "Direction of Use\n\t1. Apply\n\t2. Rinse",
            "why_youll_love_it": "Why You'll Love It:\n\t• Gentle",
            "real_results": "Real Results, Real Relief:\n\t• Calmer scalp",
            "key_ingredients": "Our Key Ingredients:\n\t• Salicylic acid: exfoliates",
            "product_description": "Product Description\n\nA conditioner for flake-free hair."
        })
        .to_string()
    }

    #[tokio::test]
    async fn parses_full_copy_and_strips_labels() {
        let model = ScriptedModel::new(vec![Ok(full_copy_json())]);
        let copy = generate_copy(&model, "  Anti-Dandruff Conditioner ", 0.7).await.unwrap();
        assert_eq!(copy.display(CopyField::ProductBenefits), "• Removes flakes\n\t• Soothes scalp");
        assert_eq!(copy.display(CopyField::HowToUse), "1. Apply\n\t2. Rinse");
        assert_eq!(copy.display(CopyField::ProductDescription), "A conditioner for flake-free hair.");
        let prompt = &model.prompts.lock().unwrap()[0];
        assert!(prompt.contains("\"Anti-Dandruff Conditioner\""));
    }

    #[tokio::test]
    async fn not_json_is_malformed_with_raw_body() {
        let model = ScriptedModel::new(vec![Ok("not json".into())]);
        let err = generate_copy(&model, "Conditioner", 0.7).await.unwrap_err();
        match err {
            PipelineError::MalformedModelOutput { stage, raw, .. } => {
                assert_eq!(stage, STAGE_COPY);
                assert_eq!(raw, "not json");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn json_array_is_not_a_copy_object() {
        let err = ProductCopy::parse("[1, 2]").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedModelOutput { .. }));
    }

    #[test]
    fn non_string_field_is_malformed() {
        let err = ProductCopy::parse(r#"{"product_title": ["a", "b"]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedModelOutput { .. }));
    }

    #[test]
    fn missing_fields_default_per_use() {
        let copy = ProductCopy::parse(r#"{"product_title": "Soap"}"#).unwrap();
        assert_eq!(copy.display(CopyField::HowToUse), "");
        assert_eq!(copy.grounding(CopyField::HowToUse), MISSING_FIELD);
        assert_eq!(copy.grounding(CopyField::ProductTitle), "Soap");
    }

    #[test]
    fn missing_fields_are_named_by_wire_key() {
        let copy = ProductCopy::parse(r#"{"product_title": "Soap", "how_to_use": "Rinse"}"#).unwrap();
        assert_eq!(
            copy.missing_fields(),
            vec![
                "product_benefits",
                "product_features",
                "why_youll_love_it",
                "real_results",
                "key_ingredients",
                "product_description",
            ]
        );

        let full = ProductCopy::parse(&full_copy_json()).unwrap();
        assert!(full.missing_fields().is_empty());
        let wire = serde_json::to_value(&full).unwrap();
        for field in CopyField::ALL {
            assert!(wire.get(field.key()).is_some(), "{}", field.key());
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let copy = ProductCopy::parse(r#"{"product_title": "Soap", "tagline": "clean"}"#).unwrap();
        assert_eq!(copy.display(CopyField::ProductTitle), "Soap");
    }

    #[tokio::test]
    async fn blank_title_never_reaches_the_model() {
        let model = ScriptedModel::new(vec![]);
        let err = generate_copy(&model, "   ", 0.7).await.unwrap_err();
        assert!(matches!(err, PipelineError::UserInputIncomplete(_)));
        assert_eq!(model.calls(), 0);
    }
}
