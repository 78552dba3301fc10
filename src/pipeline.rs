use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::briefs::{BriefSet, Channel, ChannelSelection};
use crate::composer::{compose_prompts, ImagePromptSet};
use crate::config::TextCfg;
use crate::copy::{generate_copy, ProductCopy};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::TextModel;
use crate::providers::ImageProvider;
use crate::reference::ReferenceImage;
use crate::renderer::{render_all, Grid, RenderOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    pub prompts: Vec<String>,
    pub columns: usize,
    /// Why prompts or images are missing for this channel, if they are.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub images: Vec<RenderOutcome>,
}

impl ChannelReport {
    fn skipped(channel: Channel, warning: String) -> Self {
        Self { channel, persona: None, prompts: Vec::new(), columns: 0, warning: Some(warning), images: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub reference: ReferenceSummary,
    pub copy: ProductCopy,
    pub channels: Vec<ChannelReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// One submission's worth of orchestration. Holds no per-run state.
pub struct Pipeline {
    text: Arc<dyn TextModel>,
    /// `Err` holds the credential problem reported when rendering is reached.
    images: Result<Arc<dyn ImageProvider>, String>,
    briefs: BriefSet,
    copy_temperature: f32,
    prompt_temperature: f32,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(
        text: Arc<dyn TextModel>,
        images: PipelineResult<Arc<dyn ImageProvider>>,
        briefs: BriefSet,
        text_cfg: &TextCfg,
    ) -> Self {
        Self {
            text,
            images: images.map_err(|e| e.to_string()),
            briefs,
            copy_temperature: text_cfg.copy_temperature,
            prompt_temperature: text_cfg.prompt_temperature,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn briefs(&self) -> &BriefSet {
        &self.briefs
    }

    /// Copy, then per channel: prompts, then images.
    ///
    /// Copy failures abort the run. Prompt failures skip that channel's
    /// images. Image failures are recorded per slot.
    pub async fn generate(
        &self,
        title: &str,
        reference: Option<&ReferenceImage>,
        selection: ChannelSelection,
    ) -> PipelineResult<GenerationReport> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PipelineError::UserInputIncomplete("product title".into()));
        }
        let reference = reference.ok_or_else(|| PipelineError::UserInputIncomplete("reference image".into()))?;

        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let span = tracing::info_span!("generate", %run_id);
        self.run(run_id, title, reference, selection).instrument(span).await
    }

    async fn run(
        &self,
        run_id: String,
        title: &str,
        reference: &ReferenceImage,
        selection: ChannelSelection,
    ) -> PipelineResult<GenerationReport> {
        tracing::info!(?selection, "starting generation");
        let copy = generate_copy(self.text.as_ref(), title, self.copy_temperature).await?;

        let mut channels = Vec::with_capacity(selection.channels().len());
        for &channel in selection.channels() {
            channels.push(self.run_channel(channel, &copy, reference).await);
        }

        let (w, h) = reference.dimensions();
        Ok(GenerationReport {
            run_id,
            title: title.to_string(),
            created_at: Utc::now(),
            reference: ReferenceSummary { name: reference.source_name().to_string(), width: w, height: h },
            copy,
            channels,
        })
    }

    async fn run_channel(&self, channel: Channel, copy: &ProductCopy, reference: &ReferenceImage) -> ChannelReport {
        let Some(brief) = self.briefs.get(channel) else {
            tracing::warn!(?channel, "no brief configured");
            return ChannelReport::skipped(channel, format!("No brief configured for {}.", channel.display_name()));
        };

        let set = match compose_prompts(self.text.as_ref(), copy, brief, self.prompt_temperature).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(?channel, error = %e, "prompt composition failed");
                return ChannelReport::skipped(
                    channel,
                    format!("Could not generate image prompts ({e}). Skipping image generation."),
                );
            }
        };

        let provider = match &self.images {
            Ok(p) => p.clone(),
            Err(msg) => {
                tracing::error!(?channel, error = %msg, "image provider unavailable");
                return self.prompts_only(set, format!("Image generation unavailable: {msg}"));
            }
        };

        let progress = if self.show_progress { ProgressBar::new(set.len() as u64) } else { ProgressBar::hidden() };
        let images = render_all(provider.as_ref(), &set, reference, &progress).await;
        let failed = images.iter().filter(|o| !o.is_ok()).count();
        tracing::info!(?channel, rendered = images.len() - failed, failed, "channel finished");

        ChannelReport {
            channel,
            persona: set.persona().map(str::to_string),
            columns: Grid::for_count(set.len()).columns,
            prompts: set.prompts().to_vec(),
            warning: None,
            images,
        }
    }

    fn prompts_only(&self, set: ImagePromptSet, warning: String) -> ChannelReport {
        ChannelReport {
            channel: set.channel(),
            persona: set.persona().map(str::to_string),
            columns: Grid::for_count(set.len()).columns,
            prompts: set.prompts().to_vec(),
            warning: Some(warning),
            images: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::tests::{full_copy_json, ScriptedModel};
    use crate::renderer::tests::RecordingProvider;
    use pretty_assertions::assert_eq;

    fn prompts_json(n: usize) -> String {
        let prompts: Vec<String> = (0..n).map(|i| format!("scene {i}")).collect();
        serde_json::json!({ "persona": "Clinical", "prompts": prompts }).to_string()
    }

    fn pipeline(model: Arc<ScriptedModel>, images: PipelineResult<Arc<dyn ImageProvider>>) -> Pipeline {
        Pipeline::new(model, images, BriefSet::builtin().unwrap(), &TextCfg::default())
    }

    fn reference() -> ReferenceImage {
        ReferenceImage::from_bytes(&crate::reference::tests::tiny_png(), "ref.png").unwrap()
    }

    #[tokio::test]
    async fn both_channels_render_six_each() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(full_copy_json()), Ok(prompts_json(6)), Ok(prompts_json(6))]));
        let provider = Arc::new(RecordingProvider::new(vec![]));
        let p = pipeline(model.clone(), Ok(provider.clone()));
        let report = p.generate("Conditioner", Some(&reference()), ChannelSelection::Both).await.unwrap();

        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.channels[0].channel, Channel::Amazon);
        assert_eq!(report.channels[1].channel, Channel::Meta);
        for ch in &report.channels {
            assert_eq!(ch.images.len(), 6);
            assert_eq!(ch.columns, 3);
            assert_eq!(ch.persona.as_deref(), Some("Clinical"));
        }
        assert_eq!(provider.call_count(), 12);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn malformed_copy_issues_no_image_calls() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("not json".into())]));
        let provider = Arc::new(RecordingProvider::new(vec![]));
        let p = pipeline(model.clone(), Ok(provider.clone()));
        let err = p.generate("Conditioner", Some(&reference()), ChannelSelection::Both).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedModelOutput { .. }));
        assert_eq!(err.raw_body(), Some("not json"));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn bad_prompt_set_skips_only_that_channel() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(full_copy_json()), Ok(prompts_json(4)), Ok(prompts_json(6))]));
        let provider = Arc::new(RecordingProvider::new(vec![]));
        let p = pipeline(model, Ok(provider.clone()));
        let report = p.generate("Conditioner", Some(&reference()), ChannelSelection::Both).await.unwrap();

        let amazon = &report.channels[0];
        assert!(amazon.prompts.is_empty());
        assert!(amazon.images.is_empty());
        assert!(amazon.warning.as_deref().unwrap().contains("Skipping image generation"));
        assert_eq!(report.channels[1].images.len(), 6);
        assert_eq!(provider.call_count(), 6);
    }

    #[tokio::test]
    async fn upstream_failure_on_prompts_is_a_warning() {
        let upstream = PipelineError::Upstream { service: "text model", status: 503, body: "overloaded".into() };
        let model = Arc::new(ScriptedModel::new(vec![Ok(full_copy_json()), Err(upstream)]));
        let provider = Arc::new(RecordingProvider::new(vec![]));
        let p = pipeline(model, Ok(provider.clone()));
        let report = p.generate("Conditioner", Some(&reference()), ChannelSelection::Meta).await.unwrap();
        assert!(report.channels[0].warning.as_deref().unwrap().contains("503"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn image_failures_do_not_abort_siblings() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(full_copy_json()), Ok(prompts_json(6))]));
        let provider = Arc::new(RecordingProvider::new(vec![3]));
        let p = pipeline(model, Ok(provider.clone()));
        let report = p.generate("Conditioner", Some(&reference()), ChannelSelection::Amazon).await.unwrap();
        let images = &report.channels[0].images;
        let ok: Vec<usize> = images.iter().filter(|o| o.is_ok()).map(|o| o.index).collect();
        assert_eq!(ok, vec![0, 1, 2, 4, 5]);
        assert!(images[3].error.is_some());
        assert_eq!(report.channels[0].warning, None);
    }

    #[tokio::test]
    async fn missing_image_key_keeps_copy_and_prompts() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(full_copy_json()), Ok(prompts_json(6))]));
        let p = pipeline(model, Err(PipelineError::MissingCredential("IDEOGRAM_API_KEY".into())));
        let report = p.generate("Conditioner", Some(&reference()), ChannelSelection::Amazon).await.unwrap();
        let ch = &report.channels[0];
        assert_eq!(ch.prompts.len(), 6);
        assert!(ch.images.is_empty());
        assert!(ch.warning.as_deref().unwrap().contains("IDEOGRAM_API_KEY is not set"));
        assert_eq!(report.copy.product_title.as_deref(), Some("Bare Anatomy EXPERT Anti-Dandruff Conditioner"));
    }

    #[tokio::test]
    async fn incomplete_input_makes_no_calls() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let provider = Arc::new(RecordingProvider::new(vec![]));
        let p = pipeline(model.clone(), Ok(provider.clone()));

        let err = p.generate("  ", Some(&reference()), ChannelSelection::Both).await.unwrap_err();
        assert!(matches!(err, PipelineError::UserInputIncomplete(_)));
        let err = p.generate("Conditioner", None, ChannelSelection::Both).await.unwrap_err();
        assert!(matches!(err, PipelineError::UserInputIncomplete(_)));
        assert_eq!(model.calls(), 0);
        assert_eq!(provider.call_count(), 0);
    }
}
