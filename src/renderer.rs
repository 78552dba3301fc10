use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::composer::ImagePromptSet;
use crate::providers::ImageProvider;
use crate::reference::ReferenceImage;

/// Fixed-width display grid. Slot `i` sits at column `i % columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub row: usize,
    pub column: usize,
}

impl Grid {
    /// Two columns up to five images, three beyond.
    pub fn for_count(count: usize) -> Self {
        Self { columns: if count <= 5 { 2 } else { 3 } }
    }

    pub fn place(&self, index: usize) -> Slot {
        Slot { row: index / self.columns, column: index % self.columns }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub index: usize,
    pub slot: Slot,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderOutcome {
    pub fn is_ok(&self) -> bool {
        self.url.is_some()
    }
}

/// Renders every prompt in order, one call at a time.
///
/// A failed call is recorded at its index; the loop always moves on.
pub async fn render_all(
    provider: &dyn ImageProvider,
    set: &ImagePromptSet,
    reference: &ReferenceImage,
    progress: &ProgressBar,
) -> Vec<RenderOutcome> {
    let grid = Grid::for_count(set.len());
    let total = set.len();
    progress.set_length(total as u64);
    progress.set_position(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}") {
        progress.set_style(style);
    }

    let mut outcomes = Vec::with_capacity(total);
    for (index, prompt) in set.prompts().iter().enumerate() {
        progress.set_message(format!("{} image {}/{}", set.channel().display_name(), index + 1, total));
        let result = provider.replace_background(prompt, reference).await;
        let (url, error) = match result {
            Ok(url) => {
                tracing::info!(channel = ?set.channel(), index, provider = provider.name(), "image rendered");
                (Some(url), None)
            }
            Err(e) => {
                tracing::warn!(channel = ?set.channel(), index, error = %e, "image render failed");
                (None, Some(format!("Image {}: {e}", index + 1)))
            }
        };
        outcomes.push(RenderOutcome { index, slot: grid.place(index), prompt: prompt.clone(), url, error });
        progress.inc(1);
    }
    progress.finish_and_clear();
    outcomes
}
