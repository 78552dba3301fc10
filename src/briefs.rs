use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

const BUILTIN_BRIEFS: &str = include_str!("../config/briefs.yaml");

/// Publishing surface a prompt set is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Amazon,
    Meta,
}

impl Channel {
    pub fn display_name(self) -> &'static str {
        match self {
            Channel::Amazon => "Amazon A+",
            Channel::Meta => "Meta Ads",
        }
    }
}

/// What the user asked for at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelection {
    Amazon,
    Meta,
    Both,
}

impl ChannelSelection {
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelSelection::Amazon => &[Channel::Amazon],
            ChannelSelection::Meta => &[Channel::Meta],
            ChannelSelection::Both => &[Channel::Amazon, Channel::Meta],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" | "amazon-only" | "amazon_only" => Some(ChannelSelection::Amazon),
            "meta" | "meta-only" | "meta_only" => Some(ChannelSelection::Meta),
            "both" => Some(ChannelSelection::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub palette: String,
    pub tone: String,
}

/// Creative direction handed to the text model for one channel.
///
/// `template` placeholders: `{count}`, `{product_context}`, `{personas}`,
/// `{concepts}` and `{suffix}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBrief {
    pub channel: Channel,
    pub count: usize,
    pub template: String,
    #[serde(default)]
    pub personas: Vec<Persona>,
    /// One concept per slot, in slot order.
    pub concepts: Vec<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl ChannelBrief {
    fn validate(&self) -> PipelineResult<()> {
        if self.count == 0 {
            return Err(PipelineError::Config(format!("{:?} brief: count must be positive", self.channel)));
        }
        if self.concepts.len() != self.count {
            return Err(PipelineError::Config(format!(
                "{:?} brief: {} concepts for {} prompts",
                self.channel,
                self.concepts.len(),
                self.count
            )));
        }
        if !self.template.contains("{product_context}") {
            return Err(PipelineError::Config(format!(
                "{:?} brief: template never references {{product_context}}",
                self.channel
            )));
        }
        Ok(())
    }

    /// Fills the template with the product context and the brief's own lists.
    pub fn render(&self, product_context: &str) -> String {
        let personas = self
            .personas
            .iter()
            .map(|p| format!("- {}: palette {}; tone {}", p.name, p.palette, p.tone))
            .collect::<Vec<_>>()
            .join("\n");
        let concepts = self
            .concepts
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n");
        self.template
            .replace("{count}", &self.count.to_string())
            .replace("{personas}", &personas)
            .replace("{concepts}", &concepts)
            .replace("{suffix}", self.suffix.as_deref().unwrap_or(""))
            .replace("{product_context}", product_context)
    }
}

#[derive(Debug, Deserialize)]
struct BriefFile {
    briefs: Vec<ChannelBrief>,
}

/// The briefs available to a pipeline, one per channel.
#[derive(Debug, Clone)]
pub struct BriefSet {
    briefs: Vec<ChannelBrief>,
}

impl BriefSet {
    pub fn builtin() -> PipelineResult<Self> {
        Self::from_yaml(BUILTIN_BRIEFS)
    }

    pub async fn load(path: &Path) -> PipelineResult<Self> {
        let txt = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::Config(format!("failed to read briefs {}: {e}", path.display())))?;
        Self::from_yaml(&txt)
    }

    pub fn from_yaml(txt: &str) -> PipelineResult<Self> {
        let file: BriefFile = serde_yaml::from_str(txt)
            .map_err(|e| PipelineError::Config(format!("failed to parse briefs YAML: {e}")))?;
        for b in &file.briefs {
            b.validate()?;
        }
        for (i, b) in file.briefs.iter().enumerate() {
            if file.briefs[..i].iter().any(|o| o.channel == b.channel) {
                return Err(PipelineError::Config(format!("duplicate brief for {:?}", b.channel)));
            }
        }
        Ok(Self { briefs: file.briefs })
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelBrief> {
        self.briefs.iter().find(|b| b.channel == channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelBrief> {
        self.briefs.iter()
    }
}
