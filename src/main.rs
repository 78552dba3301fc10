use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod api;
mod briefs;
mod composer;
mod config;
mod copy;
mod error;
mod io;
mod llm;
mod pipeline;
mod present;
mod providers;
mod reference;
mod renderer;

use briefs::{BriefSet, ChannelSelection};
use config::{AppCfg, ProviderKind};
use error::PipelineResult;
use llm::OpenAiTextModel;
use pipeline::Pipeline;
use providers::{IdeogramProvider, ImageProvider, MockProvider};
use reference::ReferenceImage;

#[derive(Parser)]
#[command(name = "contentgen", version, about = "Product copy and promo images from a title and a reference photo")]
struct Cli {
    /// YAML config; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Channel briefs YAML replacing the built-in ones.
    #[arg(long, global = true)]
    briefs: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the pipeline once and print the result.
    Generate {
        #[arg(long)]
        title: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long, value_enum, default_value_t = ChannelSelection::Both)]
        channel: ChannelSelection,
        /// Use the offline mock image provider.
        #[arg(long)]
        mock_images: bool,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Also write the JSON report to the configured output directory.
        #[arg(long)]
        save: bool,
        /// Output directory for --save; overrides the config.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the channel briefs in use.
    Briefs,
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("contentgen=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn load_briefs(cli_path: Option<&PathBuf>, cfg: &AppCfg) -> Result<BriefSet> {
    let briefs = match cli_path.or(cfg.briefs_file.as_ref()) {
        Some(path) => BriefSet::load(path).await?,
        None => BriefSet::builtin()?,
    };
    Ok(briefs)
}

fn image_provider(cfg: &AppCfg, force_mock: bool) -> PipelineResult<Arc<dyn ImageProvider>> {
    if force_mock || cfg.image.kind == ProviderKind::Mock {
        return Ok(Arc::new(MockProvider));
    }
    Ok(Arc::new(IdeogramProvider::from_env(cfg.image.clone())?))
}

async fn build_pipeline(cli: &Cli, cfg: &AppCfg, force_mock: bool) -> Result<Pipeline> {
    let briefs = load_briefs(cli.briefs.as_ref(), cfg).await?;
    let text = OpenAiTextModel::from_env(cfg.text.clone()).context("text model unavailable")?;
    // a missing image key is reported when rendering is reached, after the copy exists
    let images = image_provider(cfg, force_mock);
    Ok(Pipeline::new(Arc::new(text), images, briefs, &cfg.text))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = AppCfg::load(cli.config.as_deref()).await?;

    match &cli.cmd {
        Cmd::Generate { title, image, channel, mock_images, json, save, out } => {
            let reference = ReferenceImage::from_path(image).await?;
            let pipeline = build_pipeline(&cli, &cfg, *mock_images).await?.with_progress(!*json);

            let report = pipeline.generate(title, Some(&reference), *channel).await.map_err(|e| {
                if let Some(raw) = e.raw_body() {
                    eprintln!("Raw response:\n{raw}");
                }
                e
            })?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", present::render_report(&report));
            }
            if *save || out.is_some() {
                let dir = out.as_ref().unwrap_or(&cfg.out_dir);
                let path = io::save_report(dir, &report).await?;
                eprintln!("Report written to {}", path.display());
            }
        }
        Cmd::Briefs => {
            let briefs = load_briefs(cli.briefs.as_ref(), &cfg).await?;
            for b in briefs.iter() {
                println!("{} ({} prompts)", b.channel.display_name(), b.count);
                for (i, c) in b.concepts.iter().enumerate() {
                    println!("  {}. {c}", i + 1);
                }
                if !b.personas.is_empty() {
                    let names: Vec<&str> = b.personas.iter().map(|p| p.name.as_str()).collect();
                    println!("  personas: {}", names.join(", "));
                }
            }
        }
        Cmd::Serve { bind } => {
            let pipeline = build_pipeline(&cli, &cfg, false).await?;
            api::serve(bind.clone(), Arc::new(pipeline)).await?;
        }
    }
    Ok(())
}
