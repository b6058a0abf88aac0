mod ai;
mod capture;
mod chunk;
mod detect;
mod media;
mod render;
mod storyline;
mod summary;
mod types;
mod workspace;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai::ModelClient;
use types::{RenderInput, StorylineInput, SummariesInput};
use workspace::TaskWorkspace;

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(about = "Turn raw footage into a narrated highlight reel", long_about = None)]
struct Cli {
    /// Root of the task-scoped scratch tree
    #[arg(long, global = true, default_value = "./tmp")]
    tmp_root: PathBuf,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe and rate every input video
    GenerateSummaries {
        input_json: PathBuf,
        output_json: PathBuf,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Assemble a cross-video storyline from existing summaries
    GenerateStoryline {
        input_json: PathBuf,
        output_json: PathBuf,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Concatenate storyline clips into the final video
    GenerateVideo {
        input_json: PathBuf,
        output_path: PathBuf,
    },
    /// Remove the whole scratch tree
    CleanUp,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    Openai,
    Azure,
}

#[derive(Args)]
struct ProviderArgs {
    #[arg(long, value_enum, default_value_t = Provider::Openai)]
    provider: Provider,
    /// Falls back to OPENAI_API_KEY for the openai provider
    #[arg(long)]
    api_key: Option<String>,
    /// Azure endpoint, azure provider only
    #[arg(long)]
    endpoint: Option<String>,
    /// Azure deployment name, azure provider only
    #[arg(long)]
    deployment_name: Option<String>,
    #[arg(long, default_value = "gpt-4o")]
    model: String,
}

impl ProviderArgs {
    fn client(&self) -> anyhow::Result<ModelClient> {
        match self.provider {
            Provider::Openai => Ok(ModelClient::openai(self.api_key.as_deref(), &self.model)),
            Provider::Azure => {
                let api_key = self
                    .api_key
                    .as_deref()
                    .context("--api-key is required for the azure provider")?;
                let endpoint = self
                    .endpoint
                    .as_deref()
                    .context("--endpoint is required for the azure provider")?;
                let deployment = self
                    .deployment_name
                    .as_deref()
                    .context("--deployment-name is required for the azure provider")?;
                Ok(ModelClient::azure(api_key, endpoint, deployment, &self.model))
            }
        }
    }
}

fn read_input<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read input JSON {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("malformed input JSON {}", path.display()))
}

fn write_output<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)
        .with_context(|| format!("failed to write output JSON {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "storyreel=debug"
    } else {
        "storyreel=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::GenerateSummaries {
            input_json,
            output_json,
            provider,
        } => {
            media::ensure_ffmpeg().await?;
            capture::init();
            let client = provider.client()?;
            let input: SummariesInput = read_input(&input_json)?;
            let ws = TaskWorkspace::new(&cli.tmp_root, &input.task_id);
            let summaries = summary::generate_summaries(&client, &ws, &input.files).await?;
            write_output(&output_json, &summaries)?;
            info!(videos = summaries.len(), "summaries written");
        }
        Command::GenerateStoryline {
            input_json,
            output_json,
            provider,
        } => {
            media::ensure_ffmpeg().await?;
            let client = provider.client()?;
            let input: StorylineInput = read_input(&input_json)?;
            let ws = TaskWorkspace::new(&cli.tmp_root, &input.task_id);
            let storyline = storyline::generate_storyline(
                &client,
                &ws,
                &input.summaries,
                &input.prompt,
                input.duration,
            )
            .await?;
            write_output(&output_json, &storyline)?;
            info!(entries = storyline.len(), "storyline written");
        }
        Command::GenerateVideo {
            input_json,
            output_path,
        } => {
            media::ensure_ffmpeg().await?;
            let input: RenderInput = read_input(&input_json)?;
            let ws = TaskWorkspace::new(&cli.tmp_root, &input.task_id);
            render::render_video(&ws, &input.segments, &output_path).await?;
            info!(output = %output_path.display(), "video rendered");
        }
        Command::CleanUp => {
            TaskWorkspace::remove_root(&cli.tmp_root)?;
            info!("scratch tree removed");
        }
    }

    Ok(())
}
