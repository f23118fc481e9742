use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use bookcover_app::covers::{
    client::HttpGenerationClient,
    download::{DownloadHelper, DownloadOutcome},
    models::{CoverForm, CoverFormPatch, GenerationResult, ImageRef},
    prompt::{Emphasis, PromptBuilder, PromptTemplate},
    workspace::{CoverWorkspace, SubmitError},
};
use bookcover_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "bookcover", version, about = "Build book cover prompts and generate covers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the prompt for a cover without sending it
    Prompt {
        #[command(flatten)]
        cover: CoverArgs,
        /// Override the configured emphasis (standard, strict, character-map)
        #[arg(long)]
        emphasis: Option<Emphasis>,
    },
    /// Generate a cover and print the image URL
    Generate {
        #[command(flatten)]
        cover: CoverArgs,
        #[arg(long)]
        emphasis: Option<Emphasis>,
        /// Also save the image into this directory
        #[arg(long, value_name = "DIR")]
        download: Option<PathBuf>,
    },
    /// Save an already generated image under the book title
    Download {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        /// Defaults to the configured download directory
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Run the HTTP service
    Serve,
}

#[derive(Debug, Args)]
struct CoverArgs {
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    author: String,
    #[arg(long, default_value = "")]
    genre: String,
    #[arg(long)]
    mood: Option<String>,
    #[arg(long)]
    colors: Option<String>,
    #[arg(long)]
    art_style: Option<String>,
    #[arg(long)]
    visual_elements: Option<String>,
    #[arg(long)]
    target_audience: Option<String>,
}

impl CoverArgs {
    fn into_patch(self) -> CoverFormPatch {
        CoverFormPatch {
            title: Some(self.title),
            author: Some(self.author),
            genre: Some(self.genre),
            mood: self.mood,
            colors: self.colors,
            art_style: self.art_style,
            visual_elements: self.visual_elements,
            target_audience: self.target_audience,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load cover service settings")?;
    bookcover_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Prompt { cover, emphasis } => {
            let mut form = CoverForm::default();
            form.apply(cover.into_patch());
            let request = form.snapshot()?;
            println!("{}", prompt_builder(&settings, emphasis).build(&request));
        }
        Command::Generate {
            cover,
            emphasis,
            download,
        } => {
            let title = cover.title.clone();
            let image = generate(&settings, emphasis, cover.into_patch()).await?;
            println!("{}", image);

            if let Some(directory) = download {
                let helper = DownloadHelper::new(settings.download.fallback_name.clone());
                report(helper.download(&image, &title, &directory).await);
            }
        }
        Command::Download { url, title, dir } => {
            let directory = dir.unwrap_or_else(|| settings.download.directory.clone());
            let helper = DownloadHelper::new(settings.download.fallback_name.clone());
            report(helper.download(&ImageRef::new(url), &title, &directory).await);
        }
        Command::Serve => bookcover_app::serve(&settings).await?,
    }

    Ok(())
}

fn prompt_builder(settings: &Settings, emphasis: Option<Emphasis>) -> PromptBuilder {
    let template = PromptTemplate::from(&settings.prompt);
    let template = match emphasis {
        Some(emphasis) => template.with_emphasis(emphasis),
        None => template,
    };
    PromptBuilder::new(template)
}

async fn generate(
    settings: &Settings,
    emphasis: Option<Emphasis>,
    patch: CoverFormPatch,
) -> anyhow::Result<ImageRef> {
    let generator = Arc::new(HttpGenerationClient::new(settings.generation.endpoint()));
    let workspace = CoverWorkspace::new(prompt_builder(settings, emphasis), generator);
    workspace.apply(patch).await;

    match workspace.generate().await {
        Ok(GenerationResult::Image { image_url }) => Ok(image_url),
        Ok(GenerationResult::Failed { message }) => bail!("generation failed: {}", message),
        Err(SubmitError::Invalid(err)) => Err(err.into()),
        Err(SubmitError::InProgress) => bail!("a cover is already being generated"),
    }
}

fn report(outcome: DownloadOutcome) {
    match outcome {
        DownloadOutcome::Saved(path) => println!("saved {}", path.display()),
        DownloadOutcome::OpenExternally(image) => {
            eprintln!("could not save the image; open it directly:");
            println!("{}", image);
        }
    }
}
