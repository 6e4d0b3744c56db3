use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use storyreel_client::{GenerationClient, HttpGenerationClient};
use storyreel_common::{StoryConfig, SILENT_VIDEO_NOTICE};
use storyreel_core::audio_output::AudioOutput;
use storyreel_core::{
    assemble, export_audio, export_story, export_video, AudioExportMode, CaptureSettings,
    FfmpegRecorder, ImageFrameSource, ProcessAudioOutput, Session, Studio, StudioOptions,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "storyreel", version)]
#[command(about = "Turn a prompt into a narrated, illustrated slideshow")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (defaults to <config dir>/storyreel/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the generation service
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory exports are written to
    #[arg(long = "out", global = true)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive player (the default)
    Play,
    /// Generate a story and its slides, then export them
    Generate {
        prompt: String,
        #[command(flatten)]
        exports: ExportArgs,
    },
    /// Rebuild slides from an existing story file, then export them
    Render {
        story_file: PathBuf,
        #[command(flatten)]
        exports: ExportArgs,
    },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Also record story_video.webm (requires ffmpeg)
    #[arg(long)]
    pub video: bool,

    /// Write the story audio as one re-encoded WAV instead of joined clips
    #[arg(long)]
    pub remux_audio: bool,

    /// Play the audio while the video is recorded
    #[arg(long)]
    pub monitor: bool,
}

impl Cli {
    fn apply(&self, config: &mut StoryConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }

    fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Commands::Play))
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let mut config = StoryConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    init_tracing(&config, cli.debug, cli.is_interactive())?;

    let client = Arc::new(HttpGenerationClient::with_timeout(
        &config.base_url,
        config.request_timeout(),
    )?);
    info!("Using generation service at {}", client.base_url());

    match cli.command {
        None | Some(Commands::Play) => run_play(client, &config).await,
        Some(Commands::Generate { prompt, exports }) => {
            run_headless(client, &config, StorySource::Prompt(prompt), &exports).await
        }
        Some(Commands::Render { story_file, exports }) => {
            run_headless(client, &config, StorySource::File(story_file), &exports).await
        }
    }
}

/// Log to a file while the TUI owns the terminal, to stderr otherwise.
fn init_tracing(config: &StoryConfig, debug: bool, interactive: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if interactive { "info" } else { "warn" })
        })
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if interactive {
        let path = config.log_path_or_default();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

async fn run_play(client: Arc<HttpGenerationClient>, config: &StoryConfig) -> Result<()> {
    let player = config.player_command.clone();
    let studio = Studio::spawn(client, StudioOptions::from_config(config), move |events| {
        ProcessAudioOutput::new(player.clone(), events)
    });
    storyreel_tui::run_interactive(studio).await
}

enum StorySource {
    Prompt(String),
    File(PathBuf),
}

async fn load_story(
    client: &HttpGenerationClient,
    session: &mut Session,
    source: StorySource,
) -> Result<()> {
    match source {
        StorySource::Prompt(prompt) => {
            let (cycle, prompt) = session.begin_story(&prompt)?;
            println!("Writing a story about \"{prompt}\"...");
            let result = client.story(&prompt).await;
            session
                .complete_story(cycle, result)
                .context("story request was superseded")??;
        }
        StorySource::File(path) => {
            let text = read_story(&path).await?;
            session.edit_story(text);
        }
    }
    Ok(())
}

async fn read_story(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading story from {}", path.display()))?;
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "{} is empty", path.display());
    Ok(text.to_string())
}

async fn run_headless(
    client: Arc<HttpGenerationClient>,
    config: &StoryConfig,
    source: StorySource,
    exports: &ExportArgs,
) -> Result<()> {
    let mut session = Session::new();
    load_story(&client, &mut session, source).await?;
    println!("\n{}\n", session.story().unwrap_or_default());

    let (cycle, story) = session.begin_slides().context("no story to illustrate")?;
    println!("Creating visuals and audio...");
    let result = assemble(client.as_ref(), &story).await;
    let assembly = session
        .complete_slides(cycle, result)
        .context("slide request was superseded")??;
    for failure in &assembly.failures {
        eprintln!(
            "Skipped sentence {} \"{}\": {}",
            failure.index + 1,
            failure.caption,
            failure.reason
        );
    }
    let slides = assembly.slides;
    println!("{} slides ready", slides.len());

    let dir = &config.output_dir;
    let path = export_story(dir, session.story()).await?;
    println!("Saved story to {}", path.display());

    let mode = if exports.remux_audio {
        AudioExportMode::Remux
    } else {
        AudioExportMode::Concatenate
    };
    let path = export_audio(dir, &slides, mode).await?;
    println!("Saved audio to {}", path.display());

    if exports.video {
        eprintln!("{SILENT_VIDEO_NOTICE}");
        let mut recorder = FfmpegRecorder::new(config.ffmpeg_path.clone());
        let source = ImageFrameSource::new(Arc::clone(&client));
        let (events, _ignored) = mpsc::unbounded_channel();
        let mut monitor = exports
            .monitor
            .then(|| ProcessAudioOutput::new(config.player_command.clone(), events));
        let export = export_video(
            dir,
            &slides,
            &CaptureSettings::from_config(config),
            &source,
            &mut recorder,
            monitor.as_mut().map(|output| output as &mut dyn AudioOutput),
        )
        .await?;
        println!(
            "Saved video to {} ({} frames), captions to {}",
            export.video.display(),
            export.report.frames,
            export.captions.display()
        );
    }
    Ok(())
}
