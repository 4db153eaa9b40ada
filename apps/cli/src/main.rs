use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use insightcast_core::{
    ApiConfig, DownloadOutcome, LanguageCode, PodcastLength, SourceContentRef,
    download::default_download_dir,
    events::BusConfig,
    format::{format_clock, format_duration_label},
    types::Insight,
};
use tokio::fs;
use tracing_subscriber::EnvFilter;

use crate::{
    pipeline::{PipelineHandle, PipelineOptions, start_pipeline},
    workers::{
        cli_updates_sink::CliUpdate,
        events::{
            DownloadRequested, PlaybackToggleRequested, PodcastRequested, SeekRequested,
            SessionChanged, SessionPhase, SessionResetRequested,
        },
    },
};

mod headless;
mod pipeline;
mod workers;

const CLOCK_PERIOD: Duration = Duration::from_millis(250);

fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for PodcastLength (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl From<CliLength> for PodcastLength {
    fn from(cli: CliLength) -> Self {
        match cli {
            CliLength::Short => PodcastLength::Short,
            CliLength::Medium => PodcastLength::Medium,
            CliLength::Long => PodcastLength::Long,
        }
    }
}

#[derive(Parser)]
#[command(name = "insightcast")]
#[command(about = "Turn selected text and its insights into an AI podcast, then save or play it")]
struct Cli {
    /// Text the podcast is about. Read from --file when omitted.
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// JSON array of insights ({"type", "title", "content", "source_documents", "confidence"})
    #[arg(long)]
    insights: Option<PathBuf>,

    /// Id of the document the text was selected from
    #[arg(long)]
    document_id: Option<String>,

    /// Podcast language (en, es, fr, de, hi, ja, zh, or any code the backend accepts)
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// Podcast length preset
    #[arg(long, value_enum, default_value = "medium")]
    length: CliLength,

    /// Where to save the podcast. Defaults to the user's download directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Backend base URL (overrides INSIGHTCAST_API_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token (overrides INSIGHTCAST_AUTH_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Request timeout in milliseconds (overrides INSIGHTCAST_API_TIMEOUT_MS)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip saving the podcast
    #[arg(long)]
    no_download: bool,

    /// Play the podcast through a headless clock once it is ready
    #[arg(short, long)]
    play: bool,

    /// Start playback at this fraction of the podcast (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    start_at: f64,

    /// List the languages with a display name and exit
    #[arg(long)]
    languages: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("insightcast=info,insightcast_core=info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn api_config(cli: &Cli) -> Result<ApiConfig> {
    let mut config = ApiConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(token) = &cli.token {
        config = config.with_auth_token(token.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    Ok(config)
}

async fn load_source(cli: &Cli) -> Result<SourceContentRef> {
    let selected_text = match (&cli.text, &cli.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path).await?,
        (None, None) => String::new(),
    };
    let insights: Vec<Insight> = match &cli.insights {
        Some(path) => serde_json::from_str(&fs::read_to_string(path).await?)?,
        None => Vec::new(),
    };
    Ok(SourceContentRef {
        document_id: cli.document_id.clone(),
        selected_text,
        insights,
    })
}

/// Wait for a session report matching `pred`. Pipeline failures abort.
async fn wait_for_session(
    handle: &mut PipelineHandle,
    mut on_update: impl FnMut(&SessionChanged),
    mut pred: impl FnMut(&SessionChanged) -> bool,
) -> Result<SessionChanged> {
    loop {
        match handle.updates.recv().await {
            Some(CliUpdate::Session(s)) => {
                on_update(&s);
                if pred(&s) {
                    return Ok(s);
                }
            }
            Some(CliUpdate::Failed(f)) => bail!("{} failed: {}", f.stage, f.message),
            Some(CliUpdate::Download(_)) => {}
            None => bail!("pipeline stopped unexpectedly"),
        }
    }
}

async fn wait_for_download(handle: &mut PipelineHandle) -> Result<DownloadOutcome> {
    loop {
        match handle.updates.recv().await {
            Some(CliUpdate::Download(d)) => {
                return match &*d.outcome {
                    Ok(outcome) => Ok(outcome.clone()),
                    Err(e) => bail!("{e}"),
                };
            }
            Some(CliUpdate::Failed(f)) => bail!("{} failed: {}", f.stage, f.message),
            Some(CliUpdate::Session(_)) => {}
            None => bail!("pipeline stopped unexpectedly"),
        }
    }
}

async fn play(handle: &mut PipelineHandle, start_at: f64) -> Result<()> {
    if start_at > 0.0 {
        handle.bus.publish(std::sync::Arc::new(SeekRequested::new(start_at)));
    }
    handle
        .bus
        .publish(std::sync::Arc::new(PlaybackToggleRequested::new()));

    let bar = ProgressBar::new(1000);
    if let Ok(bar_style) = ProgressStyle::default_bar().template("{bar:40.cyan/blue} {msg}") {
        bar.set_style(bar_style.progress_chars("━╸─"));
    }

    let mut started = false;
    wait_for_session(
        handle,
        |s| {
            let p = s.playback;
            bar.set_position((p.progress() * 1000.0) as u64);
            bar.set_message(format!(
                "{} / {}",
                format_clock(p.current_time_seconds),
                format_duration_label(p.duration_seconds)
            ));
        },
        |s| {
            if s.playback.is_playing {
                started = true;
            }
            started && !s.playback.is_playing
        },
    )
    .await?;
    bar.finish();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if cli.languages {
        for lang in LanguageCode::SUPPORTED {
            println!("{:<4} {}", lang.code(), lang.display_name());
        }
        return Ok(());
    }

    let source = load_source(&cli).await?;
    let language = LanguageCode::from(cli.lang.as_str());
    let download_dir = cli.out_dir.clone().unwrap_or_else(default_download_dir);

    println!(
        "\n{}  {}\n",
        style("insightcast").cyan().bold(),
        style("AI Podcast").dim()
    );

    let mut handle = start_pipeline(
        BusConfig::default(),
        PipelineOptions {
            api: api_config(&cli)?,
            download_dir,
            clock_period: cli.play.then_some(CLOCK_PERIOD),
        },
    )
    .await?;

    println!("{}", style("─".repeat(60)).dim());
    let total_start = Instant::now();

    // Step 1: generate
    let spinner = create_spinner(&format!(
        "Generating {} podcast...",
        language.display_name()
    ));
    handle.bus.publish(std::sync::Arc::new(PodcastRequested::new(
        language,
        cli.length.into(),
        source,
    )));
    let settled = wait_for_session(
        &mut handle,
        |_| {},
        |s| matches!(s.phase, SessionPhase::Ready | SessionPhase::Failed),
    )
    .await;

    let failure = match settled {
        Ok(s) => match s.generation_error() {
            None => Ok(s),
            Some(e) => Err(anyhow::Error::from(e)),
        },
        Err(e) => Err(e),
    };
    let ready = match failure {
        Ok(s) => s,
        Err(e) => {
            spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), e));
            let _ = handle.shutdown_tx.send(());
            return Err(e);
        }
    };
    spinner.finish_with_message(format!(
        "{} Podcast ready: {} {}",
        style("✓").green().bold(),
        style(format_duration_label(ready.playback.duration_seconds)).yellow(),
        style(format!("[{}]", format_elapsed(total_start.elapsed()))).dim()
    ));

    // Step 2: save
    if !cli.no_download {
        let spinner = create_spinner("Saving podcast...");
        handle.bus.publish(std::sync::Arc::new(DownloadRequested::new()));
        match wait_for_download(&mut handle).await {
            Ok(DownloadOutcome::Saved(path)) => spinner.finish_with_message(format!(
                "{} Saved: {}",
                style("✓").green().bold(),
                style(path.display()).cyan()
            )),
            Ok(DownloadOutcome::OpenedExternally(url)) => spinner.finish_with_message(format!(
                "{} Opened in browser: {}",
                style("✓").green().bold(),
                style(url).cyan()
            )),
            Ok(DownloadOutcome::AlreadyInProgress) => spinner.finish_and_clear(),
            Err(e) => spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), e)),
        }
    }

    // Step 3: play
    if cli.play {
        println!("{} Playing", style("▶").cyan().bold());
        play(&mut handle, cli.start_at).await?;
    }

    handle
        .bus
        .publish(std::sync::Arc::new(SessionResetRequested::new()));
    wait_for_session(&mut handle, |_| {}, |s| s.phase == SessionPhase::Idle).await?;
    tracing::debug!(stats = ?handle.manager.stats(), "session released");
    let _ = handle.shutdown_tx.send(());

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_elapsed(total_start.elapsed())).cyan().bold()
    );

    if !ready.transcript.is_empty() {
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", ready.transcript);
    }

    Ok(())
}
