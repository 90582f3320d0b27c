// CLI controller for the PhotoRoom batch pipelines
//
// Starts a pipeline run on its dedicated worker task, then polls the
// run's event channel on a timer, draining all queued events per tick.
// Ctrl-C requests cancellation, observed between items.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use photoroom_workflow::core::types::{
    BatchRequest, CompositeRequest, ProgressEvent, RunHandle, SegmentationRequest,
};
use photoroom_workflow::core::Config;
use photoroom_workflow::services::{ApiKeyStore, CompositingService, SegmentationService};
use photoroom_workflow::utils::save_canvas;

#[derive(Parser)]
#[command(
    name = "photoroom-workflow",
    version,
    about = "Batch background removal and logo compositing for image folders"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove backgrounds from every image under the input folder
    Segment {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// API key; falls back to the persisted key file
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Resize every image into the square canvas and stamp the logo
    Composite {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        logo: PathBuf,
        /// Vertical space reserved below the image (signed px)
        #[arg(long, allow_hyphen_values = true)]
        bottom_reserve: Option<i32>,
    },
    /// Compose a single image and write the canvas, without a batch run
    Preview {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        logo: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        bottom_reserve: Option<i32>,
        /// Where to write the preview canvas
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },
    /// Manage the persisted API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Save the key, replacing any stored one
    Set { key: String },
    /// Delete the stored key
    Clear,
    /// Print the stored key
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "photoroom_workflow={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Segment {
            input,
            output,
            api_key,
        } => run_segment(config, input, output, api_key).await,
        Command::Composite {
            input,
            output,
            logo,
            bottom_reserve,
        } => run_composite(config, input, output, logo, bottom_reserve).await,
        Command::Preview {
            image,
            logo,
            bottom_reserve,
            out,
        } => run_preview(config, image, logo, bottom_reserve, out).await,
        Command::Key { action } => run_key(&config, action),
    }
}

async fn run_segment(
    config: Arc<Config>,
    input: PathBuf,
    output: PathBuf,
    api_key: Option<String>,
) -> Result<()> {
    // Empty key is reported by the worker as a fatal event
    let api_key = match api_key {
        Some(key) => key,
        None => ApiKeyStore::new(config.key_path())
            .load()?
            .unwrap_or_default(),
    };

    let service = SegmentationService::new(Arc::clone(&config))?;
    let handle = service.start(SegmentationRequest {
        batch: BatchRequest::new(input, output),
        api_key,
    })?;

    drive(handle, &config).await
}

async fn run_composite(
    config: Arc<Config>,
    input: PathBuf,
    output: PathBuf,
    logo: PathBuf,
    bottom_reserve: Option<i32>,
) -> Result<()> {
    let service = CompositingService::new();
    let handle = service.start(CompositeRequest {
        batch: BatchRequest::new(input, output),
        logo_path: logo,
        bottom_reserve: bottom_reserve.unwrap_or_else(|| config.bottom_reserve()),
    })?;

    drive(handle, &config).await
}

async fn run_preview(
    config: Arc<Config>,
    image: PathBuf,
    logo: PathBuf,
    bottom_reserve: Option<i32>,
    out: PathBuf,
) -> Result<()> {
    let service = CompositingService::new();
    let canvas = service
        .preview(
            &image,
            &logo,
            bottom_reserve.unwrap_or_else(|| config.bottom_reserve()),
        )
        .await?;

    save_canvas(canvas, &out)?;
    info!(out = %out.display(), "Preview written");
    Ok(())
}

fn run_key(config: &Config, action: KeyAction) -> Result<()> {
    let store = ApiKeyStore::new(config.key_path());
    match action {
        KeyAction::Set { key } => store.save(&key)?,
        KeyAction::Clear => store.clear()?,
        KeyAction::Show => match store.load()? {
            Some(key) => println!("{key}"),
            None => println!("no API key stored"),
        },
    }
    Ok(())
}

/// Poll the run until its worker finishes, applying queued events in
/// emission order each tick.
async fn drive(mut handle: RunHandle, config: &Config) -> Result<()> {
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, finishing the current item");
            token.cancel();
        }
    });

    let mut interval = tokio::time::interval(config.poll_interval());
    let mut bar: Option<ProgressBar> = None;
    let mut fatal: Option<String> = None;

    loop {
        interval.tick().await;

        for event in handle.drain() {
            apply_event(event, &mut bar, &mut fatal);
        }

        if handle.is_finished() {
            // Catch events emitted between the drain and the worker exit
            for event in handle.drain() {
                apply_event(event, &mut bar, &mut fatal);
            }
            break;
        }
    }

    match fatal {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn apply_event(event: ProgressEvent, bar: &mut Option<ProgressBar>, fatal: &mut Option<String>) {
    match event {
        ProgressEvent::Started { total } => {
            *bar = Some(ProgressBar::new(total as u64));
        }
        ProgressEvent::Progress { done } => {
            if let Some(bar) = bar {
                bar.set_position(done as u64);
            }
        }
        ProgressEvent::ItemError { path, message } => {
            warn!("Error processing {}: {}", path.display(), message);
        }
        ProgressEvent::Info(message) => {
            info!("{message}");
        }
        ProgressEvent::Canceled => {
            if let Some(bar) = bar.take() {
                bar.abandon();
            }
            warn!("Processing was canceled.");
        }
        ProgressEvent::Completed => {
            if let Some(bar) = bar.take() {
                bar.finish();
            }
            info!("Processing completed successfully.");
        }
        ProgressEvent::FatalError(message) => {
            error!("{message}");
            *fatal = Some(message);
        }
    }
}
