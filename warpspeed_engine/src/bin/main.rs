// WarpSpeed Engine - src/bin/main.rs
//
// Command-line front end: restores the saved download list, adds the URLs given
// on the command line, shows progress and saves the list again on exit.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use warpspeed_engine::progress::ProgressObserver;
use warpspeed_engine::{
    DownloadParams, DownloaderState, Engine, EngineConfig, EngineError, HttpTransport, ResourceLocation,
};

/// A segmented, multi-source, resumable downloader.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL(s) to download. Each URL becomes its own download.
    #[arg(short, long, num_args = 1..)]
    urls: Vec<String>,

    /// Mirror URL(s) serving the same file, tried when a source fails.
    #[arg(short, long, num_args = 1..)]
    mirrors: Vec<String>,

    /// Output file name. Only valid with a single URL.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory downloads are saved into.
    #[arg(short = 'd', long, default_value = ".")]
    directory: PathBuf,

    /// Number of segments fetched in parallel per download.
    #[arg(short, long)]
    connections: Option<usize>,

    /// TOML file with engine settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the download list is saved between runs.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Also resume downloads restored from the state file.
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warpspeed_engine=info,warpspeed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), EngineError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(connections) = args.connections {
        config.default_segments = connections;
    }
    if let Some(state_file) = &args.state_file {
        config.persistence.path = state_file.clone();
    }
    config.validate()?;
    if args.output.is_some() && args.urls.len() > 1 {
        return Err(EngineError::Config("--output needs exactly one URL".into()));
    }

    let engine = Engine::new(config, Arc::new(HttpTransport::default()));
    engine.attach_observer(Arc::new(ProgressObserver::default()));
    engine.init().await?;
    let manager = Arc::clone(engine.manager());

    let mirrors = ResourceLocation::from_urls(args.mirrors.iter().cloned());
    for url in &args.urls {
        let local_file = match &args.output {
            Some(name) => args.directory.join(name),
            None => args.directory.join(file_name_from_url(url)?),
        };
        let params = DownloadParams::new(ResourceLocation::new(url.clone()), local_file).mirrors(mirrors.clone());
        manager.add(params, true).await?;
    }
    if args.resume {
        manager.resume_all().await?;
        manager.start_all().await?;
    }

    let active: Vec<_> = manager
        .downloads()?
        .into_iter()
        .filter(|d| d.state() == DownloaderState::Running)
        .collect();
    if active.is_empty() {
        tracing::info!("Nothing to download");
    } else {
        tokio::select! {
            states = join_all(active.iter().map(|d| d.wait_settled())) => {
                let failed = states.iter().filter(|s| **s == DownloaderState::Error).count();
                tracing::info!(finished = states.len() - failed, failed, "All downloads settled");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, pausing downloads");
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

fn file_name_from_url(url: &str) -> Result<String, EngineError> {
    let parsed = Url::parse(url).map_err(|e| EngineError::Config(format!("invalid URL {}: {}", url, e)))?;
    Path::new(parsed.path())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::Config(format!("could not derive a file name from {}", url)))
}
