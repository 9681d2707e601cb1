//! skytube: announces new YouTube uploads on Bluesky.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ Vec<FeedItem> ┌──────────┐ title, url ┌────────────┐
//! │ source/   │ ────────────► │ poll.rs  │ ─────────► │ publish/   │
//! │ (feed/API)│               │ (loop)   │ ◄───────── │ (Bluesky)  │
//! └───────────┘               └──────────┘    bool    └────────────┘
//!                                  │ ▲
//!                          save()  │ │ load()
//!                                  ▼ │
//!                             ┌──────────┐
//!                             │ store.rs │
//!                             └──────────┘
//! ```
//!
//! * **`source/`**: the `FeedSource` trait with the channel feed and the
//!   Data API providers.
//! * **`store`**: the seen-video set on disk.
//! * **`publish/`**: login, post text, thumbnail, submission.
//! * **`poll`**: bulk registration and the monitoring loop.
//! * **`config`** / **`logging`**: startup plumbing.
//! * **`main`**: parses arguments, validates configuration and picks the
//!   operating mode.

mod config;
mod error;
mod http;
mod logging;
mod poll;
mod publish;
mod source;
mod store;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use tracing::{error, info, warn};

use config::Config;
use error::ConfigError;
use poll::RunState;
use publish::BlueskyPublisher;
use store::SeenStore;

/// Watch a YouTube channel and post each new video to Bluesky.
#[derive(Parser)]
#[command(name = "skytube")]
#[command(version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Register every current video as seen without posting, then exit
    #[arg(long)]
    build_db: bool,

    /// Use the YouTube Data API instead of the channel feed (needs youtube_api_key)
    #[arg(long)]
    use_api: bool,

    /// Also append log output to skytube.log in the current directory
    #[arg(long)]
    log: bool,

    /// Send no-cache headers and a cache-busting parameter with API requests
    #[arg(long)]
    no_cache: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log.then(|| Path::new(logging::LOG_FILE_NAME)))?;

    let mut config = load_config(&cli.config)?;
    config.use_api = cli.use_api;
    config.no_cache = cli.no_cache;

    if let Err(e) = config.validate(!cli.build_db) {
        report_invalid_config(&e);
        return Err(e.into());
    }

    let store = SeenStore::new(config.seen_videos_file.clone());
    let source = source::from_config(&config)?;
    let mut seen = store.load();

    if cli.build_db {
        let registration = poll::run_bulk_registration(&config, &mut seen, source.as_ref(), &store);
        if registration.newly_registered == 0 && registration.previously_known == registration.total {
            info!("database already up to date");
        }
        return Ok(());
    }

    info!(
        channel = %config.youtube_channel_id,
        source = source.name(),
        interval_secs = config.check_interval().as_secs_f64(),
        no_cache = config.no_cache,
        file_logging = cli.log,
        "YouTube to Bluesky auto-poster starting"
    );
    info!(count = seen.len(), file = %store.path().display(), "loaded previously seen videos");

    let run_state = RunState::new();
    let handler_state = run_state.clone();
    ctrlc::set_handler(move || handler_state.stop())
        .context("failed to install interrupt handler")?;

    let mut publisher = BlueskyPublisher::from_config(&config)?;
    poll::run_monitoring(
        &config,
        &mut seen,
        source.as_ref(),
        &mut publisher,
        &store,
        run_state,
    );
    info!("stopped");
    Ok(())
}

/// Load the config, offering to write an example when it does not exist.
fn load_config(path: &Path) -> Result<Config> {
    match Config::load(path) {
        Ok(config) => {
            info!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Err(ConfigError::NotFound(path)) => {
            error!(path = %path.display(), "configuration file not found");
            offer_example_config(&path);
            bail!("no usable configuration at {}", path.display())
        }
        Err(e) => Err(e.into()),
    }
}

fn offer_example_config(path: &Path) {
    let answer = Confirm::new()
        .with_prompt(format!("Create an example configuration at {}?", path.display()))
        .default(false)
        .interact();

    match answer {
        Ok(true) => match Config::write_example(path) {
            Ok(()) => {
                info!(outcome = "success", path = %path.display(), "example configuration created");
                info!("edit it with your YouTube channel id, Bluesky handle and app password (and optionally a YouTube API key), then run again");
            }
            Err(e) => error!(error = %e, "could not create example configuration"),
        },
        Ok(false) => warn!("no config file created"),
        Err(e) => warn!(error = %e, "prompt cancelled"),
    }
}

fn report_invalid_config(err: &ConfigError) {
    error!("{err}");
    match err {
        ConfigError::Missing(fields) => {
            for field in fields {
                error!("  set {field} in your config file");
            }
            if fields.contains(&"youtube_api_key") {
                for line in config::API_KEY_HELP.lines() {
                    warn!("{line}");
                }
            }
        }
        ConfigError::ChannelId(_) => {
            error!("channel ids look like 'UCxxxxxxxxxxxxxxxx' (from the channel URL after /channel/)");
        }
        _ => {}
    }
}
