//! Reelcast CLI: command-line interface for previewing and exporting
//! scene timelines.
//!
//! Usage:
//!   reelcast export <TIMELINE>     Render a timeline to a video file
//!   reelcast preview <TIMELINE>    Play a timeline in real time
//!   reelcast still <TIMELINE>      Render one scene to a PNG
//!   reelcast validate <TIMELINE>   Check a timeline for problems
//!   reelcast info <TIMELINE>       Show timeline information
//!   reelcast check                 Check encoder and font availability
//!   reelcast init <PATH>           Write a sample timeline

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelcast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcast",
    about = "Render title-card timelines to video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/reelcast/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a timeline to a video file
    Export {
        /// Path to the timeline JSON
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        /// Render as fast as possible instead of in real time
        #[arg(long)]
        unthrottled: bool,

        /// Codec profile to try, in order (repeatable): vp9-webm, vp8-webm,
        /// h264-mp4, mpeg4-mkv
        #[arg(long = "codec")]
        codecs: Vec<String>,
    },

    /// Play a timeline in real time (Ctrl-C to stop)
    Preview {
        /// Path to the timeline JSON
        path: PathBuf,

        /// Save the first frame of each scene as a PNG in this directory
        #[arg(long)]
        snapshots: Option<PathBuf>,
    },

    /// Render a single scene to a PNG
    Still {
        /// Path to the timeline JSON
        path: PathBuf,

        /// Scene number (1-based)
        #[arg(long, default_value = "1")]
        scene: usize,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,
    },

    /// Check a timeline for problems
    Validate {
        /// Path to the timeline JSON
        path: PathBuf,
    },

    /// Show timeline information
    Info {
        /// Path to the timeline JSON
        path: PathBuf,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Check encoder and font availability
    Check,

    /// Write a sample timeline
    Init {
        /// Where to write the timeline
        #[arg(default_value = "timeline.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize logging
    reelcast_common::logging::init_logging(&config.logging)?;
    tracing::debug!(
        config = ?cli.config,
        fps = config.render.fps,
        width = config.render.width,
        height = config.render.height,
        "reelcast starting"
    );

    match cli.command {
        Commands::Export {
            path,
            output,
            fps,
            width,
            height,
            unthrottled,
            codecs,
        } => {
            let overrides = commands::export::Overrides {
                fps,
                width,
                height,
                unthrottled,
                codecs,
            };
            commands::export::run(config, path, output, overrides).await
        }
        Commands::Preview { path, snapshots } => {
            commands::preview::run(config, path, snapshots).await
        }
        Commands::Still {
            path,
            scene,
            output,
        } => commands::still::run(config, path, scene, output).await,
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path, json } => commands::info::run(&config, path, json),
        Commands::Check => commands::check::run(&config, cli.config.as_deref()).await,
        Commands::Init { path, force } => commands::init::run(path, force),
    }
}
