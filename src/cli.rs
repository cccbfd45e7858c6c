use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "subrender")]
#[command(about = "Anime episode softsub/hardsub batch renderer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that ffmpeg is installed and report host capabilities
    CheckFfmpeg,

    /// Probe a raw episode file and print what the renderer detected
    Probe {
        /// Path to the video file
        file: PathBuf,

        /// Print the probe result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List raw episode candidates under a directory
    Scan {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,
    },

    /// Show ffmpeg invocations without executing (dry run)
    DryRun {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Render one or more episodes through the job queue
    Render {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Args)]
pub struct JobArgs {
    /// Raw video input(s); each becomes one queued job
    #[arg(required = true, value_name = "RAW")]
    pub raw: Vec<PathBuf>,

    /// Separate audio input (single raw only)
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Subtitle file (single raw only)
    #[arg(long)]
    pub sub: Option<PathBuf>,

    /// Episode name; defaults to the raw's file stem (single raw only)
    #[arg(long)]
    pub episode: Option<String>,

    /// Which output flavors to build
    #[arg(long, value_enum, default_value = "soft-and-hard")]
    pub build: BuildMode,

    /// Use the NVENC hardware encoders
    #[arg(long)]
    pub nvenc: bool,

    /// Skip the logo burn even when a logo is configured
    #[arg(long)]
    pub no_logo: bool,

    /// Low-resource encode settings
    #[arg(long)]
    pub potato: bool,

    /// Override the configured softsub output directory
    #[arg(long)]
    pub softsub_dir: Option<PathBuf>,

    /// Override the configured hardsub output directory
    #[arg(long)]
    pub hardsub_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildMode {
    SoftAndHard,
    SoftOnly,
    HardOnly,
    ForHardsubbers,
    RawRepair,
}

pub fn parse() -> Cli {
    Cli::parse()
}
