use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clipfetch",
    about = "clipfetch - Download videos from YouTube, Instagram, Facebook and TikTok under a size limit",
    version,
    long_about = "Resolves a social-media link to a local video file. Tries a remote resolver service first when one is configured, then falls back to yt-dlp with cached cookies for platforms that need a login."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "CLIPFETCH_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the video behind a URL
    Fetch {
        /// Link to a YouTube, Instagram, Facebook or TikTok video
        #[arg(value_name = "URL")]
        url: String,

        /// Where to write the video (defaults to the downloaded file name in the current directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Manage the shared cookie jar used for login-gated platforms
    Cookies {
        #[command(subcommand)]
        action: CookiesAction,
    },

    /// List supported platforms
    Platforms,

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a configuration file with default values
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(Subcommand)]
pub enum CookiesAction {
    /// Upload a Netscape cookie file to the credential store
    Upload {
        /// Cookie file (searches ./cookies.txt and the downloads folder if omitted)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
