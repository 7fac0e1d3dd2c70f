// src/cli/mod.rs — CLI definition (clap derive)

pub mod generate;
pub mod providers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kindred",
    about = "Companion-chat generation with provider fallback",
    version
)]
pub struct Cli {
    /// Config file path (default: ~/.kindred/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Preferred provider id; configured backups follow it
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the bot's next reply
    Reply {
        /// JSON transcript: [{"role":"user","text":"..."}, ...]
        #[arg(long)]
        transcript: PathBuf,
        /// Bot personality / system prompt
        #[arg(long)]
        system: String,
    },
    /// Suggest the user's next message
    Suggest {
        #[arg(long)]
        transcript: PathBuf,
        /// Bot personality the suggestion answers
        #[arg(long)]
        system: String,
    },
    /// Generate an opening line for a new scene
    Scenario {
        #[arg(long)]
        personality: String,
        #[arg(long)]
        theme: Option<String>,
    },
    /// Generate an image
    Image {
        #[arg(long)]
        prompt: String,
        /// Reference image whose subject should be preserved
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Where to write the image
        #[arg(long)]
        out: PathBuf,
    },
    /// Generate a short hook line for a bot card
    Teaser {
        #[arg(long)]
        personality: String,
        /// Keep refreshing until Ctrl-C
        #[arg(long)]
        watch: bool,
        #[arg(long, default_value = "15")]
        interval_secs: u64,
    },
    /// List configured providers and whether they are usable
    Providers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_with_global_provider() {
        let cli = Cli::parse_from([
            "kindred",
            "reply",
            "--transcript",
            "chat.json",
            "--system",
            "You are Luna.",
            "--provider",
            "qwen",
        ]);
        assert_eq!(cli.provider.as_deref(), Some("qwen"));
        match cli.command {
            Commands::Reply { transcript, system } => {
                assert_eq!(transcript, PathBuf::from("chat.json"));
                assert_eq!(system, "You are Luna.");
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn test_parse_teaser_defaults() {
        let cli = Cli::parse_from(["kindred", "teaser", "--personality", "A witch."]);
        match cli.command {
            Commands::Teaser {
                watch,
                interval_secs,
                ..
            } => {
                assert!(!watch);
                assert_eq!(interval_secs, 15);
            }
            _ => panic!("expected teaser"),
        }
    }

    #[test]
    fn test_image_requires_out() {
        assert!(Cli::try_parse_from(["kindred", "image", "--prompt", "a fox"]).is_err());
    }
}
