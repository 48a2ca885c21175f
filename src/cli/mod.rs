//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "whosaid",
    version,
    author = "neur0map",
    about = "Turn chat exports into a 'who said it?' party quiz",
    long_about = "whosaid cleans exported chat history, picks the most distinctive messages using \
                  sentence embeddings, and proposes look-alike authors for each one. The resulting \
                  quiz is played from the terminal with a shared game state for host and players."
)]
pub struct Cli {
    /// Config file path (defaults to ./whosaid.toml, then ~/.config/whosaid/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the history and quiz tables from the exports in data_path
    Preprocess {
        /// Profile from the [profiles] section to apply on top of the config
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Host or play a game
    Game {
        #[command(subcommand)]
        action: GameAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section (game, selection, filters, embedding)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GameAction {
    /// Clear the selection and all guesses, back to the lobby
    Reset,

    /// Pick questions and open the first one
    Start {
        /// Number of questions to play
        #[arg(short = 'n', long)]
        questions: usize,

        /// Seed for a reproducible selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Advance to the next page (question -> reveal -> question ...)
    Next,

    /// Show the current page
    Show {
        /// Show the page as this player sees it
        #[arg(short, long)]
        player: Option<String>,
    },

    /// Answer the open question
    Guess {
        #[arg(short, long)]
        player: String,

        /// One of the listed candidate names
        #[arg(long)]
        choice: String,
    },

    /// Show the scoreboard
    Scores,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
