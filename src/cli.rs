//! Command-line interface argument parsing

use std::path::PathBuf;

use clap::Parser;

/// Sekai Client - register a device account against the game API
#[derive(Parser, Debug)]
#[command(name = "sekai-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Register a device account and accept the rules against the game API")]
#[command(long_about = concat!(
    "Sekai Client (v", env!("CARGO_PKG_VERSION"), ")\n",
    "Runs the account bootstrap sequence: signature refresh, system info,\n",
    "user registration, rule agreement and authentication."
))]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Session configuration file (TOML)
    ///
    /// Defaults to $SEKAI_CLIENT_CONFIG, then ~/.config/sekai-client/session.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the rule agreement response here as JSON
    #[arg(long)]
    pub agreement_out: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
