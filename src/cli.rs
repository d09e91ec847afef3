use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ccmod", about = "LFO-modulated MIDI CC / program-change sliders")]
pub struct Cli {
    /// Optional config file (.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List available MIDI outputs
    Enumerate,
    /// Load a session and run its sliders until Ctrl+Q
    Run(RunArgs),
    /// Send one burst of random CCs (or program changes) and exit
    Randomize(RandomizeArgs),
    /// Write a starter session file
    Init {
        /// Path to create
        session: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Path to session file (.toml)
    pub session: PathBuf,

    /// MIDI output name filter (default: the session's saved device)
    #[arg(long)]
    pub device: Option<String>,
}

#[derive(clap::Args)]
pub struct RandomizeArgs {
    /// Path to session file (.toml); supplies CC exceptions
    pub session: PathBuf,

    /// MIDI output name filter (default: the session's saved device)
    #[arg(long)]
    pub device: Option<String>,

    /// Randomize program changes instead of CCs
    #[arg(long)]
    pub programs: bool,
}
