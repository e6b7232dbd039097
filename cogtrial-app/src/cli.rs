use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Trial runner for two-step and MaRS sessions
#[derive(Parser, Debug)]
#[command(name = "cogtrial", version, about = "Trial runner for two-step and MaRS sessions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the session's scripted input against a virtual clock
    Simulate(SessionArgs),
    /// Run the session in real time, reading `key <code>` / `click <target>` lines from stdin
    Run(SessionArgs),
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Session file (JSON)
    #[arg(value_name = "SESSION")]
    pub session: PathBuf,

    /// Seed for button shuffles and reward draws; overrides the session's seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write results here as JSON lines instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: Option<PathBuf>,
}

impl Command {
    pub fn args(&self) -> &SessionArgs {
        match self {
            Command::Simulate(args) | Command::Run(args) => args,
        }
    }
}
