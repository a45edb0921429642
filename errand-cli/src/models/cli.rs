use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Errand: run deployment errands through a director.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file (defaults to errand.toml in this or a parent directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Director URL, overriding the configuration file.
    #[arg(short = 'e', long, global = true)]
    pub director: Option<String>,

    /// Deployment name, overriding the configuration file.
    #[arg(short, long, global = true)]
    pub deployment: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an errand and wait for it to finish.
    Run(RunErrandArgs),
}

#[derive(Args, Debug)]
pub struct RunErrandArgs {
    /// Name of the errand to run.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub name: String,

    /// Keep the errand's VMs running after it finishes.
    #[arg(long)]
    pub keep_alive: bool,

    /// Download the errand's logs when it succeeds.
    #[arg(long)]
    pub download_logs: bool,

    /// Directory for downloaded logs (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    pub logs_dir: Option<PathBuf>,
}
