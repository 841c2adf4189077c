use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

mod completion;
mod dispatch;
mod preflight;
mod prompt;
mod render;
mod selection;

#[derive(Parser, Debug)]
#[command(name = "gstpatch")]
#[command(version)]
#[command(
    about = "Swap CrossOver's bundled GStreamer for the system framework, and back",
    long_about = None
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.config/gstpatch/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory scanned for application bundles
    #[arg(long, global = true)]
    apps_root: Option<PathBuf>,
    /// Replacement winegstreamer.so to install
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,
    /// GStreamer framework directory that must exist on the host
    #[arg(long, global = true)]
    framework_dir: Option<PathBuf>,
    /// Disable badges, colours and progress bars
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// List discovered installations and their state
    List {
        #[arg(long)]
        json: bool,
    },
    /// Patch unpatched installations and restore patched ones
    Toggle(TargetArgs),
    /// Patch the selected installations; patched ones are skipped
    Patch(TargetArgs),
    /// Restore the selected installations from their backups
    Restore(TargetArgs),
    /// Show marker and backup details for every installation
    Status,
    /// Print a shell completion script
    Completions { shell: clap_complete::Shell },
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub(crate) struct TargetArgs {
    /// Act on every discovered installation
    #[arg(long)]
    all: bool,
    /// Comma separated 1-based indices as shown by `list`, or `all`/`none`
    #[arg(long, value_name = "CHOICE")]
    select: Option<String>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("GSTPATCH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch::run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            dispatch::EXIT_FATAL.into()
        }
    }
}

#[cfg(test)]
mod tests;
