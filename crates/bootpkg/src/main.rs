//! # bootpkg
//!
//! Build a bootloader installer package from its upstream sources.
//!
//! ## Usage
//!
//! ```bash
//! bootpkg build                  # Sync, build and package (root: ~/src)
//! bootpkg build --root /work     # Use another working directory
//! bootpkg build --revision 4920  # Pin the bootloader tree
//! bootpkg build --no-drivers     # Skip driver sub-builds
//! bootpkg status                 # Show sync/cache status and last build
//! bootpkg revision               # Print the checked-out bootloader revision
//! bootpkg doctor                 # Check host tools
//! ```
//!
//! Log verbosity follows `RUST_LOG`; `--debug` also streams command output.

use anyhow::Result;
use bootpkg::builder::{self, status::StatusReport, BuildCommands};
use bootpkg::SystemRunner;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bootpkg", about = "Bootloader installer package builder")]
struct Cli {
    /// Stream command output and log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: BuildCommands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let runner = SystemRunner;
    match cli.command {
        BuildCommands::Build { config, no_drivers } => {
            let mut config = config.load(cli.debug)?;
            if no_drivers {
                config.drivers.clear();
            }
            let artifact = builder::build(&runner, &config)?;
            println!("{}", artifact.display());
        }
        BuildCommands::Status { config } => {
            StatusReport::collect(&runner, &config.load(cli.debug)?)?.print();
        }
        BuildCommands::Revision { config } => builder::revision(&runner, &config.load(cli.debug)?)?,
        BuildCommands::Doctor => builder::doctor::run()?,
    }

    Ok(())
}
