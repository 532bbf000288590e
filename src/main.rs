//! `pedigree`: keep a family tree in a text file and chart it.
//!
//! - **`generate`**: write `<base>.html`, `<base>.dot` and, when Graphviz is
//!   installed, `<base>.svg` from the relations file.
//! - **`cleanup`**: delete those files again.
//! - **`edit`**: edit the relations file interactively (the default).
//! - **`init`**: write a sample relations file to start from.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use pedigree::config;
use pedigree::logging::{self, LogMode};
use pedigree::render::{self, SvgOutcome};
use pedigree::storage;
use pedigree::{EditSession, NameStyle};

/// Family trees in plain text
#[derive(Parser)]
#[command(name = "pedigree", version, about, long_about = None)]
struct Cli {
    /// Relations file (.toml, .yaml or .json)
    #[arg(short, long, global = true, env = config::ENV_INPUT, default_value = config::DEFAULT_INPUT)]
    input: PathBuf,

    /// Base path of generated charts
    #[arg(short, long, global = true, env = config::ENV_BASE, default_value = config::DEFAULT_BASE)]
    base: PathBuf,

    /// Name style on the floating chart: full name | last initial |
    /// last initial, no middle names | no middle names
    #[arg(short, long, global = true, env = config::ENV_STYLE, default_value = config::DEFAULT_STYLE)]
    style: NameStyle,

    /// Label the rigid chart with first names only
    #[arg(long, global = true)]
    first_names_only: bool,

    /// Append log output to this file
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Write the floating and rigid charts
    Generate,
    /// Delete the generated charts (missing files are ignored)
    Cleanup,
    /// Edit the relations file interactively
    Edit,
    /// Write the Flintstones sample to the relations file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Edit);
    let mode = if command == Command::Edit {
        LogMode::Interactive
    } else {
        LogMode::Batch
    };
    if let Err(e) = logging::init_logging(mode, cli.log.as_deref()) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, command: Command) -> Result<()> {
    match command {
        Command::Generate => {
            let family = storage::load_family(&cli.input)?;
            let (paths, svg) =
                render::write_charts(&family, &cli.base, cli.style, cli.first_names_only)?;
            println!("{}", paths.html.display());
            println!("{}", paths.dot.display());
            if svg == SvgOutcome::Written {
                println!("{}", paths.svg.display());
            } else {
                eprintln!("'dot' executable not available; install graphviz for the svg chart");
            }
        }
        Command::Cleanup => {
            for path in render::remove_charts(&cli.base)? {
                println!("removed {}", path.display());
            }
        }
        Command::Edit => {
            let mut session = EditSession::open(&cli.input)?.with_style(cli.style);
            session.run(io::stdin().lock(), io::stdout().lock())?;
        }
        Command::Init { force } => {
            if cli.input.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    cli.input.display()
                );
            }
            storage::write_example(&cli.input)?;
            println!("wrote {}", cli.input.display());
        }
    }
    Ok(())
}
