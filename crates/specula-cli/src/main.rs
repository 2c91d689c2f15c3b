//! Specula object browser
//!
//! Loads a runtime image and prints what the mirrors see: hierarchy,
//! fields, methods and best-effort provenance.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "specula")]
#[command(about = "Browse classes and modules of a Specula runtime image", long_about = None)]
#[command(version)]
struct Cli {
    /// Colour output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    /// Configuration file (defaults to $SPECULA_CONFIG, then ./specula.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show everything known about one class or module
    Browse {
        /// Image file (TOML)
        image: PathBuf,
        /// Qualified class or module name (e.g. Outer::Inner)
        class: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List every named class and module in an image
    Tree {
        /// Image file (TOML)
        image: PathBuf,
    },

    /// Show version and environment
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = commands::GlobalOptions {
        color: cli.color,
        config: cli.config,
    };

    match cli.command {
        Commands::Browse { image, class, json } => {
            commands::browse::execute(&options, &image, &class, json)?;
        }

        Commands::Tree { image } => {
            commands::tree::execute(&options, &image)?;
        }

        Commands::Info => {
            commands::info::execute(&options)?;
        }
    }

    Ok(())
}
