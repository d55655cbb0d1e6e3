//! Reweave command-line tool
//!
//! Drives the property weaver over compiled module files (.rwm):
//! weaving, stack verification, and disassembly.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "reweave")]
#[command(about = "Build-time property weaver for compiled modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Color output: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weave marker-tagged property assignments in a module
    Weave {
        /// Input module file (.rwm)
        file: PathBuf,
        /// Configuration file (defaults to ./reweave.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output file (defaults to rewriting the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Verify stack balance of the woven module before writing
        #[arg(long)]
        verify: bool,
        /// Emit the weave report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Verify the stack discipline of a module
    Verify {
        /// Module file to verify (.rwm)
        file: PathBuf,
    },

    /// Disassemble a module to readable text
    Dump {
        /// Module file to disassemble (.rwm)
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let choice = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Weave {
            file,
            config,
            output,
            verify,
            json,
        } => commands::weave::execute(file, config, output, verify, json, choice),
        Commands::Verify { file } => commands::verify::execute(file, choice),
        Commands::Dump { file } => commands::dump::execute(file),
    }
}
