use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediamend")]
#[command(author, version, about = "Damaged video analysis and repair tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a file and report its damage assessment without repairing
    Analyze {
        /// File to analyze
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze and repair a single file
    Run {
        /// Damaged input file
        #[arg(required = true)]
        input: PathBuf,

        /// Destination for the repaired file
        #[arg(required = true)]
        output: PathBuf,
    },

    /// Repair an ordered list of files (one `input<TAB>output` per line)
    Batch {
        /// Path to the list file
        #[arg(required = true)]
        list: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
