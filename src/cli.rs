use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "procmap")]
#[command(about = "Stored-procedure migration analyzer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a .sql file or a directory of .sql files
    Analyze {
        /// Input file or directory
        path: PathBuf,

        /// Output file (single input) or directory (directory input);
        /// defaults to stdout for a single input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,

        /// Structural passes only; advisory sections stay empty
        #[arg(long)]
        basic: bool,

        /// Raise log verbosity to debug
        #[arg(short, long)]
        verbose: bool,

        /// Worker threads for directory input (0 = all cores)
        #[arg(long, default_value_t = 0)]
        jobs: usize,

        /// Process directory input sequentially
        #[arg(long)]
        no_parallel: bool,

        /// Skip paths containing any of these substrings
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
    },
}
