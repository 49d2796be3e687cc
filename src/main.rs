use anyhow::Result;
use clap::Parser;
use procmap::cli::{Cli, Commands};
use procmap::commands::analyze::{run, AnalyzeOptions};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            output,
            pretty,
            basic,
            verbose,
            jobs,
            no_parallel,
            ignore,
        } => {
            init_logging(verbose);
            run(AnalyzeOptions {
                path,
                output,
                pretty,
                basic,
                jobs,
                no_parallel,
                ignore,
            })
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
