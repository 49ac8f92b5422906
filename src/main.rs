mod agents;
mod broker;
mod checker;
mod cli;
mod context;
mod error;
mod executor;
mod manifest;
mod pipeline;
mod planner;
mod registry;
mod report;
mod state;
mod utils;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var("RIPPLE_VERBOSE", "1");
        }
    }

    let result = match cli.command {
        Commands::Plan {
            module,
            version,
            check,
        } => workflow::execute_plan(&cli.manifest, &module, &version, &check),
        Commands::Run {
            module,
            version,
            check,
            dry_run,
        } => workflow::execute_run(&cli.manifest, &module, &version, &check, dry_run),
        Commands::Resume {
            module,
            version,
            dry_run,
        } => workflow::execute_resume(&cli.manifest, &module, &version, dry_run),
        Commands::Status { module, version } => {
            workflow::execute_status(&cli.manifest, &module, &version)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
