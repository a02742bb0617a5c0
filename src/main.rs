//! Jeeves: an automated report generator for Jenkins CI.
//!
//! Run it from cron. In `report` mode it groups the jobs matched by each
//! configured search field and mails a status report; in `remind` mode it
//! checks every tracked blocker and mails a reminder listing those that are
//! still open.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use jeeves::utils::{self, RunOptions};

#[derive(Parser)]
#[command(name = "jeeves")]
#[command(about = "An automated report generator for Jenkins CI")]
struct Cli {
    /// Configuration YAML file to use
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Blockers YAML file to use
    #[arg(long, default_value = "blockers.yaml")]
    blockers: PathBuf,

    /// Preamble HTML file to insert before the job sections
    #[arg(long)]
    preamble: Option<PathBuf>,

    /// Template HTML file to use (looked up in "templates" if not found)
    #[arg(long, default_value = "report_template.html")]
    template: String,

    /// Which mode to run Jeeves in: report or remind
    #[arg(long, default_value = "report")]
    mode: String,

    /// Print the result instead of sending an email
    #[arg(long)]
    no_email: bool,

    /// Send the email to the configured test address only
    #[arg(long)]
    test_email: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = utils::initialize_logging(cli.verbose, cli.quiet) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let options = RunOptions {
        config_path: cli.config,
        blockers_path: cli.blockers,
        preamble_path: cli.preamble,
        template: cli.template,
        mode: cli.mode,
        no_email: cli.no_email,
        test_email: cli.test_email,
    };

    match utils::run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
