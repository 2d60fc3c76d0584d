//! slackrun CLI
//!
//! Entry point for the `slackrun` command-line tool. The run driver lives
//! here: it resolves the configured compile-order files and hands each one
//! to the sequencer, in list order, for the selected action. The first
//! package failure is fatal for the whole run; later compile orders are
//! never processed.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use slackrun::pipeline::{Action, RunEnvironment};
use slackrun::{run_order, RunSummary, Settings};

#[derive(Parser)]
#[command(name = "slackrun")]
#[command(about = "Compile-order build/install runner", version)]
struct Cli {
    /// Path to config file (default: ~/.config/slackrun/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and verify sources for every package in order
    Download,

    /// Download, build, and install every package in order
    Build,

    /// Re-install already-built artifacts in order
    Install,
}

fn main() {
    let cli = Cli::parse();

    let action = match cli.command {
        Commands::Download => Action::Download,
        Commands::Build => Action::Build,
        Commands::Install => Action::Install,
    };

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    if settings.compile_orders.is_empty() {
        eprintln!("Error: no compile orders configured");
        process::exit(1);
    }

    let env = RunEnvironment::new(settings);
    let exit_code = run(&env, action, cli.json);
    process::exit(exit_code);
}

/// Drive the sequencer over every configured compile order.
fn run(env: &RunEnvironment, action: Action, json: bool) -> i32 {
    let mut summary = RunSummary::start(action);

    for order_path in env.settings.compile_order_paths() {
        match run_order(env, &order_path, action) {
            Ok(outcome) => summary.record_order(outcome.completed, outcome.skipped),
            Err(e) => {
                // First failure ends the run; remaining orders are skipped
                summary.finish_failed(&e);
                eprintln!("Fatal: {e}");
                report(&summary, json);
                return summary.exit_code;
            }
        }
    }

    summary.finish_ok();
    report(&summary, json);
    summary.exit_code
}

fn report(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error serializing summary: {e}"),
        }
    } else {
        println!("{}", summary.render_human());
    }
}
