mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use env_logger::Env;
use std::process;

use commands::analysis::{ScenariosArgs, SensitivityArgs};
use commands::archetypes::DescribeArgs;
use commands::metrics::{AmortizeArgs, IrrArgs, NpvArgs};
use commands::project::ProjectArgs;

/// Multi-year pro forma projections for investment archetypes
#[derive(Parser)]
#[command(
    name = "proforma",
    version,
    about = "Multi-year pro forma projections for investment archetypes",
    long_about = "A CLI for building decimal-precision pro forma projections from \
                  archetype assumptions (SaaS, solar, consulting), with IRR/NPV \
                  metrics, loan amortization, sensitivity grids and scenario weighting."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered archetypes and their assumption schemas
    Archetypes,
    /// Describe one archetype's schema
    Describe(DescribeArgs),
    /// Validate assumptions and run a projection
    Project(ProjectArgs),
    /// Internal rate of return for a cash flow series
    Irr(IrrArgs),
    /// Net present value for a cash flow series
    Npv(NpvArgs),
    /// Level-payment amortization schedule
    Amortize(AmortizeArgs),
    /// Two-way sensitivity grid over archetype assumptions
    Sensitivity(SensitivityArgs),
    /// Probability-weighted scenario analysis
    Scenarios(ScenariosArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Archetypes => commands::archetypes::run_archetypes(),
        Commands::Describe(args) => commands::archetypes::run_describe(args),
        Commands::Project(args) => commands::project::run_project(args),
        Commands::Irr(args) => commands::metrics::run_irr(args),
        Commands::Npv(args) => commands::metrics::run_npv(args),
        Commands::Amortize(args) => commands::metrics::run_amortize(args),
        Commands::Sensitivity(args) => commands::analysis::run_sensitivity_cmd(args),
        Commands::Scenarios(args) => commands::analysis::run_scenarios_cmd(args),
        Commands::Version => {
            println!("proforma {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            log::debug!("command completed");
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
