mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::lifecycle::{ForecloseArgs, PartPaymentArgs, RefinanceArgs};
use commands::schedule::{EmiArgs, ScheduleArgs};

/// Loan amortisation and lifecycle calculations
#[derive(Parser)]
#[command(
    name = "amort",
    version,
    about = "EMI amortisation schedules and loan lifecycle simulations",
    long_about = "A CLI for EMI loan calculations with decimal precision. \
                  Generates reducing-balance amortisation schedules and simulates \
                  part-payments, foreclosure payoffs, and refinance comparisons \
                  against a paid-through position."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate the EMI for a set of loan terms
    Emi(EmiArgs),
    /// Generate the full amortisation schedule
    Schedule(ScheduleArgs),
    /// Simulate a lump-sum part-payment (tenure or installment reduction)
    PartPayment(PartPaymentArgs),
    /// Simulate a full foreclosure payoff
    Foreclose(ForecloseArgs),
    /// Compare current terms against a proposed refinance
    Refinance(RefinanceArgs),
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

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Emi(args) => commands::schedule::run_emi(args),
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::PartPayment(args) => commands::lifecycle::run_part_payment(args),
        Commands::Foreclose(args) => commands::lifecycle::run_foreclose(args),
        Commands::Refinance(args) => commands::lifecycle::run_refinance(args),
        Commands::Version => {
            println!("amort {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
