use clap::Args;
use chrono::NaiveDate;
use loan_engine_core::store::LoanStore;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::commands::{resolve_scenario, simulate, SIM_LOAN_ID};

/// Arguments for EMI calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct EmiArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (e.g. 9.5)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Tenure in months
    #[arg(long)]
    pub tenure: Option<u32>,

    /// Disbursal date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Fixed installment overriding the calculated EMI
    #[arg(long)]
    pub emi_override: Option<Decimal>,
}

/// Arguments for schedule generation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScheduleArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Tenure in months
    #[arg(long)]
    pub tenure: Option<u32>,

    /// Disbursal date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Fixed installment overriding the calculated EMI
    #[arg(long)]
    pub emi_override: Option<Decimal>,

    /// Mark installments 1..=N as paid on their due dates
    #[arg(long, default_value_t = 0)]
    pub paid_through: u32,
}

pub fn run_emi(args: EmiArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = resolve_scenario(
        &args.input,
        args.principal,
        args.rate,
        args.tenure,
        args.start_date,
        args.emi_override,
        0,
    )?;

    let engine = simulate(&scenario)?;
    let loan = engine
        .store()
        .load_loan(SIM_LOAN_ID)?
        .ok_or("simulation lost its loan")?;
    let schedule = engine.store().load_schedule(SIM_LOAN_ID)?;

    let total_interest: Decimal = schedule.iter().map(|e| e.interest_component).sum();
    let total_payment: Decimal = schedule.iter().map(|e| e.installment).sum();

    let mut value = json!({
        "result": {
            "emi": loan.emi,
            "tenure_months": schedule.len(),
            "total_interest": total_interest,
            "total_payment": total_payment,
        },
        "methodology": "EMI (reducing balance, monthly rests)",
    });
    value["assumptions"] = serde_json::to_value(scenario.terms())?;
    Ok(value)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = resolve_scenario(
        &args.input,
        args.principal,
        args.rate,
        args.tenure,
        args.start_date,
        args.emi_override,
        args.paid_through,
    )?;

    let engine = simulate(&scenario)?;
    let loan = engine
        .store()
        .load_loan(SIM_LOAN_ID)?
        .ok_or("simulation lost its loan")?;
    let schedule = engine.store().load_schedule(SIM_LOAN_ID)?;

    Ok(json!({
        "result": {
            "loan": loan,
            "schedule": schedule,
        },
        "methodology": "EMI Schedule Generation (reducing balance)",
    }))
}
