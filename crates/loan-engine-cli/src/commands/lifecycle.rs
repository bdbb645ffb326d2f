use clap::{Args, ValueEnum};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_engine_core::refinance::RefinanceInput;
use loan_engine_core::ReductionPolicy;

use crate::commands::{resolve_scenario, simulate, SIM_LOAN_ID};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Keep the installment, finish earlier
    TenureReduction,
    /// Keep the end date, lower the installment
    InstallmentReduction,
}

impl From<PolicyArg> for ReductionPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::TenureReduction => ReductionPolicy::TenureReduction,
            PolicyArg::InstallmentReduction => ReductionPolicy::InstallmentReduction,
        }
    }
}

/// Arguments for a part-payment simulation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PartPaymentArgs {
    /// Path to JSON or YAML input file with the loan position
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

    /// Mark installments 1..=N as paid before the event
    #[arg(long, default_value_t = 0)]
    pub paid_through: u32,

    /// Lump-sum amount
    #[arg(long)]
    pub amount: Decimal,

    /// Value date of the part-payment (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// How the freed-up principal is applied
    #[arg(long, value_enum, default_value_t = PolicyArg::TenureReduction)]
    pub policy: PolicyArg,
}

/// Arguments for a foreclosure payoff simulation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ForecloseArgs {
    /// Path to JSON or YAML input file with the loan position
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

    /// Mark installments 1..=N as paid before the payoff
    #[arg(long, default_value_t = 0)]
    pub paid_through: u32,

    /// Payoff date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,
}

/// Arguments for a refinance comparison
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct RefinanceArgs {
    /// Path to JSON or YAML input file with the loan position
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

    /// Mark installments 1..=N as paid before comparing
    #[arg(long, default_value_t = 0)]
    pub paid_through: u32,

    /// Proposed annual rate in percent (defaults to the current rate)
    #[arg(long)]
    pub new_rate: Option<Decimal>,

    /// Proposed tenure in months (defaults to the remaining tenure)
    #[arg(long)]
    pub new_tenure: Option<u32>,
}

pub fn run_part_payment(args: PartPaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = resolve_scenario(
        &args.input,
        args.principal,
        args.rate,
        args.tenure,
        args.start_date,
        None,
        args.paid_through,
    )?;
    let engine = simulate(&scenario)?;
    let out = engine.apply_part_payment(SIM_LOAN_ID, args.amount, args.date, args.policy.into())?;
    Ok(serde_json::to_value(out)?)
}

pub fn run_foreclose(args: ForecloseArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = resolve_scenario(
        &args.input,
        args.principal,
        args.rate,
        args.tenure,
        args.start_date,
        None,
        args.paid_through,
    )?;
    let engine = simulate(&scenario)?;
    let out = engine.apply_foreclosure(SIM_LOAN_ID, args.date)?;
    Ok(serde_json::to_value(out)?)
}

pub fn run_refinance(args: RefinanceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = resolve_scenario(
        &args.input,
        args.principal,
        args.rate,
        args.tenure,
        args.start_date,
        None,
        args.paid_through,
    )?;
    let engine = simulate(&scenario)?;
    let input = RefinanceInput {
        proposed_annual_rate_pct: args.new_rate,
        proposed_tenure_months: args.new_tenure,
    };
    let out = engine.compare_refinance(SIM_LOAN_ID, &input)?;
    Ok(serde_json::to_value(out)?)
}
