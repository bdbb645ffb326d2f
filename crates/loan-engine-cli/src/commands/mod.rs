pub mod lifecycle;
pub mod schedule;

use chrono::NaiveDate;
use loan_engine_core::engine::LoanEngine;
use loan_engine_core::store::MemoryStore;
use loan_engine_core::LoanTerms;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::input;

/// Loan id used for every in-process simulation.
pub const SIM_LOAN_ID: &str = "cli";

/// A loan position: its terms plus how many installments have already been
/// settled. This is the file/stdin input shape shared by every subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanScenario {
    pub principal: Decimal,
    pub annual_rate_pct: Decimal,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub emi_override: Option<Decimal>,
    /// Installments 1..=paid_through are marked paid on their due dates.
    #[serde(default)]
    pub paid_through: u32,
}

impl LoanScenario {
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal: self.principal,
            annual_rate_pct: self.annual_rate_pct,
            tenure_months: self.tenure_months,
            start_date: self.start_date,
            emi_override: self.emi_override,
        }
    }
}

/// Resolve the scenario from --input, piped stdin, or individual flags.
pub fn resolve_scenario(
    input_path: &Option<String>,
    principal: Option<Decimal>,
    rate: Option<Decimal>,
    tenure: Option<u32>,
    start_date: Option<NaiveDate>,
    emi_override: Option<Decimal>,
    paid_through: u32,
) -> Result<LoanScenario, Box<dyn std::error::Error>> {
    if let Some(path) = input_path {
        return input::file::read_input(path);
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }
    Ok(LoanScenario {
        principal: principal.ok_or("--principal is required (or provide --input)")?,
        annual_rate_pct: rate.ok_or("--rate is required (or provide --input)")?,
        tenure_months: tenure.ok_or("--tenure is required (or provide --input)")?,
        start_date: start_date.ok_or("--start-date is required (or provide --input)")?,
        emi_override,
        paid_through,
    })
}

/// Stand up an in-memory engine holding the scenario's loan, with the
/// paid-through prefix settled on its due dates.
pub fn simulate(
    scenario: &LoanScenario,
) -> Result<LoanEngine<MemoryStore>, Box<dyn std::error::Error>> {
    let engine = LoanEngine::new(MemoryStore::new());
    let created = engine.create_loan(SIM_LOAN_ID, &scenario.terms())?;

    if scenario.paid_through as usize > created.result.schedule.len() {
        return Err(format!(
            "--paid-through {} exceeds the {}-row schedule",
            scenario.paid_through,
            created.result.schedule.len()
        )
        .into());
    }
    for entry in created
        .result
        .schedule
        .iter()
        .take(scenario.paid_through as usize)
    {
        engine.mark_paid(SIM_LOAN_ID, entry.sequence, entry.due_date, "simulated")?;
    }
    Ok(engine)
}
