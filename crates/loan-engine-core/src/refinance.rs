//! Refinance comparison.
//!
//! A stateless projection of the current outstanding balance under proposed
//! terms, side by side with continuing the existing loan unchanged. Reuses
//! the EMI calculator and the schedule builder against in-memory rows;
//! nothing persisted is read through a lock or written at all.

use serde::{Deserialize, Serialize};

use crate::emi::{calculate_emi, monthly_rate};
use crate::error::LoanEngineError;
use crate::schedule::{build_tail, outstanding_principal, total_interest, unpaid_tail, TailSpec};
use crate::types::{EmiScheduleEntry, Loan, Money, Rate};
use crate::LoanEngineResult;

/// Proposed alternate terms; omitted fields default to the loan's current
/// rate and current remaining row count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinanceInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_annual_rate_pct: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_tenure_months: Option<u32>,
}

/// Side-by-side summary plus the full hypothetical schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinanceOutput {
    pub loan_id: String,
    pub outstanding_principal: Money,
    pub current_installment: Money,
    pub current_remaining_months: u32,
    pub current_remaining_interest: Money,
    pub proposed_annual_rate_pct: Rate,
    pub proposed_tenure_months: u32,
    pub proposed_installment: Money,
    pub proposed_total_interest: Money,
    /// Remaining interest on the current path minus the proposed path;
    /// positive when refinancing costs less.
    pub interest_savings: Money,
    pub projected_schedule: Vec<EmiScheduleEntry>,
}

/// Project the proposed terms against the current unpaid tail.
pub fn compare_refinance(
    loan: &Loan,
    schedule: &[EmiScheduleEntry],
    input: &RefinanceInput,
) -> LoanEngineResult<RefinanceOutput> {
    let outstanding = outstanding_principal(loan, schedule);
    let tail = unpaid_tail(schedule);
    if tail.is_empty() {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "schedule".into(),
            reason: "No unpaid installments remain; nothing to refinance".into(),
        });
    }

    let proposed_rate = input
        .proposed_annual_rate_pct
        .unwrap_or(loan.annual_rate_pct);
    let proposed_tenure = input.proposed_tenure_months.unwrap_or(tail.len() as u32);

    let proposed_installment = calculate_emi(outstanding, proposed_rate, proposed_tenure)?;

    // Hypothetical schedule: row 1 falls due on the first currently-unpaid
    // due date, then monthly.
    let projected = build_tail(
        &loan.id,
        &TailSpec {
            opening_principal: outstanding,
            monthly_rate: monthly_rate(proposed_rate),
            installment: proposed_installment,
            first_sequence: 1,
            anchor_date: tail[0].due_date,
            first_due_offset_months: 0,
            max_rows: proposed_tenure,
        },
    )?;

    let current_remaining_interest = total_interest(tail.iter().copied());
    let proposed_total_interest = total_interest(projected.iter());

    Ok(RefinanceOutput {
        loan_id: loan.id.clone(),
        outstanding_principal: outstanding,
        current_installment: loan.emi,
        current_remaining_months: tail.len() as u32,
        current_remaining_interest,
        proposed_annual_rate_pct: proposed_rate,
        proposed_tenure_months: proposed_tenure,
        proposed_installment,
        proposed_total_interest,
        interest_savings: current_remaining_interest - proposed_total_interest,
        projected_schedule: projected,
    })
}
