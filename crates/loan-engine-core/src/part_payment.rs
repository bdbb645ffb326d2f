//! Part-payment (lump-sum prepayment) engine.
//!
//! A lump sum reduces the outstanding principal, then the unpaid tail of
//! the schedule is regenerated under the chosen reduction policy. The
//! policy is a closed variant, never a boolean threaded through call
//! sites. A part-payment equal to the full outstanding balance delegates to
//! the foreclosure engine; the tagged outcome makes that impossible to miss.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::emi::calculate_emi;
use crate::error::LoanEngineError;
use crate::foreclosure::{compute_foreclosure, ForeclosureOutput};
use crate::schedule::{build_tail, outstanding_principal, total_interest, unpaid_tail, TailSpec};
use crate::types::{EmiScheduleEntry, Loan, LoanStatus, Money, ReductionPolicy};
use crate::LoanEngineResult;

/// Result of an applied part-payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartPaymentOutput {
    pub loan_id: String,
    pub amount: Money,
    pub event_date: NaiveDate,
    pub policy: ReductionPolicy,
    pub outstanding_before: Money,
    pub outstanding_after: Money,
    /// Installment going forward; unchanged under tenure reduction.
    pub new_installment: Money,
    pub previous_remaining_rows: u32,
    pub new_remaining_rows: u32,
    /// Scheduled interest on the old tail minus scheduled interest on the
    /// regenerated tail.
    pub interest_saved: Money,
    pub updated_tail: Vec<EmiScheduleEntry>,
}

/// Either the part-payment applied, or it equalled the outstanding balance
/// and the loan was foreclosed instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartPaymentOutcome {
    Applied(PartPaymentOutput),
    ForeclosedInFull(ForeclosureOutput),
}

/// Compute the effect of a part-payment without touching persisted state.
/// The engine applies the returned tail/foreclosure under the loan's lock.
pub fn compute_part_payment(
    loan: &Loan,
    schedule: &[EmiScheduleEntry],
    amount: Money,
    date: NaiveDate,
    policy: ReductionPolicy,
) -> LoanEngineResult<PartPaymentOutcome> {
    if loan.status != LoanStatus::Active {
        return Err(LoanEngineError::LoanNotActive {
            loan_id: loan.id.clone(),
            status: loan.status,
        });
    }
    if amount <= Decimal::ZERO {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "amount".into(),
            reason: format!("Part-payment must be positive, got {amount}"),
        });
    }

    let outstanding = outstanding_principal(loan, schedule);
    if amount > outstanding {
        return Err(LoanEngineError::ExcessivePayment {
            amount,
            outstanding,
        });
    }
    if amount == outstanding {
        return Ok(PartPaymentOutcome::ForeclosedInFull(compute_foreclosure(
            loan, schedule, date,
        )?));
    }

    let old_tail = unpaid_tail(schedule);
    let remaining_rows = old_tail.len() as u32;
    let new_outstanding = outstanding - amount;

    let installment = match policy {
        ReductionPolicy::TenureReduction => loan.emi,
        ReductionPolicy::InstallmentReduction => {
            calculate_emi(new_outstanding, loan.annual_rate_pct, remaining_rows)?
        }
    };

    // Regenerated rows continue the sequence after the last paid row and
    // keep the original monthly cadence from the start date.
    let first_sequence = old_tail
        .first()
        .map(|e| e.sequence)
        .unwrap_or(loan.tenure_months + 1);
    let new_tail = build_tail(
        &loan.id,
        &TailSpec {
            opening_principal: new_outstanding,
            monthly_rate: loan.monthly_rate(),
            installment,
            first_sequence,
            anchor_date: loan.start_date,
            first_due_offset_months: first_sequence,
            max_rows: remaining_rows,
        },
    )?;

    let interest_saved =
        total_interest(old_tail.iter().copied()) - total_interest(new_tail.iter());

    Ok(PartPaymentOutcome::Applied(PartPaymentOutput {
        loan_id: loan.id.clone(),
        amount,
        event_date: date,
        policy,
        outstanding_before: outstanding,
        outstanding_after: new_outstanding,
        new_installment: installment,
        previous_remaining_rows: remaining_rows,
        new_remaining_rows: new_tail.len() as u32,
        interest_saved,
        updated_tail: new_tail,
    }))
}
