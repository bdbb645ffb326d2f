//! Foreclosure payoff computation.
//!
//! Payoff is the outstanding principal plus interest accrued since the last
//! settled installment, prorated by simple daily count over the current
//! period. Persistence (superseding rows, closing the loan, the event
//! record) is the engine's job; this module is pure.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LoanEngineError;
use crate::schedule::{last_paid_sequence, outstanding_principal, total_interest, unpaid_tail};
use crate::types::{round_money, EmiScheduleEntry, Loan, LoanStatus, Money};
use crate::LoanEngineResult;

/// Result of a foreclosure quote/application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeclosureOutput {
    pub loan_id: String,
    pub foreclosure_date: NaiveDate,
    pub outstanding_principal: Money,
    /// Simple-prorated interest since the last paid installment.
    pub accrued_interest: Money,
    pub payoff_amount: Money,
    /// Originally scheduled interest on the unpaid rows, less the accrued
    /// charge.
    pub interest_saved: Money,
    /// Pending rows that the payoff supersedes.
    pub superseded_rows: u32,
}

/// Compute the full payoff as of `date`. Fails `LoanNotActive` for loans
/// already foreclosed or completed.
pub fn compute_foreclosure(
    loan: &Loan,
    schedule: &[EmiScheduleEntry],
    date: NaiveDate,
) -> LoanEngineResult<ForeclosureOutput> {
    if loan.status != LoanStatus::Active {
        return Err(LoanEngineError::LoanNotActive {
            loan_id: loan.id.clone(),
            status: loan.status,
        });
    }

    let outstanding = outstanding_principal(loan, schedule);
    let tail = unpaid_tail(schedule);

    // Accrual anchors at the last settled installment's due date, or the
    // disbursement date when nothing has been paid.
    let anchor = last_paid_sequence(schedule)
        .and_then(|seq| schedule.iter().find(|e| e.sequence == seq))
        .map(|e| e.due_date)
        .unwrap_or(loan.start_date);
    let period_end = tail
        .first()
        .map(|e| e.due_date)
        .unwrap_or_else(|| anchor + Months::new(1));

    let accrued = round_money(outstanding * loan.monthly_rate() * period_fraction(anchor, period_end, date));
    let scheduled_interest = total_interest(tail.iter().copied());

    Ok(ForeclosureOutput {
        loan_id: loan.id.clone(),
        foreclosure_date: date,
        outstanding_principal: outstanding,
        accrued_interest: accrued,
        payoff_amount: outstanding + accrued,
        interest_saved: scheduled_interest - accrued,
        superseded_rows: tail.len() as u32,
    })
}

/// Elapsed fraction of the current period, clamped to [0, 1]: a payoff
/// before the period opens accrues nothing, and one past the next due date
/// owes at most the period's scheduled interest (the rows beyond it are
/// superseded, not accrued).
fn period_fraction(anchor: NaiveDate, period_end: NaiveDate, date: NaiveDate) -> Decimal {
    let period_days = (period_end - anchor).num_days();
    if period_days <= 0 {
        return Decimal::ONE;
    }
    let elapsed = (date - anchor).num_days().clamp(0, period_days);
    Decimal::from(elapsed) / Decimal::from(period_days)
}
