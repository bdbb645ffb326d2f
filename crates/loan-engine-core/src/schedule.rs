//! Amortisation schedule generation.
//!
//! One month-by-month tail builder serves every caller: full generation at
//! loan creation, tenure-reduction regeneration after a part-payment (same
//! installment, fewer rows), and installment-reduction regeneration (same
//! row count, smaller installment). The final row always absorbs rounding
//! drift so the closing balance is exactly zero.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use crate::error::LoanEngineError;
use crate::types::{
    round_money, EmiScheduleEntry, Loan, Money, PaymentStatus, Rate, MONEY_EPSILON,
};
use crate::LoanEngineResult;

/// Parameters for one regenerated run of installment rows.
pub(crate) struct TailSpec {
    pub opening_principal: Money,
    pub monthly_rate: Rate,
    pub installment: Money,
    /// Sequence index of the first generated row (1-based).
    pub first_sequence: u32,
    /// Date the due-date cadence is anchored to.
    pub anchor_date: NaiveDate,
    /// Whole months between the anchor and the first generated row's due date.
    pub first_due_offset_months: u32,
    /// Hard cap on generated rows; generation stops early once the balance
    /// reaches zero.
    pub max_rows: u32,
}

/// Build installment rows until the balance amortises to zero or `max_rows`
/// is reached, whichever comes first. The last emitted row clamps its
/// principal component to the remaining balance, so the run always closes
/// at exactly zero.
pub(crate) fn build_tail(
    loan_id: &str,
    spec: &TailSpec,
) -> LoanEngineResult<Vec<EmiScheduleEntry>> {
    let mut rows = Vec::with_capacity(spec.max_rows as usize);
    let mut balance = spec.opening_principal;

    for i in 0..spec.max_rows {
        let sequence = spec.first_sequence + i;
        let due_date = spec.anchor_date + Months::new(spec.first_due_offset_months + i);
        let is_final = i == spec.max_rows - 1;

        let interest = round_money(balance * spec.monthly_rate);
        let mut principal = spec.installment - interest;
        let mut installment = spec.installment;

        if is_final || principal >= balance {
            // Absorb all remaining drift here; this is the only row whose
            // installment may differ from the nominal EMI.
            principal = balance;
            installment = round_money(interest + principal);
        } else if principal <= Decimal::ZERO {
            return Err(LoanEngineError::NonAmortizingSchedule {
                installment: spec.installment,
                interest_due: interest,
                month: sequence,
            });
        }

        balance -= principal;

        rows.push(EmiScheduleEntry {
            loan_id: loan_id.to_string(),
            sequence,
            due_date,
            installment,
            interest_component: interest,
            principal_component: principal,
            remaining_principal: balance,
            status: PaymentStatus::Pending,
            paid_date: None,
            payment_method: None,
        });

        if balance.is_zero() {
            break;
        }
    }

    assert_tail_invariants(spec.opening_principal, &rows);
    Ok(rows)
}

/// Produce the full schedule for a loan from its effective terms. Replaces
/// any prior schedule in full; only called at creation or after a term edit.
pub fn generate_schedule(loan: &Loan) -> LoanEngineResult<Vec<EmiScheduleEntry>> {
    crate::emi::validate_terms(loan.principal, loan.annual_rate_pct, loan.tenure_months)?;
    if loan.emi <= Decimal::ZERO {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "emi".into(),
            reason: format!("Installment must be positive, got {}", loan.emi),
        });
    }

    build_tail(
        &loan.id,
        &TailSpec {
            opening_principal: loan.principal,
            monthly_rate: loan.monthly_rate(),
            installment: loan.emi,
            first_sequence: 1,
            anchor_date: loan.start_date,
            first_due_offset_months: 1,
            max_rows: loan.tenure_months,
        },
    )
}

/// Outstanding principal as implied by payment state: the closing balance of
/// the highest-sequence paid row, or the original principal when nothing has
/// been paid yet.
pub fn outstanding_principal(loan: &Loan, schedule: &[EmiScheduleEntry]) -> Money {
    schedule
        .iter()
        .filter(|e| e.is_paid())
        .max_by_key(|e| e.sequence)
        .map(|e| e.remaining_principal)
        .unwrap_or(loan.principal)
}

/// Sequence of the most recent paid row, if any.
pub fn last_paid_sequence(schedule: &[EmiScheduleEntry]) -> Option<u32> {
    schedule
        .iter()
        .filter(|e| e.is_paid())
        .map(|e| e.sequence)
        .max()
}

/// The pending rows after the last paid row: the part of the schedule that
/// part-payment and foreclosure replace.
pub fn unpaid_tail<'a>(schedule: &'a [EmiScheduleEntry]) -> Vec<&'a EmiScheduleEntry> {
    let cutoff = last_paid_sequence(schedule).unwrap_or(0);
    let mut tail: Vec<&EmiScheduleEntry> = schedule
        .iter()
        .filter(|e| e.is_pending() && e.sequence > cutoff)
        .collect();
    tail.sort_by_key(|e| e.sequence);
    tail
}

/// Total scheduled interest across a set of rows.
pub fn total_interest<'a, I>(rows: I) -> Money
where
    I: IntoIterator<Item = &'a EmiScheduleEntry>,
{
    rows.into_iter()
        .fold(Decimal::ZERO, |acc, e| acc + e.interest_component)
}

/// Schedule invariants are structural guarantees of the generator; a
/// violation is a programming defect, not a recoverable condition.
fn assert_tail_invariants(opening: Money, rows: &[EmiScheduleEntry]) {
    let mut balance = opening;
    for row in rows {
        debug_assert!(
            (row.interest_component + row.principal_component - row.installment).abs()
                <= MONEY_EPSILON,
            "row {}: components {} + {} do not reconstruct installment {}",
            row.sequence,
            row.interest_component,
            row.principal_component,
            row.installment
        );
        debug_assert!(
            row.remaining_principal <= balance,
            "row {}: balance increased from {} to {}",
            row.sequence,
            balance,
            row.remaining_principal
        );
        balance = row.remaining_principal;
    }
    if let Some(last) = rows.last() {
        debug_assert!(
            last.remaining_principal.is_zero(),
            "final row {} closed at {}, not zero",
            last.sequence,
            last.remaining_principal
        );
    }
}
