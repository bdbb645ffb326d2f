//! Installment payment processing.
//!
//! Marking a row paid is a pure settlement mutation: status, paid date and
//! method. The interest/principal split of every row is fixed at generation
//! time and is never recomputed on payment; payment timing does not
//! retroactively change other installments.

use chrono::NaiveDate;

use crate::error::LoanEngineError;
use crate::types::{EmiScheduleEntry, Loan, PaymentStatus};
use crate::LoanEngineResult;

/// Mark one pending installment as paid. Returns the warnings raised (a
/// backdated paid date is flagged, not rejected: statement dates can
/// legitimately precede entry).
pub fn mark_entry_paid(
    entry: &mut EmiScheduleEntry,
    loan: &Loan,
    paid_date: NaiveDate,
    payment_method: &str,
) -> LoanEngineResult<Vec<String>> {
    if !entry.is_pending() {
        return Err(LoanEngineError::AlreadyPaid {
            sequence: entry.sequence,
            status: entry.status,
            paid_date: entry.paid_date,
        });
    }

    let mut warnings = Vec::new();
    if paid_date < loan.start_date {
        warnings.push(format!(
            "Paid date {} precedes loan start date {}; recorded as given",
            paid_date, loan.start_date
        ));
    }

    entry.status = PaymentStatus::Paid;
    entry.paid_date = Some(paid_date);
    entry.payment_method = Some(payment_method.to_string());
    Ok(warnings)
}
