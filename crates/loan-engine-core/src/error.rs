use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{LoanStatus, PaymentStatus};

#[derive(Debug, Error)]
pub enum LoanEngineError {
    #[error("Invalid loan terms: {field}: {reason}")]
    InvalidLoanTerms { field: String, reason: String },

    #[error(
        "Non-amortizing schedule: installment {installment} does not cover \
         interest {interest_due} falling due in month {month}"
    )]
    NonAmortizingSchedule {
        installment: Decimal,
        interest_due: Decimal,
        month: u32,
    },

    #[error("Part-payment of {amount} exceeds outstanding principal {outstanding}")]
    ExcessivePayment {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("Installment {sequence} is no longer pending (status: {status}, paid: {paid_date:?})")]
    AlreadyPaid {
        sequence: u32,
        status: PaymentStatus,
        paid_date: Option<NaiveDate>,
    },

    #[error("Loan {loan_id} is not active (status: {status})")]
    LoanNotActive { loan_id: String, status: LoanStatus },

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    #[error("Schedule entry not found: loan {loan_id}, sequence {sequence}")]
    EntryNotFound { loan_id: String, sequence: u32 },

    #[error("Storage error: {0}")]
    Storage(String),
}
