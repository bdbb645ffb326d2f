use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Annual rates quoted as percentages (9.5 = 9.5%), the way lenders quote
/// EMI products. Monthly rates derived from these are plain decimals.
pub type Rate = Decimal;

/// Decimal places of the currency minor unit.
pub const MINOR_UNIT_DP: u32 = 2;

/// One minor unit; the tolerance the schedule invariants are checked against.
pub const MONEY_EPSILON: Decimal = dec!(0.01);

/// Round to the currency minor unit, half-up.
pub fn round_money(amount: Decimal) -> Money {
    amount.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Foreclosed,
    Completed,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "active"),
            LoanStatus::Foreclosed => write!(f, "foreclosed"),
            LoanStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Settlement state of a single installment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Replaced by a foreclosure; kept for audit, excluded from every
    /// outstanding-balance query.
    Superseded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Superseded => write!(f, "superseded"),
        }
    }
}

/// How a part-payment reshapes the remaining schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionPolicy {
    /// Keep the installment fixed; the remaining tenure shortens.
    TenureReduction,
    /// Keep the remaining tenure fixed; the installment shrinks.
    InstallmentReduction,
}

/// Kind of lifecycle event recorded in the append-only ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmiEventType {
    PartPayment,
    Foreclosure,
}

/// The terms a loan is created (or re-created) from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual nominal rate as a percentage (9.5 = 9.5%).
    pub annual_rate_pct: Rate,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
    /// Bank-quoted installment, when it should override the calculated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi_override: Option<Money>,
}

/// A borrowing contract and its effective terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub principal: Money,
    pub annual_rate_pct: Rate,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
    /// Effective installment: calculated, overridden, or reset by an
    /// installment-reduction part-payment.
    pub emi: Money,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<NaiveDate>,
}

impl Loan {
    /// Monthly rate as a plain decimal (annual percent / 12 / 100).
    pub fn monthly_rate(&self) -> Rate {
        self.annual_rate_pct / dec!(12) / dec!(100)
    }

    /// Due date of installment `sequence` (1-based). Always computed from
    /// the start date so month-end clamping never compounds.
    pub fn due_date_for(&self, sequence: u32) -> NaiveDate {
        self.start_date + Months::new(sequence)
    }
}

/// One installment row, owned exclusively by its loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiScheduleEntry {
    pub loan_id: String,
    /// 1-based position in the schedule.
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub installment: Money,
    pub interest_component: Money,
    pub principal_component: Money,
    /// Balance after this installment is applied.
    pub remaining_principal: Money,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl EmiScheduleEntry {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// Immutable audit record of a part-payment or foreclosure. Appended by the
/// engine, never updated, deleted only by the loan-deletion cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmiEvent {
    pub loan_id: String,
    pub event_type: EmiEventType,
    pub amount: Money,
    pub event_date: NaiveDate,
    pub interest_saved: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<ReductionPolicy>,
    pub created_at: DateTime<Utc>,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
