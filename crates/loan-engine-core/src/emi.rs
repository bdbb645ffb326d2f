//! Equated-installment calculator.
//!
//! Computes the level monthly payment that amortises a principal over a
//! fixed tenure. All math in `rust_decimal::Decimal`; integer powers by
//! iterative multiplication rather than `powd`, so there is no drift to
//! round away later.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::LoanEngineError;
use crate::types::{round_money, Money, Rate};
use crate::LoanEngineResult;

/// Convert an annual percentage rate (9.5 = 9.5%) to a monthly decimal rate.
pub fn monthly_rate(annual_rate_pct: Rate) -> Rate {
    annual_rate_pct / dec!(12) / dec!(100)
}

/// Compute base^n for a positive integer exponent via iterative multiplication.
pub(crate) fn iterative_pow(base: Decimal, n: u32) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..n {
        result *= base;
    }
    result
}

/// EMI for `principal` at `annual_rate_pct` over `tenure_months`:
/// P·r·(1+r)^N / ((1+r)^N − 1), rounded half-up to the minor unit.
///
/// At a zero rate the installment is P/N; any division remainder is left
/// for the schedule generator to absorb on the final row, never folded
/// into the EMI itself.
pub fn calculate_emi(
    principal: Money,
    annual_rate_pct: Rate,
    tenure_months: u32,
) -> LoanEngineResult<Money> {
    validate_terms(principal, annual_rate_pct, tenure_months)?;

    let r = monthly_rate(annual_rate_pct);
    if r.is_zero() {
        return Ok(round_money(principal / Decimal::from(tenure_months)));
    }

    let factor = iterative_pow(Decimal::ONE + r, tenure_months);
    let emi = principal * r * factor / (factor - Decimal::ONE);
    Ok(round_money(emi))
}

pub(crate) fn validate_terms(
    principal: Money,
    annual_rate_pct: Rate,
    tenure_months: u32,
) -> LoanEngineResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "principal".into(),
            reason: format!("Principal must be positive, got {principal}"),
        });
    }
    if annual_rate_pct < Decimal::ZERO {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "annual_rate_pct".into(),
            reason: format!("Annual rate cannot be negative, got {annual_rate_pct}"),
        });
    }
    if tenure_months == 0 {
        return Err(LoanEngineError::InvalidLoanTerms {
            field: "tenure_months".into(),
            reason: "Tenure must be at least one month".into(),
        });
    }
    Ok(())
}
