//! Loan lifecycle engine.
//!
//! Every read-modify-write sequence for a loan lives here, behind a
//! per-loan mutex: part-payment and foreclosure both read-then-replace the
//! unpaid tail, and a payment marked against a stale tail would corrupt the
//! remaining-principal chain. Mutating operations hold the loan's lock for
//! one recomputation pass (bounded by tenure length); display reads such as
//! the refinance comparison take no lock.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::emi::calculate_emi;
use crate::error::LoanEngineError;
use crate::foreclosure::{compute_foreclosure, ForeclosureOutput};
use crate::part_payment::{compute_part_payment, PartPaymentOutcome};
use crate::payment::mark_entry_paid;
use crate::refinance::{compare_refinance, RefinanceInput, RefinanceOutput};
use crate::schedule::generate_schedule;
use crate::types::{
    round_money, with_metadata, ComputationOutput, EmiEvent, EmiEventType, EmiScheduleEntry, Loan,
    LoanStatus, LoanTerms, Money, ReductionPolicy,
};
use crate::store::LoanStore;
use crate::LoanEngineResult;

/// A created (or re-generated) loan together with its canonical schedule.
#[derive(Debug, Clone, Serialize)]
pub struct LoanCreated {
    pub loan: Loan,
    pub schedule: Vec<EmiScheduleEntry>,
}

pub struct LoanEngine<S: LoanStore> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: LoanStore> LoanEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Direct store access for display queries the engine does not wrap.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The serialization point for one loan. The map itself is only locked
    /// long enough to hand out the per-loan mutex.
    fn loan_lock(&self, loan_id: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(loan_id.to_string()).or_default().clone()
    }

    /// Create a loan from its terms and generate the canonical schedule.
    pub fn create_loan(
        &self,
        loan_id: &str,
        terms: &LoanTerms,
    ) -> LoanEngineResult<ComputationOutput<LoanCreated>> {
        let start = Instant::now();
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.store.load_loan(loan_id)?.is_some() {
            return Err(LoanEngineError::InvalidLoanTerms {
                field: "loan_id".into(),
                reason: format!("Loan {loan_id} already exists"),
            });
        }

        let (loan, warnings) = loan_from_terms(loan_id, terms)?;
        let schedule = generate_schedule(&loan)?;

        self.store.insert_loan(&loan)?;
        self.store.replace_schedule(loan_id, &schedule)?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "EMI Schedule Generation (reducing balance)",
            terms,
            warnings,
            elapsed,
            LoanCreated { loan, schedule },
        ))
    }

    /// Re-apply edited terms: the schedule is regenerated in full and every
    /// row reset to pending. Payment history against the old terms survives
    /// only in the event ledger.
    pub fn regenerate_schedule(
        &self,
        loan_id: &str,
        terms: &LoanTerms,
    ) -> LoanEngineResult<ComputationOutput<LoanCreated>> {
        let start = Instant::now();
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.load_loan(loan_id)?;
        if existing.status != LoanStatus::Active {
            return Err(LoanEngineError::LoanNotActive {
                loan_id: loan_id.to_string(),
                status: existing.status,
            });
        }

        let (mut loan, mut warnings) = loan_from_terms(loan_id, terms)?;
        loan.created_at = existing.created_at;

        let old_schedule = self.store.load_schedule(loan_id)?;
        let paid_rows = old_schedule.iter().filter(|e| e.is_paid()).count();
        if paid_rows > 0 {
            warnings.push(format!(
                "Term edit invalidated {paid_rows} paid installment(s); schedule regenerated from scratch"
            ));
        }

        let schedule = generate_schedule(&loan)?;
        self.store.update_loan(&loan)?;
        self.store.replace_schedule(loan_id, &schedule)?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "EMI Schedule Regeneration (term edit)",
            terms,
            warnings,
            elapsed,
            LoanCreated { loan, schedule },
        ))
    }

    /// Mark one pending installment as paid. Settling the last pending row
    /// completes the loan.
    pub fn mark_paid(
        &self,
        loan_id: &str,
        sequence: u32,
        paid_date: NaiveDate,
        payment_method: &str,
    ) -> LoanEngineResult<ComputationOutput<EmiScheduleEntry>> {
        let start = Instant::now();
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut loan = self.load_loan(loan_id)?;
        let mut schedule = self.store.load_schedule(loan_id)?;
        let entry = schedule
            .iter_mut()
            .find(|e| e.sequence == sequence)
            .ok_or_else(|| LoanEngineError::EntryNotFound {
                loan_id: loan_id.to_string(),
                sequence,
            })?;

        let mut warnings = mark_entry_paid(entry, &loan, paid_date, payment_method)?;
        let updated = entry.clone();
        self.store.update_entry(&updated)?;

        if loan.status == LoanStatus::Active && !schedule.iter().any(|e| e.is_pending()) {
            loan.status = LoanStatus::Completed;
            loan.closed_at = Some(paid_date);
            self.store.update_loan(&loan)?;
            warnings.push("All installments settled; loan marked completed".into());
        }

        let assumptions = serde_json::json!({
            "paid_date": paid_date,
            "payment_method": payment_method,
        });
        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Installment Settlement",
            &assumptions,
            warnings,
            elapsed,
            updated,
        ))
    }

    /// Apply a lump-sum part-payment under the chosen reduction policy,
    /// replacing the unpaid tail. An amount equal to the outstanding
    /// balance forecloses the loan instead.
    pub fn apply_part_payment(
        &self,
        loan_id: &str,
        amount: Money,
        date: NaiveDate,
        policy: ReductionPolicy,
    ) -> LoanEngineResult<ComputationOutput<PartPaymentOutcome>> {
        let start = Instant::now();
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut loan = self.load_loan(loan_id)?;
        let schedule = self.store.load_schedule(loan_id)?;
        let outcome = compute_part_payment(&loan, &schedule, amount, date, policy)?;

        let mut warnings = Vec::new();
        match &outcome {
            PartPaymentOutcome::Applied(out) => {
                let from_sequence = out.updated_tail[0].sequence;
                self.store
                    .replace_tail(loan_id, from_sequence, &out.updated_tail)?;
                if policy == ReductionPolicy::InstallmentReduction {
                    loan.emi = out.new_installment;
                    self.store.update_loan(&loan)?;
                }
                self.store.append_event(&EmiEvent {
                    loan_id: loan_id.to_string(),
                    event_type: EmiEventType::PartPayment,
                    amount,
                    event_date: date,
                    interest_saved: out.interest_saved,
                    policy: Some(policy),
                    created_at: Utc::now(),
                })?;
            }
            PartPaymentOutcome::ForeclosedInFull(fc) => {
                self.persist_foreclosure(&mut loan, fc)?;
                warnings.push(
                    "Part-payment equals the outstanding principal; loan foreclosed in full"
                        .into(),
                );
            }
        }

        let assumptions = serde_json::json!({
            "reduction_policy": policy,
            "event_date": date,
        });
        let elapsed = start.elapsed().as_micros() as u64;
        let methodology = match policy {
            ReductionPolicy::TenureReduction => "Part-Payment (tenure reduction)",
            ReductionPolicy::InstallmentReduction => "Part-Payment (installment reduction)",
        };
        Ok(with_metadata(methodology, &assumptions, warnings, elapsed, outcome))
    }

    /// Close the loan by full payoff as of `date`.
    pub fn apply_foreclosure(
        &self,
        loan_id: &str,
        date: NaiveDate,
    ) -> LoanEngineResult<ComputationOutput<ForeclosureOutput>> {
        let start = Instant::now();
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut loan = self.load_loan(loan_id)?;
        let schedule = self.store.load_schedule(loan_id)?;
        let output = compute_foreclosure(&loan, &schedule, date)?;
        self.persist_foreclosure(&mut loan, &output)?;

        let assumptions = serde_json::json!({
            "foreclosure_date": date,
            "accrual": "simple daily proration over the current period",
        });
        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Loan Foreclosure (full payoff)",
            &assumptions,
            Vec::new(),
            elapsed,
            output,
        ))
    }

    /// Read-only projection of proposed refinance terms. No lock taken.
    pub fn compare_refinance(
        &self,
        loan_id: &str,
        input: &RefinanceInput,
    ) -> LoanEngineResult<ComputationOutput<RefinanceOutput>> {
        let start = Instant::now();
        let loan = self.load_loan(loan_id)?;
        let schedule = self.store.load_schedule(loan_id)?;
        let output = compare_refinance(&loan, &schedule, input)?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Refinance Comparison (stateless projection)",
            input,
            Vec::new(),
            elapsed,
            output,
        ))
    }

    /// Delete a loan; the store cascades to its schedule and events.
    pub fn delete_loan(&self, loan_id: &str) -> LoanEngineResult<bool> {
        let lock = self.loan_lock(loan_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let existed = self.store.delete_loan(loan_id)?;
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(loan_id);
        Ok(existed)
    }

    fn load_loan(&self, loan_id: &str) -> LoanEngineResult<Loan> {
        self.store
            .load_loan(loan_id)?
            .ok_or_else(|| LoanEngineError::LoanNotFound(loan_id.to_string()))
    }

    fn persist_foreclosure(
        &self,
        loan: &mut Loan,
        output: &ForeclosureOutput,
    ) -> LoanEngineResult<()> {
        self.store.supersede_pending(&loan.id)?;
        loan.status = LoanStatus::Foreclosed;
        loan.closed_at = Some(output.foreclosure_date);
        self.store.update_loan(loan)?;
        self.store.append_event(&EmiEvent {
            loan_id: loan.id.clone(),
            event_type: EmiEventType::Foreclosure,
            amount: output.payoff_amount,
            event_date: output.foreclosure_date,
            interest_saved: output.interest_saved,
            policy: None,
            created_at: Utc::now(),
        })
    }
}

/// Build a `Loan` from terms, resolving the effective installment and
/// flagging overrides that diverge from the calculated EMI.
fn loan_from_terms(loan_id: &str, terms: &LoanTerms) -> LoanEngineResult<(Loan, Vec<String>)> {
    let calculated = calculate_emi(terms.principal, terms.annual_rate_pct, terms.tenure_months)?;

    let mut warnings = Vec::new();
    let emi = match terms.emi_override {
        Some(override_emi) => {
            let rounded = round_money(override_emi);
            if rounded <= Decimal::ZERO {
                return Err(LoanEngineError::InvalidLoanTerms {
                    field: "emi_override".into(),
                    reason: format!("Installment override must be positive, got {override_emi}"),
                });
            }
            if rounded < calculated {
                warnings.push(format!(
                    "Installment override {rounded} is below the calculated EMI {calculated}; \
                     the final installment will balloon"
                ));
            } else if rounded > calculated {
                warnings.push(format!(
                    "Installment override {rounded} exceeds the calculated EMI {calculated}; \
                     the loan will amortise in fewer than {} months",
                    terms.tenure_months
                ));
            }
            rounded
        }
        None => calculated,
    };

    Ok((
        Loan {
            id: loan_id.to_string(),
            principal: terms.principal,
            annual_rate_pct: terms.annual_rate_pct,
            tenure_months: terms.tenure_months,
            start_date: terms.start_date,
            emi,
            status: LoanStatus::Active,
            created_at: Utc::now(),
            closed_at: None,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn engine() -> LoanEngine<MemoryStore> {
        LoanEngine::new(MemoryStore::new())
    }

    fn reference_terms() -> LoanTerms {
        LoanTerms {
            principal: dec!(500_000),
            annual_rate_pct: dec!(9.5),
            tenure_months: 240,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            emi_override: None,
        }
    }

    #[test]
    fn test_create_loan_persists_schedule() {
        let engine = engine();
        let out = engine.create_loan("L1", &reference_terms()).unwrap();
        assert_eq!(out.result.schedule.len(), 240);
        assert_eq!(out.result.loan.status, LoanStatus::Active);
        assert!(out.warnings.is_empty());

        let stored = engine.store().load_schedule("L1").unwrap();
        assert_eq!(stored.len(), 240);
    }

    #[test]
    fn test_duplicate_loan_id_rejected() {
        let engine = engine();
        engine.create_loan("L1", &reference_terms()).unwrap();
        let err = engine.create_loan("L1", &reference_terms()).unwrap_err();
        assert!(matches!(err, LoanEngineError::InvalidLoanTerms { .. }));
    }

    #[test]
    fn test_override_divergence_warns() {
        let engine = engine();
        let mut terms = reference_terms();
        terms.emi_override = Some(dec!(5000));
        let out = engine.create_loan("L1", &terms).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("exceeds the calculated EMI"));
        assert!(out.result.schedule.len() < 240);
    }

    #[test]
    fn test_term_edit_regenerates_and_warns_on_history() {
        let engine = engine();
        let out = engine.create_loan("L1", &reference_terms()).unwrap();
        let due = out.result.schedule[0].due_date;
        engine.mark_paid("L1", 1, due, "upi").unwrap();

        let mut edited = reference_terms();
        edited.annual_rate_pct = dec!(8.5);
        let regenerated = engine.regenerate_schedule("L1", &edited).unwrap();
        assert!(regenerated
            .warnings
            .iter()
            .any(|w| w.contains("invalidated 1 paid installment")));
        assert!(regenerated
            .result
            .schedule
            .iter()
            .all(|e| e.is_pending()));
    }

    #[test]
    fn test_missing_loan_and_entry() {
        let engine = engine();
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert!(matches!(
            engine.mark_paid("ghost", 1, date, "upi").unwrap_err(),
            LoanEngineError::LoanNotFound(_)
        ));

        engine.create_loan("L1", &reference_terms()).unwrap();
        assert!(matches!(
            engine.mark_paid("L1", 999, date, "upi").unwrap_err(),
            LoanEngineError::EntryNotFound { .. }
        ));
    }

    #[test]
    fn test_delete_loan_cascades() {
        let engine = engine();
        engine.create_loan("L1", &reference_terms()).unwrap();
        assert!(engine.delete_loan("L1").unwrap());
        assert!(engine.store().load_loan("L1").unwrap().is_none());
        assert!(!engine.delete_loan("L1").unwrap());
    }
}
