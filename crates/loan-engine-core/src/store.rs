//! Persistence boundary.
//!
//! The engine performs no I/O of its own; everything it persists goes
//! through `LoanStore`. Implementations map their transport failures to
//! `LoanEngineError::Storage`, which callers may retry; domain errors they
//! must not.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::LoanEngineError;
use crate::types::{EmiEvent, EmiScheduleEntry, Loan, PaymentStatus};
use crate::LoanEngineResult;

pub trait LoanStore: Send + Sync {
    fn insert_loan(&self, loan: &Loan) -> LoanEngineResult<()>;
    fn load_loan(&self, id: &str) -> LoanEngineResult<Option<Loan>>;
    fn update_loan(&self, loan: &Loan) -> LoanEngineResult<()>;
    /// Delete the loan, cascading to its schedule and events. Returns
    /// whether anything existed.
    fn delete_loan(&self, id: &str) -> LoanEngineResult<bool>;

    /// Replace the loan's schedule in full.
    fn replace_schedule(&self, loan_id: &str, rows: &[EmiScheduleEntry]) -> LoanEngineResult<()>;
    /// Rows ordered by sequence.
    fn load_schedule(&self, loan_id: &str) -> LoanEngineResult<Vec<EmiScheduleEntry>>;
    /// Overwrite a single row, matched by (loan_id, sequence).
    fn update_entry(&self, entry: &EmiScheduleEntry) -> LoanEngineResult<()>;
    /// Drop pending rows from `from_sequence` onward and splice in `rows`.
    fn replace_tail(
        &self,
        loan_id: &str,
        from_sequence: u32,
        rows: &[EmiScheduleEntry],
    ) -> LoanEngineResult<()>;
    /// Flag every pending row as superseded; returns how many were flagged.
    fn supersede_pending(&self, loan_id: &str) -> LoanEngineResult<u32>;

    fn append_event(&self, event: &EmiEvent) -> LoanEngineResult<()>;
    fn load_events(&self, loan_id: &str) -> LoanEngineResult<Vec<EmiEvent>>;
}

/// In-memory reference store used by the CLI and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    loans: HashMap<String, Loan>,
    schedules: HashMap<String, Vec<EmiScheduleEntry>>,
    events: HashMap<String, Vec<EmiEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LoanEngineResult<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| LoanEngineError::Storage("memory store mutex poisoned".into()))
    }
}

impl LoanStore for MemoryStore {
    fn insert_loan(&self, loan: &Loan) -> LoanEngineResult<()> {
        let mut inner = self.lock()?;
        inner.loans.insert(loan.id.clone(), loan.clone());
        Ok(())
    }

    fn load_loan(&self, id: &str) -> LoanEngineResult<Option<Loan>> {
        Ok(self.lock()?.loans.get(id).cloned())
    }

    fn update_loan(&self, loan: &Loan) -> LoanEngineResult<()> {
        let mut inner = self.lock()?;
        if !inner.loans.contains_key(&loan.id) {
            return Err(LoanEngineError::LoanNotFound(loan.id.clone()));
        }
        inner.loans.insert(loan.id.clone(), loan.clone());
        Ok(())
    }

    fn delete_loan(&self, id: &str) -> LoanEngineResult<bool> {
        let mut inner = self.lock()?;
        let existed = inner.loans.remove(id).is_some();
        inner.schedules.remove(id);
        inner.events.remove(id);
        Ok(existed)
    }

    fn replace_schedule(&self, loan_id: &str, rows: &[EmiScheduleEntry]) -> LoanEngineResult<()> {
        self.lock()?
            .schedules
            .insert(loan_id.to_string(), rows.to_vec());
        Ok(())
    }

    fn load_schedule(&self, loan_id: &str) -> LoanEngineResult<Vec<EmiScheduleEntry>> {
        let mut rows = self
            .lock()?
            .schedules
            .get(loan_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|e| e.sequence);
        Ok(rows)
    }

    fn update_entry(&self, entry: &EmiScheduleEntry) -> LoanEngineResult<()> {
        let mut inner = self.lock()?;
        let rows = inner
            .schedules
            .get_mut(&entry.loan_id)
            .ok_or_else(|| LoanEngineError::LoanNotFound(entry.loan_id.clone()))?;
        let slot = rows
            .iter_mut()
            .find(|e| e.sequence == entry.sequence)
            .ok_or_else(|| LoanEngineError::EntryNotFound {
                loan_id: entry.loan_id.clone(),
                sequence: entry.sequence,
            })?;
        *slot = entry.clone();
        Ok(())
    }

    fn replace_tail(
        &self,
        loan_id: &str,
        from_sequence: u32,
        rows: &[EmiScheduleEntry],
    ) -> LoanEngineResult<()> {
        let mut inner = self.lock()?;
        let schedule = inner
            .schedules
            .get_mut(loan_id)
            .ok_or_else(|| LoanEngineError::LoanNotFound(loan_id.to_string()))?;
        schedule.retain(|e| {
            e.sequence < from_sequence || e.status != PaymentStatus::Pending
        });
        schedule.extend_from_slice(rows);
        schedule.sort_by_key(|e| e.sequence);
        Ok(())
    }

    fn supersede_pending(&self, loan_id: &str) -> LoanEngineResult<u32> {
        let mut inner = self.lock()?;
        let schedule = inner
            .schedules
            .get_mut(loan_id)
            .ok_or_else(|| LoanEngineError::LoanNotFound(loan_id.to_string()))?;
        let mut count = 0;
        for row in schedule.iter_mut() {
            if row.status == PaymentStatus::Pending {
                row.status = PaymentStatus::Superseded;
                count += 1;
            }
        }
        Ok(count)
    }

    fn append_event(&self, event: &EmiEvent) -> LoanEngineResult<()> {
        self.lock()?
            .events
            .entry(event.loan_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn load_events(&self, loan_id: &str) -> LoanEngineResult<Vec<EmiEvent>> {
        Ok(self
            .lock()?
            .events
            .get(loan_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmiEventType, LoanStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn sample_loan(id: &str) -> Loan {
        Loan {
            id: id.into(),
            principal: dec!(10_000),
            annual_rate_pct: dec!(12),
            tenure_months: 6,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            emi: dec!(1725.48),
            status: LoanStatus::Active,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_loan_round_trip_and_cascade() {
        let store = MemoryStore::new();
        let loan = sample_loan("L1");
        store.insert_loan(&loan).unwrap();
        assert!(store.load_loan("L1").unwrap().is_some());

        let rows = crate::schedule::generate_schedule(&loan).unwrap();
        store.replace_schedule("L1", &rows).unwrap();
        store
            .append_event(&EmiEvent {
                loan_id: "L1".into(),
                event_type: EmiEventType::PartPayment,
                amount: dec!(500),
                event_date: loan.start_date,
                interest_saved: dec!(12.34),
                policy: None,
                created_at: Utc::now(),
            })
            .unwrap();

        assert!(store.delete_loan("L1").unwrap());
        assert!(store.load_loan("L1").unwrap().is_none());
        assert!(store.load_schedule("L1").unwrap().is_empty());
        assert!(store.load_events("L1").unwrap().is_empty());
        assert!(!store.delete_loan("L1").unwrap());
    }

    #[test]
    fn test_replace_tail_keeps_paid_prefix() {
        let store = MemoryStore::new();
        let loan = sample_loan("L2");
        store.insert_loan(&loan).unwrap();
        let mut rows = crate::schedule::generate_schedule(&loan).unwrap();
        rows[0].status = PaymentStatus::Paid;
        store.replace_schedule("L2", &rows).unwrap();

        let replacement: Vec<EmiScheduleEntry> = rows[1..3]
            .iter()
            .map(|e| EmiScheduleEntry {
                installment: dec!(999),
                ..e.clone()
            })
            .collect();
        store.replace_tail("L2", 2, &replacement).unwrap();

        let reloaded = store.load_schedule("L2").unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded[0].status, PaymentStatus::Paid);
        assert_eq!(reloaded[1].installment, dec!(999));
    }

    #[test]
    fn test_update_entry_missing_row() {
        let store = MemoryStore::new();
        let loan = sample_loan("L3");
        store.insert_loan(&loan).unwrap();
        let rows = crate::schedule::generate_schedule(&loan).unwrap();
        store.replace_schedule("L3", &rows).unwrap();

        let mut ghost = rows[0].clone();
        ghost.sequence = 99;
        let err = store.update_entry(&ghost).unwrap_err();
        assert!(matches!(err, LoanEngineError::EntryNotFound { .. }));
    }
}
