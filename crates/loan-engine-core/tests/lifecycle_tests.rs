use chrono::NaiveDate;
use loan_engine_core::engine::LoanEngine;
use loan_engine_core::part_payment::PartPaymentOutcome;
use loan_engine_core::refinance::RefinanceInput;
use loan_engine_core::store::{LoanStore, MemoryStore};
use loan_engine_core::{
    EmiEventType, LoanEngineError, LoanStatus, LoanTerms, PaymentStatus, ReductionPolicy,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Loan lifecycle tests (end-to-end through the engine)
// ===========================================================================

fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "expected {expected} ± {tolerance}, got {actual} (diff {diff})"
    );
}

fn engine() -> LoanEngine<MemoryStore> {
    LoanEngine::new(MemoryStore::new())
}

/// A 20-year 500k home loan at 9.5% starting mid-month.
fn reference_terms() -> LoanTerms {
    LoanTerms {
        principal: dec!(500_000),
        annual_rate_pct: dec!(9.5),
        tenure_months: 240,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        emi_override: None,
    }
}

/// Mark installments 1..=n paid on their due dates.
fn pay_through(engine: &LoanEngine<MemoryStore>, loan_id: &str, n: u32) {
    let schedule = engine.store().load_schedule(loan_id).unwrap();
    for entry in schedule.iter().take(n as usize) {
        engine
            .mark_paid(loan_id, entry.sequence, entry.due_date, "auto_debit")
            .unwrap();
    }
}

#[test]
fn test_create_reference_loan() {
    let engine = engine();
    let out = engine.create_loan("HL-1", &reference_terms()).unwrap();

    assert_close(out.result.loan.emi, dec!(4660.65), dec!(0.10));
    assert_eq!(out.result.schedule.len(), 240);
    assert_eq!(
        out.result.schedule[0].interest_component,
        dec!(3958.33),
        "first month interest is 500k x 9.5%/12"
    );
    assert_eq!(out.result.schedule[239].remaining_principal, Decimal::ZERO);

    let principal_total: Decimal = out
        .result
        .schedule
        .iter()
        .map(|e| e.principal_component)
        .sum();
    assert_eq!(principal_total, dec!(500_000));
}

#[test]
fn test_part_payment_tenure_reduction_after_first_year() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);

    let date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    let out = engine
        .apply_part_payment("HL-1", dec!(100_000), date, ReductionPolicy::TenureReduction)
        .unwrap();

    let applied = match out.result {
        PartPaymentOutcome::Applied(a) => a,
        PartPaymentOutcome::ForeclosedInFull(_) => panic!("expected an applied part-payment"),
    };
    assert_eq!(applied.previous_remaining_rows, 228);
    assert!(
        applied.new_remaining_rows < 228,
        "tenure reduction must shorten the tail, got {} rows",
        applied.new_remaining_rows
    );
    assert!(applied.interest_saved > Decimal::ZERO);
    assert_eq!(
        applied.outstanding_after,
        applied.outstanding_before - dec!(100_000)
    );

    // Installment unchanged, history intact, cadence continuous.
    let loan = engine.store().load_loan("HL-1").unwrap().unwrap();
    assert_close(loan.emi, dec!(4660.65), dec!(0.10));

    let schedule = engine.store().load_schedule("HL-1").unwrap();
    let paid = schedule.iter().filter(|e| e.is_paid()).count();
    assert_eq!(paid, 12);
    let first_pending = schedule.iter().find(|e| e.is_pending()).unwrap();
    assert_eq!(first_pending.sequence, 13);
    assert_eq!(first_pending.due_date, loan.due_date_for(13));
    assert_eq!(schedule.last().unwrap().remaining_principal, Decimal::ZERO);
}

#[test]
fn test_part_payment_installment_reduction_keeps_row_count() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);

    let date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    let out = engine
        .apply_part_payment(
            "HL-1",
            dec!(100_000),
            date,
            ReductionPolicy::InstallmentReduction,
        )
        .unwrap();

    let applied = match out.result {
        PartPaymentOutcome::Applied(a) => a,
        PartPaymentOutcome::ForeclosedInFull(_) => panic!("expected an applied part-payment"),
    };
    assert_eq!(applied.new_remaining_rows, 228);
    assert!(applied.new_installment < dec!(4660.66));

    // The reduced installment becomes the loan's installment of record.
    let loan = engine.store().load_loan("HL-1").unwrap().unwrap();
    assert_eq!(loan.emi, applied.new_installment);
}

#[test]
fn test_foreclosure_on_a_due_date_has_no_accrual() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);

    // Foreclosing on the day installment 12 was paid: zero days elapsed in
    // the current period, so the payoff is the bare outstanding balance.
    let schedule = engine.store().load_schedule("HL-1").unwrap();
    let expected_outstanding = schedule[11].remaining_principal;
    let date = schedule[11].due_date;

    let out = engine.apply_foreclosure("HL-1", date).unwrap();
    assert_eq!(out.result.accrued_interest, Decimal::ZERO);
    assert_eq!(out.result.outstanding_principal, expected_outstanding);
    assert_eq!(out.result.payoff_amount, expected_outstanding);
    assert_eq!(out.result.superseded_rows, 228);
    assert!(out.result.interest_saved > Decimal::ZERO);

    let loan = engine.store().load_loan("HL-1").unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Foreclosed);
    assert_eq!(loan.closed_at, Some(date));

    let schedule = engine.store().load_schedule("HL-1").unwrap();
    assert!(schedule
        .iter()
        .skip(12)
        .all(|e| e.status == PaymentStatus::Superseded));
    assert!(schedule.iter().take(12).all(|e| e.is_paid()));
}

#[test]
fn test_foreclosure_with_single_pending_row() {
    let engine = engine();
    let terms = LoanTerms {
        principal: dec!(36_000),
        annual_rate_pct: dec!(10),
        tenure_months: 3,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        emi_override: None,
    };
    engine.create_loan("PL-2", &terms).unwrap();
    pay_through(&engine, "PL-2", 2);

    // Halfway through the final period; only row 3 is left to supersede.
    let date = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
    let out = engine.apply_foreclosure("PL-2", date).unwrap();
    assert_eq!(out.result.superseded_rows, 1);
    assert!(out.result.accrued_interest > Decimal::ZERO);

    let schedule = engine.store().load_schedule("PL-2").unwrap();
    assert_eq!(schedule[2].status, PaymentStatus::Superseded);
    assert_eq!(out.result.outstanding_principal, schedule[1].remaining_principal);
}

#[test]
fn test_double_foreclosure_rejected() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    engine.apply_foreclosure("HL-1", date).unwrap();

    let err = engine.apply_foreclosure("HL-1", date).unwrap_err();
    assert!(matches!(
        err,
        LoanEngineError::LoanNotActive {
            status: LoanStatus::Foreclosed,
            ..
        }
    ));
}

#[test]
fn test_part_payment_of_full_balance_forecloses() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);

    let schedule = engine.store().load_schedule("HL-1").unwrap();
    let outstanding = schedule[11].remaining_principal;
    let date = schedule[11].due_date;

    let out = engine
        .apply_part_payment("HL-1", outstanding, date, ReductionPolicy::TenureReduction)
        .unwrap();
    assert!(matches!(out.result, PartPaymentOutcome::ForeclosedInFull(_)));
    assert!(!out.warnings.is_empty());

    let loan = engine.store().load_loan("HL-1").unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Foreclosed);
}

#[test]
fn test_settling_every_installment_completes_the_loan() {
    let engine = engine();
    let terms = LoanTerms {
        principal: dec!(12_000),
        annual_rate_pct: dec!(12),
        tenure_months: 1,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        emi_override: None,
    };
    let out = engine.create_loan("PL-1", &terms).unwrap();
    assert_eq!(out.result.schedule.len(), 1);
    assert_eq!(out.result.schedule[0].installment, dec!(12_120));

    let due = out.result.schedule[0].due_date;
    let settled = engine.mark_paid("PL-1", 1, due, "neft").unwrap();
    assert!(settled.warnings.iter().any(|w| w.contains("completed")));

    let loan = engine.store().load_loan("PL-1").unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Completed);
    assert_eq!(loan.closed_at, Some(due));

    // Nothing left to foreclose on a completed loan.
    let err = engine.apply_foreclosure("PL-1", due).unwrap_err();
    assert!(matches!(err, LoanEngineError::LoanNotActive { .. }));
}

#[test]
fn test_mark_paid_is_not_repeatable() {
    let engine = engine();
    let out = engine.create_loan("HL-1", &reference_terms()).unwrap();
    let due = out.result.schedule[0].due_date;
    engine.mark_paid("HL-1", 1, due, "upi").unwrap();

    let err = engine.mark_paid("HL-1", 1, due, "upi").unwrap_err();
    assert!(matches!(
        err,
        LoanEngineError::AlreadyPaid { sequence: 1, .. }
    ));

    // The failed retry must not have touched the row.
    let schedule = engine.store().load_schedule("HL-1").unwrap();
    assert_eq!(schedule[0].paid_date, Some(due));
    assert_eq!(schedule[0].payment_method.as_deref(), Some("upi"));
}

#[test]
fn test_refinance_comparison_is_read_only() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);
    let before = engine.store().load_schedule("HL-1").unwrap();

    let input = RefinanceInput {
        proposed_annual_rate_pct: Some(dec!(8.0)),
        proposed_tenure_months: None,
    };
    let out = engine.compare_refinance("HL-1", &input).unwrap();
    assert!(out.result.interest_savings > Decimal::ZERO);
    assert_eq!(out.result.proposed_tenure_months, 228);
    assert_eq!(out.result.projected_schedule.len(), 228);

    let after = engine.store().load_schedule("HL-1").unwrap();
    assert_eq!(before, after, "a comparison must not mutate the schedule");
    let loan = engine.store().load_loan("HL-1").unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
}

#[test]
fn test_event_ledger_records_part_payment_and_foreclosure() {
    let engine = engine();
    engine.create_loan("HL-1", &reference_terms()).unwrap();
    pay_through(&engine, "HL-1", 12);

    let pp_date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    engine
        .apply_part_payment(
            "HL-1",
            dec!(100_000),
            pp_date,
            ReductionPolicy::TenureReduction,
        )
        .unwrap();
    let fc_date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let fc = engine.apply_foreclosure("HL-1", fc_date).unwrap();

    let events = engine.store().load_events("HL-1").unwrap();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].event_type, EmiEventType::PartPayment);
    assert_eq!(events[0].amount, dec!(100_000));
    assert_eq!(events[0].event_date, pp_date);
    assert_eq!(events[0].policy, Some(ReductionPolicy::TenureReduction));

    assert_eq!(events[1].event_type, EmiEventType::Foreclosure);
    assert_eq!(events[1].amount, fc.result.payoff_amount);
    assert_eq!(events[1].event_date, fc_date);
    assert_eq!(events[1].policy, None);
}

#[test]
fn test_output_envelope_metadata() {
    let engine = engine();
    let out = engine.create_loan("HL-1", &reference_terms()).unwrap();

    assert_eq!(out.methodology, "EMI Schedule Generation (reducing balance)");
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    assert_eq!(out.metadata.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(out.assumptions["tenure_months"], 240);
}
