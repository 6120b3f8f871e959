//! Settlement state machine tests: idempotency under at-least-once delivery.

mod common;

use common::*;
use splitfact::settlement::{complete_settlement, settle_invoice, SettlementOutcome};

#[test]
fn test_settlement_transitions_invoice_to_paid() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", Some("acct_issuer"));
    let member = create_test_user(&conn, "member@test.local", Some("acct_member"));
    let collective = create_test_collective(&conn, "Test Collective");
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        Some(&collective.id),
        100000,
        &[(&issuer.id, 60000), (&member.id, 40000)],
    );

    let outcome = settle_invoice(&mut conn, &invoice.id, "stripe", "evt_1", Some("pi_1"))
        .expect("Settlement should succeed");
    assert_eq!(outcome, SettlementOutcome::Settled);

    let settled = queries::get_invoice_by_id(&conn, &invoice.id)
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, InvoiceStatus::Paid);
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    assert_eq!(settled.payment_reference.as_deref(), Some("pi_1"));
}

#[test]
fn test_redelivered_event_is_a_noop() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let member = create_test_user(&conn, "member@test.local", None);
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        None,
        50000,
        &[(&issuer.id, 25000), (&member.id, 25000)],
    );

    let first = settle_invoice(&mut conn, &invoice.id, "stripe", "evt_dup", Some("pi_1")).unwrap();
    assert_eq!(first, SettlementOutcome::Settled);

    // Same event id redelivered N more times
    for _ in 0..3 {
        let again =
            settle_invoice(&mut conn, &invoice.id, "stripe", "evt_dup", Some("pi_1")).unwrap();
        assert_eq!(again, SettlementOutcome::AlreadyProcessed);
    }

    assert!(queries::webhook_event_seen(&conn, "stripe", "evt_dup").unwrap());
}

#[test]
fn test_fresh_event_id_for_paid_invoice_is_a_noop() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let member = create_test_user(&conn, "member@test.local", None);
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        None,
        50000,
        &[(&issuer.id, 25000), (&member.id, 25000)],
    );

    settle_invoice(&mut conn, &invoice.id, "stripe", "evt_a", Some("pi_original")).unwrap();

    // Processor redelivers with a fresh event id and a different reference;
    // the paid state is monotonic and the original reference stands.
    let outcome =
        settle_invoice(&mut conn, &invoice.id, "stripe", "evt_b", Some("pi_other")).unwrap();
    assert_eq!(outcome, SettlementOutcome::AlreadyProcessed);

    let settled = queries::get_invoice_by_id(&conn, &invoice.id)
        .unwrap()
        .unwrap();
    assert_eq!(settled.payment_reference.as_deref(), Some("pi_original"));
}

#[test]
fn test_sub_invoices_paid_in_lockstep_exactly_once() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let b = create_test_user(&conn, "b@test.local", None);
    let c = create_test_user(&conn, "c@test.local", None);
    let collective = create_test_collective(&conn, "Trio");
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        Some(&collective.id),
        30000,
        &[(&issuer.id, 10000), (&b.id, 10000), (&c.id, 10000)],
    );

    // Explicit generation before settlement: sub-invoices mirror pending
    let generation = splitfact::billing::generate_sub_invoices(&conn, &invoice.id).unwrap();
    assert_eq!(generation.created.len(), 2);
    for sub in &generation.created {
        assert_eq!(sub.payment_status, PaymentStatus::Pending);
    }

    settle_invoice(&mut conn, &invoice.id, "stripe", "evt_1", None).unwrap();

    // First completion pass flips both children
    let updated = queries::mark_sub_invoices_paid(&conn, &invoice.id).unwrap();
    assert_eq!(updated, 2);

    // Redelivery path: complete_settlement is a no-op on already-paid rows
    complete_settlement(&conn, &invoice.id).unwrap();
    let updated_again = queries::mark_sub_invoices_paid(&conn, &invoice.id).unwrap();
    assert_eq!(updated_again, 0);

    let subs = queries::list_sub_invoices_for_invoice(&conn, &invoice.id).unwrap();
    assert_eq!(subs.len(), 2);
    for sub in &subs {
        assert_eq!(sub.payment_status, PaymentStatus::Paid);
        assert_eq!(sub.status, InvoiceStatus::Paid);
    }
}

#[test]
fn test_settlement_generates_missing_sub_invoices_as_paid() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let member = create_test_user(&conn, "member@test.local", None);
    let collective = create_test_collective(&conn, "Duo");
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        Some(&collective.id),
        20000,
        &[(&issuer.id, 12000), (&member.id, 8000)],
    );

    // No explicit generation happened before the payment arrived
    settle_invoice(&mut conn, &invoice.id, "stripe", "evt_1", None).unwrap();
    complete_settlement(&conn, &invoice.id).unwrap();

    let subs = queries::list_sub_invoices_for_invoice(&conn, &invoice.id).unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].receiver_id, member.id);
    assert_eq!(subs[0].amount_cents, 8000);
    assert_eq!(subs[0].payment_status, PaymentStatus::Paid);
}
