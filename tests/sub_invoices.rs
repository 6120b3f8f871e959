//! Sub-invoice generator tests: idempotency and issuer exclusion.

mod common;

use common::*;
use splitfact::billing::generate_sub_invoices;

#[test]
fn test_generates_one_sub_invoice_per_non_issuer_share() {
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

    let generation = generate_sub_invoices(&conn, &invoice.id).unwrap();

    assert_eq!(generation.created.len(), 2);
    assert_eq!(generation.existing, 0);
    assert!(!generation.is_noop());

    let receivers: Vec<&str> = generation
        .created
        .iter()
        .map(|s| s.receiver_id.as_str())
        .collect();
    assert!(receivers.contains(&b.id.as_str()));
    assert!(receivers.contains(&c.id.as_str()));
    assert!(!receivers.contains(&issuer.id.as_str()));

    for sub in &generation.created {
        assert_eq!(sub.parent_invoice_id, invoice.id);
        assert_eq!(sub.issuer_id, issuer.id);
        assert_eq!(sub.amount_cents, 10000);
        assert_eq!(sub.status, invoice.status);
        assert_eq!(sub.payment_status, invoice.payment_status);
    }
}

#[test]
fn test_repeated_generation_is_a_distinguishable_noop() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let member = create_test_user(&conn, "member@test.local", None);
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        None,
        20000,
        &[(&issuer.id, 15000), (&member.id, 5000)],
    );

    let first = generate_sub_invoices(&conn, &invoice.id).unwrap();
    assert_eq!(first.created.len(), 1);

    // Callers short-circuit on the no-op result (200 instead of 201)
    let second = generate_sub_invoices(&conn, &invoice.id).unwrap();
    assert!(second.is_noop());
    assert_eq!(second.existing, 1);

    // Never more than one per (parent, receiver) pair
    let subs = queries::list_sub_invoices_for_invoice(&conn, &invoice.id).unwrap();
    assert_eq!(subs.len(), 1);
}

#[test]
fn test_generation_rejects_corrupted_share_sum() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "issuer@test.local", None);
    let member = create_test_user(&conn, "member@test.local", None);
    let invoice = create_test_invoice(
        &mut conn,
        &issuer.id,
        None,
        20000,
        &[(&issuer.id, 15000), (&member.id, 5000)],
    );

    // A share edited out from under the invoice no longer conserves the total
    conn.execute(
        "UPDATE invoice_shares SET amount_cents = 4000 WHERE invoice_id = ?1 AND user_id = ?2",
        rusqlite::params![&invoice.id, &member.id],
    )
    .unwrap();

    let result = generate_sub_invoices(&conn, &invoice.id);
    assert!(matches!(result, Err(AppError::ShareMismatch { .. })));

    // Nothing was billed from the misallocated share set
    assert!(queries::list_sub_invoices_for_invoice(&conn, &invoice.id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_generation_for_unknown_invoice_fails() {
    let conn = setup_test_db();
    let result = generate_sub_invoices(&conn, "inv_missing");
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_issuer_only_invoice_generates_nothing() {
    let mut conn = setup_test_db();
    let issuer = create_test_user(&conn, "solo@test.local", None);
    let invoice =
        create_test_invoice(&mut conn, &issuer.id, None, 10000, &[(&issuer.id, 10000)]);

    let generation = generate_sub_invoices(&conn, &invoice.id).unwrap();
    assert!(generation.is_noop());
    assert_eq!(generation.existing, 0);
}
