mod common;

use billing_sync_service::error::SyncError;
use billing_sync_service::models::remote::RemoteCreditNote;
use billing_sync_service::models::{
    JournalType, MoveState, MoveType, NewJournal, NewJournalConfig, PaymentState,
};
use billing_sync_service::services::LedgerStore;
use billing_sync_service::sync::{CreditNoteOutcome, InvoiceOutcome};
use chrono::NaiveDate;
use common::{invoice, invoice_json, line, linked_payment, TestEngine};
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn new_invoice_is_created_and_posted() {
    let (engine, company, sale, _) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);

    let remote = invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]);
    let outcome = engine.reconciler.sync_invoice(&remote).await.unwrap();

    let InvoiceOutcome::Created(document) = outcome else {
        panic!("expected a created invoice, got {:?}", outcome);
    };
    assert_eq!(document.state, MoveState::Posted);
    assert_eq!(document.company_id, company.company_id);
    assert_eq!(document.journal_id, sale.journal_id);
    assert_eq!(document.amount_total, Decimal::new(5000, 2));
    assert_eq!(document.remote_subscription_id.as_deref(), Some("sub_1"));

    let lines = engine.store.move_lines(document.move_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].product_id.is_some());
}

#[tokio::test]
async fn posted_invoice_is_never_rewritten() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);

    let first = engine
        .reconciler
        .sync_invoice(&invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap();
    let changed = invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 9900)]);
    let second = engine.reconciler.sync_invoice(&changed).await.unwrap();

    let InvoiceOutcome::Unchanged(document) = second else {
        panic!("posted invoice must be left alone, got {:?}", second);
    };
    assert_eq!(document.move_id, first.document().move_id);
    assert_eq!(document.amount_total, Decimal::new(5000, 2));
    assert_eq!(engine.store.list_moves(Some(MoveType::Invoice)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn draft_invoice_is_refreshed_in_place() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);

    let created = engine
        .reconciler
        .sync_invoice(&invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap();
    engine
        .store
        .set_move_state(created.document().move_id, MoveState::Draft)
        .await
        .unwrap();

    let refreshed = engine
        .reconciler
        .sync_invoice(&invoice(
            "inv_1",
            "payment_due",
            vec![
                line("li_1", "pro-USD-monthly", 5000),
                line("li_2", "pro-USD-monthly", 2500),
            ],
        ))
        .await
        .unwrap();

    let InvoiceOutcome::Updated(document) = refreshed else {
        panic!("draft invoice should be refreshed, got {:?}", refreshed);
    };
    assert_eq!(document.move_id, created.document().move_id);
    assert_eq!(document.state, MoveState::Posted);
    assert_eq!(document.amount_total, Decimal::new(7500, 2));
    assert_eq!(engine.store.move_lines(document.move_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn linked_payments_are_capped_to_the_residual() {
    let (engine, _, _, bank) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);

    let remote = invoice_json(
        "inv_paid",
        "paid",
        vec![line("li_1", "pro-USD-monthly", 5000)],
        json!([linked_payment("txn_a", 3000), linked_payment("txn_b", 4000)]),
    );
    let outcome = engine.reconciler.sync_invoice(&remote).await.unwrap();
    let document = outcome.document();

    let payments = engine.store.payments_for_move(document.move_id).await.unwrap();
    let amounts: Vec<Decimal> = payments.iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![Decimal::new(3000, 2), Decimal::new(2000, 2)]);
    assert!(payments.iter().all(|p| p.journal_id == bank.journal_id));
    assert_eq!(document.amount_residual, Decimal::ZERO);
    assert_eq!(document.payment_state(), PaymentState::Paid);

    engine.reconciler.sync_invoice(&remote).await.unwrap();
    assert_eq!(
        engine.store.payments_for_move(document.move_id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn unpaid_invoice_registers_no_payments() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;

    let remote = invoice_json(
        "inv_due",
        "payment_due",
        vec![line("li_1", "pro-USD-monthly", 5000)],
        json!([linked_payment("txn_a", 1000)]),
    );
    let outcome = engine.reconciler.sync_invoice(&remote).await.unwrap();
    assert!(engine
        .store
        .payments_for_move(outcome.document().move_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn invoice_without_lines_is_rejected() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;

    let err = engine
        .reconciler
        .sync_invoice(&invoice("inv_empty", "payment_due", vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoBillableLines(id) if id == "inv_empty"));
    assert!(engine.store.list_moves(None).await.unwrap().is_empty());
    assert!(engine.store.list_partners().await.unwrap().is_empty());
}

#[tokio::test]
async fn credit_note_without_lines_leaves_no_partner() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    let mut empty = credit_note("cn_empty", "inv_1", 1000);
    empty.customer_id = Some("cus_1".to_string());
    empty.line_items.clear();

    let err = engine.reconciler.sync_credit_note(&empty).await.unwrap_err();

    assert!(matches!(err, SyncError::NoBillableLines(id) if id == "cn_empty"));
    assert!(engine.store.list_partners().await.unwrap().is_empty());
}

#[tokio::test]
async fn line_service_period_becomes_deferred_dates() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);
    let mut period = line("li_1", "pro-USD-monthly", 5000);
    // 2024-03-01T00:00:00Z and 2024-03-31T23:00:00Z
    period["date_from"] = json!(1_709_251_200);
    period["date_to"] = json!(1_711_926_000);

    let outcome = engine
        .reconciler
        .sync_invoice(&invoice("inv_deferred", "payment_due", vec![period]))
        .await
        .unwrap();

    let lines = engine
        .store
        .move_lines(outcome.document().move_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].deferred_start, NaiveDate::from_ymd_opt(2024, 3, 1));
    assert_eq!(lines[0].deferred_end, NaiveDate::from_ymd_opt(2024, 4, 1));
}

#[tokio::test]
async fn family_config_takes_precedence_over_company_config() {
    let (engine, company, sale, bank) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", Some("fam_saas"));
    engine.api.add_item("basic", None);

    let family = engine.reconciler.family_for_remote_id("fam_saas").await.unwrap();
    let saas_sales = engine
        .store
        .create_journal(NewJournal {
            company_id: company.company_id,
            name: "SaaS Sales".to_string(),
            journal_type: JournalType::Sale,
        })
        .await
        .unwrap();
    let company_wide = engine
        .store
        .create_journal(NewJournal {
            company_id: company.company_id,
            name: "Other Sales".to_string(),
            journal_type: JournalType::Sale,
        })
        .await
        .unwrap();
    for (family_id, journal_id) in [
        (None, company_wide.journal_id),
        (Some(family.family_id), saas_sales.journal_id),
    ] {
        engine
            .store
            .create_journal_config(NewJournalConfig {
                company_id: company.company_id,
                family_id,
                invoice_journal_id: journal_id,
                invoice_payment_journal_id: bank.journal_id,
                credit_note_journal_id: journal_id,
                credit_note_payment_journal_id: bank.journal_id,
            })
            .await
            .unwrap();
    }

    let saas = engine
        .reconciler
        .sync_invoice(&invoice("inv_saas", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap();
    assert_eq!(saas.document().journal_id, saas_sales.journal_id);
    assert_eq!(saas.document().family_id, Some(family.family_id));

    let other = engine
        .reconciler
        .sync_invoice(&invoice("inv_basic", "payment_due", vec![line("li_1", "basic-USD-monthly", 1000)]))
        .await
        .unwrap();
    assert_eq!(other.document().journal_id, company_wide.journal_id);
    assert_ne!(other.document().journal_id, sale.journal_id);
}

#[tokio::test]
async fn missing_sale_journal_is_a_configuration_error() {
    let engine = TestEngine::new();

    let err = engine
        .reconciler
        .sync_invoice(&invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap_err();

    assert!(err.is_configuration(), "unexpected error: {}", err);
    assert!(engine.store.list_moves(None).await.unwrap().is_empty());
}

fn credit_note(id: &str, invoice_id: &str, amount: i64) -> RemoteCreditNote {
    serde_json::from_value(json!({
        "id": id,
        "reference_invoice_id": invoice_id,
        "subscription_id": "sub_1",
        "status": "refunded",
        "date": 1_700_200_000,
        "currency_code": "USD",
        "line_items": [line("cl_1", "pro-USD-monthly", amount)],
    }))
    .unwrap()
}

#[tokio::test]
async fn credit_note_is_created_once_and_reverses_its_invoice() {
    let (engine, _, sale, _) = TestEngine::new().with_default_journals().await;
    engine.api.add_item("pro", None);

    let original = engine
        .reconciler
        .sync_invoice(&invoice("inv_1", "paid", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap();
    engine.api.add_credit_note(credit_note("cn_1", "inv_1", 2000));

    let outcomes = engine.reconciler.sync_credit_notes_for_invoice("inv_1").await.unwrap();
    assert_eq!(outcomes.len(), 1);
    let CreditNoteOutcome::Created(document) = &outcomes[0] else {
        panic!("expected a created credit note, got {:?}", outcomes[0]);
    };
    assert_eq!(document.move_type, MoveType::CreditNote);
    assert_eq!(document.state, MoveState::Posted);
    assert_eq!(document.journal_id, sale.journal_id);
    assert_eq!(document.reversed_move_id, Some(original.document().move_id));
    assert_eq!(document.partner_id, original.document().partner_id);
    assert_eq!(document.amount_total, Decimal::new(-2000, 2));

    let again = engine.reconciler.sync_credit_notes_for_invoice("inv_1").await.unwrap();
    assert!(matches!(&again[0], CreditNoteOutcome::AlreadyPresent(m) if m.move_id == document.move_id));
    assert_eq!(
        engine.store.list_moves(Some(MoveType::CreditNote)).await.unwrap().len(),
        1
    );
}
