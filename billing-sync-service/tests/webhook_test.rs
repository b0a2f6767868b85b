mod common;

use billing_sync_service::models::{LogContext, MoveState, MoveType, SyncStatus};
use billing_sync_service::services::LedgerStore;
use billing_sync_service::sync::{
    EventKind, InvoiceOutcome, SyncSettings, WebhookEvent, WebhookOutcome,
};
use common::{
    invoice, invoice_json, line, linked_payment, seed_default_journals, test_settings, TestApp,
    TestEngine, WEBHOOK_PASSWORD, WEBHOOK_USER,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::MockServer;

fn event(event_type: &str, invoice: Value) -> WebhookEvent {
    serde_json::from_value(envelope(event_type, invoice)).unwrap()
}

fn envelope(event_type: &str, invoice: Value) -> Value {
    json!({
        "id": "ev_1",
        "event_type": event_type,
        "content": { "invoice": invoice }
    })
}

fn invoice_value(id: &str, status: &str) -> Value {
    serde_json::to_value(invoice(id, status, vec![line("li_1", "pro-USD-monthly", 5000)])).unwrap()
}

#[tokio::test]
async fn invoice_generated_creates_posted_invoice_and_logs_once() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;

    let outcome = engine
        .reconciler
        .handle_webhook(event("invoice_generated", invoice_value("inv_1", "payment_due")))
        .await
        .unwrap();

    let WebhookOutcome::Processed { kind, outcome, .. } = outcome else {
        panic!("event should be processed");
    };
    assert_eq!(kind, EventKind::InvoiceGenerated);
    assert!(matches!(outcome, InvoiceOutcome::Created(_)));
    assert_eq!(outcome.document().state, MoveState::Posted);

    let logs = engine
        .store
        .list_sync_logs(Some(LogContext::Webhook))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Success);
    assert_eq!(logs[0].record_count, 1);
    assert_eq!(logs[0].table_name, "Webhook invoice_generated");
}

#[tokio::test]
async fn events_outside_subscriptions_are_ignored_without_a_log() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    let mut one_off = invoice_value("inv_1", "paid");
    one_off["subscription_id"] = Value::Null;

    for event in [
        event("invoice_generated", one_off),
        event("customer_created", invoice_value("inv_2", "paid")),
        serde_json::from_value(json!({"event_type": "invoice_updated"})).unwrap(),
    ] {
        let outcome = engine.reconciler.handle_webhook(event).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
    }

    assert!(engine.store.list_moves(None).await.unwrap().is_empty());
    assert!(engine.store.list_sync_logs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn invoice_updated_refreshes_without_registering_payments() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    let paid = serde_json::to_value(invoice_json(
        "inv_1",
        "paid",
        vec![line("li_1", "pro-USD-monthly", 5000)],
        json!([linked_payment("txn_a", 5000)]),
    ))
    .unwrap();

    let outcome = engine
        .reconciler
        .handle_webhook(event("invoice_updated", paid))
        .await
        .unwrap();

    let WebhookOutcome::Processed { payments, outcome, .. } = outcome else {
        panic!("event should be processed");
    };
    assert_eq!(payments, 0);
    assert!(engine
        .store
        .payments_for_move(outcome.document().move_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn payment_ahead_of_its_invoice_creates_and_pays_it() {
    let (engine, _, _, bank) = TestEngine::new().with_default_journals().await;
    let payload = json!({
        "event_type": "payment_succeeded",
        "content": {
            "invoice": invoice_value("inv_race", "paid"),
            "transaction": {"id": "txn_1", "amount": 5000, "date": 1_700_100_000, "status": "success"}
        }
    });

    let outcome = engine
        .reconciler
        .handle_webhook(serde_json::from_value(payload).unwrap())
        .await
        .unwrap();

    let WebhookOutcome::Processed { payments, .. } = outcome else {
        panic!("event should be processed");
    };
    assert_eq!(payments, 1);

    let document = engine
        .store
        .list_moves(Some(MoveType::Invoice))
        .await
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(document.remote_id, "inv_race");
    assert_eq!(document.state, MoveState::Posted);
    assert_eq!(document.amount_residual, Decimal::ZERO);
    let recorded = engine.store.payments_for_move(document.move_id).await.unwrap();
    assert_eq!(recorded[0].remote_txn_id.as_deref(), Some("txn_1"));
    assert_eq!(recorded[0].journal_id, bank.journal_id);
}

#[tokio::test]
async fn payment_waiting_on_a_concurrent_invoice_event_reuses_it() {
    let (engine, _, _, _) = TestEngine::with_settings(SyncSettings {
        race_retry_delay: Duration::from_millis(200),
        ..test_settings()
    })
    .with_default_journals()
    .await;
    let payment: WebhookEvent = serde_json::from_value(json!({
        "event_type": "payment_succeeded",
        "content": {
            "invoice": invoice_value("inv_race", "paid"),
            "transaction": {"id": "txn_1", "amount": 5000, "date": 1_700_100_000, "status": "success"}
        }
    }))
    .unwrap();

    // The payment misses the invoice, then finds it after the retry delay.
    let (paid, generated) = tokio::join!(engine.reconciler.handle_webhook(payment), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine
            .reconciler
            .handle_webhook(event("invoice_generated", invoice_value("inv_race", "payment_due")))
            .await
    });

    let WebhookOutcome::Processed { outcome: created, .. } = generated.unwrap() else {
        panic!("invoice event should be processed");
    };
    assert!(matches!(created, InvoiceOutcome::Created(_)));
    let WebhookOutcome::Processed { outcome, payments, .. } = paid.unwrap() else {
        panic!("payment event should be processed");
    };
    assert!(matches!(outcome, InvoiceOutcome::Unchanged(_)));
    assert_eq!(payments, 1);

    let invoices = engine.store.list_moves(Some(MoveType::Invoice)).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].move_id, created.document().move_id);
    let recorded = engine.store.payments_for_move(invoices[0].move_id).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].remote_txn_id.as_deref(), Some("txn_1"));
}

#[tokio::test]
async fn payment_for_existing_invoice_leaves_it_unchanged() {
    let (engine, _, _, _) = TestEngine::new().with_default_journals().await;
    let created = engine
        .reconciler
        .sync_invoice(&invoice("inv_1", "payment_due", vec![line("li_1", "pro-USD-monthly", 5000)]))
        .await
        .unwrap();

    let payload = json!({
        "event_type": "payment_succeeded",
        "content": {
            "invoice": invoice_value("inv_1", "paid"),
            "transaction": {"id": "txn_1", "amount": 2000}
        }
    });
    let outcome = engine
        .reconciler
        .handle_webhook(serde_json::from_value(payload).unwrap())
        .await
        .unwrap();

    let WebhookOutcome::Processed { outcome, payments, .. } = outcome else {
        panic!("event should be processed");
    };
    assert!(matches!(outcome, InvoiceOutcome::Unchanged(_)));
    assert_eq!(payments, 1);
    let document = engine
        .store
        .find_move("inv_1", created.document().company_id, MoveType::Invoice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.amount_residual, Decimal::new(3000, 2));
}

#[tokio::test]
async fn failed_event_is_logged_as_failure() {
    let engine = TestEngine::new();

    let result = engine
        .reconciler
        .handle_webhook(event("invoice_generated", invoice_value("inv_1", "payment_due")))
        .await;

    assert!(result.is_err());
    let logs = engine.store.list_sync_logs(None).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Failure);
    assert_eq!(logs[0].context, LogContext::Webhook);
    assert!(logs[0].error_message.is_some());
}

#[tokio::test]
async fn webhook_endpoint_rejects_wrong_credentials() {
    let remote = MockServer::start().await;
    let app = TestApp::spawn(&remote.uri(), true).await;
    let body = envelope("invoice_generated", invoice_value("inv_1", "payment_due"));

    let missing = app.post_webhook(&body, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app.post_webhook(&body, Some((WEBHOOK_USER, "nope"))).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(app.store.list_moves(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn webhook_endpoint_processes_authenticated_events() {
    let remote = MockServer::start().await;
    let app = TestApp::spawn(&remote.uri(), true).await;
    seed_default_journals(app.store.clone()).await;

    let response = app
        .post_webhook(
            &envelope("invoice_generated", invoice_value("inv_1", "payment_due")),
            Some((WEBHOOK_USER, WEBHOOK_PASSWORD)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().is_empty());
    let moves = app.store.list_moves(Some(MoveType::Invoice)).await.unwrap();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].remote_id, "inv_1");
}

#[tokio::test]
async fn webhook_endpoint_acknowledges_failures_and_garbage() {
    let remote = MockServer::start().await;
    let app = TestApp::spawn(&remote.uri(), false).await;

    let garbage = app
        .client
        .post(format!("{}/webhooks/billing", app.address))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::OK);

    // No journals exist, so processing fails but the platform still sees 200.
    let failing = app
        .post_webhook(
            &envelope("invoice_generated", invoice_value("inv_1", "payment_due")),
            None,
        )
        .await;
    assert_eq!(failing.status(), StatusCode::OK);

    let logs = app.store.list_sync_logs(Some(LogContext::Webhook)).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Failure);
}
