mod common;

use billing_sync_service::error::SyncError;
use billing_sync_service::models::remote::{CustomerDraft, ItemDraft};
use billing_sync_service::services::{BillingApi, BillingClient};
use common::test_config;
use serde_json::json;
use wiremock::matchers::{
    body_string_contains, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer, page_size: u32) -> BillingClient {
    let mut config = test_config(&server.uri(), false).remote;
    config.page_size = page_size;
    BillingClient::new(reqwest::Client::new(), &config).unwrap()
}

#[tokio::test]
async fn list_follows_next_offset_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("offset"))
        .and(header("authorization", "Basic dGVzdF9rZXk6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [
                {"customer": {"id": "cus_1", "first_name": "Ada"}},
                {"customer": {"id": "cus_2", "first_name": "Grace"}}
            ],
            "next_offset": "[\"cus_2\"]"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("offset", "[\"cus_2\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"customer": {"id": "cus_3", "company": "Analytical Engines"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let customers = client_for(&server, 2).await.list_customers().await.unwrap();

    let ids: Vec<&str> = customers.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["cus_1", "cus_2", "cus_3"]);
    assert_eq!(customers[2].display_name().as_deref(), Some("Analytical Engines"));
}

#[tokio::test]
async fn filtered_lists_send_the_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/credit_notes"))
        .and(query_param("reference_invoice_id[is]", "inv_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"credit_note": {"id": "cn_1", "reference_invoice_id": "inv_9"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notes = client_for(&server, 100)
        .await
        .list_credit_notes_for_invoice("inv_9")
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, "cn_1");
}

#[tokio::test]
async fn api_errors_keep_status_and_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices/inv_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Sorry, we couldn't find that resource",
            "type": "invalid_request",
            "api_error_code": "resource_not_found",
            "error_code": "referenced_resource_not_found",
            "http_status_code": 404
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, 100)
        .await
        .retrieve_invoice("inv_missing")
        .await
        .unwrap_err();

    match err {
        SyncError::RemoteApi {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 404);
            assert_eq!(code, "resource_not_found");
            assert!(message.contains("couldn't find"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn non_json_error_bodies_are_kept_as_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server, 100)
        .await
        .test_connection()
        .await
        .unwrap_err();

    assert!(
        matches!(&err, SyncError::RemoteApi { status: 503, code, message } if code == "unknown" && message == "upstream unavailable"),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn retrieve_unwraps_the_named_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item_prices/pro-USD-monthly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item_price": {"id": "pro-USD-monthly", "item_id": "pro", "price": 4900}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items/pro"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": {}})))
        .mount(&server)
        .await;

    let client = client_for(&server, 100).await;
    let price = client.retrieve_item_price("pro-USD-monthly").await.unwrap();
    assert_eq!(price.item_id.as_deref(), Some("pro"));
    assert_eq!(price.price, Some(4900));

    let err = client.retrieve_item("pro").await.unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedData(_)));
}

#[tokio::test]
async fn customer_creation_posts_a_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("authorization", "Basic dGVzdF9rZXk6"))
        .and(body_string_contains("id=erp_1"))
        .and(body_string_contains("email=ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "customer": {"id": "erp_1", "first_name": "Ada", "email": "ada@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client_for(&server, 100)
        .await
        .create_customer(&CustomerDraft {
            id: "erp_1".to_string(),
            first_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            company: None,
            phone: None,
        })
        .await
        .unwrap();

    assert_eq!(created.id, "erp_1");
    assert_eq!(created.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn item_creation_sends_type_and_family() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_string_contains("type=plan"))
        .and(body_string_contains("item_family_id=pro-family"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": {"id": "pro", "name": "Pro", "type": "plan", "item_family_id": "pro-family"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let item = client_for(&server, 100)
        .await
        .create_item(&ItemDraft {
            id: "pro".to_string(),
            name: "Pro".to_string(),
            description: None,
            item_type: "plan".to_string(),
            item_family_id: "pro-family".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(item.item_family_id.as_deref(), Some("pro-family"));
}

#[tokio::test]
async fn plan_change_and_cancel_target_the_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subscriptions/sub_1/update_for_items"))
        .and(body_string_contains("pro-USD-monthly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscription": {
                "id": "sub_1",
                "status": "active",
                "subscription_items": [{"item_price_id": "pro-USD-monthly", "item_type": "plan"}]
            },
            "customer": {"id": "cus_1"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/subscriptions/sub_1/cancel_for_items"))
        .and(body_string_contains("end_of_term=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscription": {"id": "sub_1", "status": "non_renewing"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 100).await;
    let updated = client
        .update_subscription_plan("sub_1", "pro-USD-monthly")
        .await
        .unwrap();
    let cancelled = client.cancel_subscription("sub_1").await.unwrap();

    assert_eq!(updated.plan_item_price_id(), Some("pro-USD-monthly"));
    assert_eq!(cancelled.status.as_deref(), Some("non_renewing"));
}

#[tokio::test]
async fn rejected_write_surfaces_the_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subscriptions/sub_x/cancel_for_items"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Sorry, we couldn't find that resource",
            "api_error_code": "resource_not_found",
            "http_status_code": 404
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, 100)
        .await
        .cancel_subscription("sub_x")
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{}", err);
    assert!(matches!(err, SyncError::RemoteApi { ref code, .. } if code == "resource_not_found"));
}
