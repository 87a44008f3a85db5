mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use medbill_analyzer::models::{BillSnapshot, LineItem, Role};
use medbill_analyzer::service::UnavailableCollaborator;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn inflated_bill() -> Value {
    json!({
        "provider_name": "General Hospital",
        "account_number": "ACC-123",
        "line_items": [
            {"code": "99284", "description": "ER visit level 4", "quantity": 1, "unit_charge": 500, "total_charge": 500}
        ]
    })
}

async fn create_session(app: &axum::Router, bill: Value) -> (String, Value) {
    let (status, body) = send(app, post_json("/analyze", bill)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    (body["session_id"].as_str().unwrap().to_string(), body)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(service());
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn inflated_er_visit_end_to_end() {
    let app = app(service());
    let (_, body) = create_session(&app, inflated_bill()).await;

    let findings = body["discrepancies"].as_array().unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0]["type"], "price_inflation");
    assert_eq!(findings[0]["severity"], "medium");
    assert_eq!(findings[0]["confidence"], "medium");
    assert_eq!(findings[0]["items_involved"], json!([0]));
    assert_eq!(money(&findings[0]["potential_overcharge"]), dec("50.00"));
    assert_eq!(money(&body["total_savings"]), dec("50.00"));
}

#[tokio::test]
async fn empty_bill_has_no_findings() {
    let app = app(service());
    let (_, body) = create_session(&app, json!({"total_billed": 100})).await;
    assert_eq!(body["discrepancies"], json!([]));
    assert_eq!(money(&body["total_savings"]), dec("0"));
}

#[tokio::test]
async fn malformed_line_items_do_not_reject_the_bill() {
    let app = app(service());
    let (_, body) = create_session(&app, json!({"total_billed": 100, "line_items": "none"})).await;
    assert_eq!(body["discrepancies"], json!([]));

    let (_, body) = create_session(
        &app,
        json!({"line_items": [null, {"code": "99284", "description": "ER visit", "total_charge": 500}]}),
    )
    .await;
    let findings = body["discrepancies"].as_array().unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0]["items_involved"], json!([0]));
}

#[tokio::test]
async fn conversation_reaches_complete_and_stays_there() {
    let app = app(service());
    let (id, _) = create_session(&app, inflated_bill()).await;

    let (status, opening) = send(&app, post_json("/chat/start", json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opening["state"], "gathering");
    assert!(opening["assessment"].is_null());

    let (_, reply) = send(
        &app,
        post_json("/chat", json!({"session_id": id, "message": "I was there 2 hours"})),
    )
    .await;
    assert_eq!(reply["message"], "You said: I was there 2 hours. Anything else?");

    let (_, done) = send(
        &app,
        post_json("/chat", json!({"session_id": id, "message": "DONE, that's all"})),
    )
    .await;
    assert_eq!(done["message"], "Thanks, that's everything I need.");
    assert_eq!(done["state"], "complete");
    assert_eq!(done["assessment"]["assessment_complete"], true);
    assert_eq!(done["assessment"]["confirmed"], json!([0]));
    assert_eq!(done["assessment"]["new_concerns"], json!(["Never received the X-ray"]));

    // 终态之后的消息不改变评估
    let (status, after) = send(
        &app,
        post_json("/chat", json!({"session_id": id, "message": "actually, one more"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["assessment"], done["assessment"]);
    assert_eq!(after["state"], "complete");

    let (status, results) = send(&app, get(&format!("/results/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["issues_found"], 1);
    assert_eq!(money(&results["total_potential_savings"]), dec("50.00"));
    assert_eq!(money(&results["confirmed_savings"]), dec("50.00"));
    assert_eq!(money(&results["total_savings"]), dec("30.00"));
    assert_eq!(results["outcomes"][0]["disposition"], "confirmed");
    // 开场 (模型) + 两轮问答
    assert_eq!(results["chat_history"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app(service());

    let (status, body) = send(&app, get("/results/session-404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["retryable"], false);

    let (status, _) = send(&app, post_json("/chat", json!({"session_id": "nope", "message": "hi"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json("/confirm-bill", json!({"session_id": "nope", "bill_data": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_json("/chat/start", json!({"session_id": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirm_bill_replaces_findings_and_resets_conversation() {
    let app = app(service());
    let (id, _) = create_session(&app, inflated_bill()).await;
    send(&app, post_json("/chat/start", json!({"session_id": id}))).await;
    send(&app, post_json("/chat", json!({"session_id": id, "message": "DONE"}))).await;

    let edited = json!({
        "total_billed": 100.00,
        "line_items": [
            {"code": "99284", "description": "ER visit level 4", "quantity": 1, "total_charge": 400},
            {"description": "Tylenol", "quantity": 8, "total_charge": 16}
        ]
    });
    let (status, body) = send(
        &app,
        post_json("/confirm-bill", json!({"session_id": id, "bill_data": edited})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<_> = body["discrepancies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["quantity_anomaly", "math_error"]);
    assert_eq!(money(&body["total_savings"]), dec("0"));

    let (_, results) = send(&app, get(&format!("/results/{}", id))).await;
    assert_eq!(results["snapshot_version"], 2);
    assert!(results["assessment"].is_null());
    assert_eq!(results["state"], "gathering");
    assert_eq!(results["chat_history"], json!([]));
    assert_eq!(money(&results["bill_data"]["line_items"][0]["expected_charge"]), dec("300"));
}

#[tokio::test]
async fn unavailable_collaborator_is_retryable_and_harmless() {
    let service = service_with(
        Arc::new(UnavailableCollaborator),
        Arc::new(UnavailableCollaborator),
    );
    let app = app(service);
    let (id, _) = create_session(&app, inflated_bill()).await;

    let (status, body) = send(&app, post_json("/chat/start", json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);

    let (_, results) = send(&app, get(&format!("/results/{}", id))).await;
    assert_eq!(results["chat_history"], json!([]));
    assert!(results["assessment"].is_null());

    // 信件生成失败时降级为固定提示
    let (status, preview) = send(&app, post_json("/dispute/preview", json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        preview["draft_letter"],
        "Error generating dispute letter. Please try again."
    );
    assert_eq!(preview["hospital_name"], "General Hospital");
}

#[tokio::test]
async fn dispute_preview_lists_issues() {
    let app = app(service());
    let (id, _) = create_session(&app, inflated_bill()).await;
    send(&app, post_json("/chat", json!({"session_id": id, "message": "DONE"}))).await;

    let (status, preview) = send(&app, post_json("/dispute/preview", json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["draft_letter"], "Dear Billing Department, I dispute 1 charges.");
    assert_eq!(preview["account_number"], "ACC-123");
    let issues = preview["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[1]["type"], "patient_reported");
    assert_eq!(money(&preview["total_savings"]), dec("30.00"));
}

fn multipart_request(content_type: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "medbill-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"bill\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload-bill")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_creates_unanalysed_session() {
    let extracted = BillSnapshot::with_items(vec![
        LineItem::new("CBC Panel", 1, dec("45")).with_code("85025"),
        LineItem::new("CBC Panel", 1, dec("45")).with_code("85025"),
    ]);
    let service = service_with(Arc::new(FakeExtractor(extracted)), Arc::new(FakeAgent));
    let app = app(service);

    let (status, body) = send(&app, multipart_request("image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["bill_data"]["line_items"].as_array().unwrap().len(), 2);
    assert_eq!(money(&body["bill_data"]["line_items"][0]["expected_charge"]), dec("20"));

    // 确认之前没有 finding
    let (_, results) = send(&app, get(&format!("/results/{}", id))).await;
    assert_eq!(results["snapshot_version"], 0);
    assert_eq!(results["issues_found"], 0);

    let bill = body["bill_data"].clone();
    let (_, confirmed) = send(
        &app,
        post_json("/confirm-bill", json!({"session_id": id, "bill_data": bill})),
    )
    .await;
    let kinds: Vec<_> = confirmed["discrepancies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["duplicate_charge", "price_inflation", "price_inflation"]);
}

#[tokio::test]
async fn upload_rejects_unsupported_types() {
    let app = app(service());
    let (status, body) = send(&app, multipart_request("text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn export_and_delete() {
    let app = app(service());
    let (id, _) = create_session(&app, inflated_bill()).await;

    let (status, csv) = send(&app, get(&format!("/results/{}/export", id))).await;
    assert_eq!(status, StatusCode::OK);
    let csv = csv.as_str().unwrap().to_string();
    assert!(csv.starts_with("id,type,severity,confidence"));
    assert!(csv.contains("price_inflation,medium,medium,0,50.00,300.00,450.00,pending"));

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/sessions/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/results/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_messages_on_one_session_are_serialised() {
    let agent = Arc::new(SlowEchoAgent::default());
    let service = service_with(
        Arc::new(FakeExtractor(BillSnapshot::default())),
        agent.clone(),
    );
    let snapshot = BillSnapshot::with_items(vec![
        LineItem::new("ER visit level 4", 1, dec("500")).with_code("99284"),
    ]);
    let (id, _) = service.create_session(snapshot).await.unwrap();
    let (other, _) = service.create_session(BillSnapshot::default()).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            let id = id.clone();
            tokio::spawn(async move {
                service
                    .continue_conversation(&id, &format!("message {}", i))
                    .await
            })
        })
        .collect();
    let replies = futures::future::join_all(tasks).await;
    assert!(replies.into_iter().all(|r| r.unwrap().is_ok()));

    // 同一会话的外部调用从不重叠
    assert_eq!(agent.max_in_flight.load(Ordering::SeqCst), 1);

    let results = service.get_results(&id).await.unwrap();
    assert_eq!(results.chat_history.len(), 16);
    for pair in results.chat_history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Model);
        assert_eq!(
            pair[1].content,
            format!("You said: {}. Anything else?", pair[0].content)
        );
    }

    // 不同会话不受影响
    let untouched = service.get_results(&other).await.unwrap();
    assert!(untouched.chat_history.is_empty());
}
