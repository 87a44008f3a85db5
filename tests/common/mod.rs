#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use medbill_analyzer::error::CollaboratorError;
use medbill_analyzer::models::BillSnapshot;
use medbill_analyzer::service::collaborator::{ConversationContext, DisputeLetterRequest};
use medbill_analyzer::service::{BillExtractor, ConversationAgent};
use medbill_analyzer::{api, BillingService, DiscrepancyEngine, InMemorySessionStore, ReferencePriceTable};
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// 消息里带 DONE 时返回完整评估, 否则追问
pub struct FakeAgent;

pub const COMPLETION_REPLY: &str = "Thanks, that's everything I need.\n```json\n{\"assessment_complete\": true, \"confirmed_discrepancies\": [0], \"cleared_items\": [], \"new_concerns\": [\"Never received the X-ray\"], \"total_disputed_amount\": 30.00}\n```";

#[async_trait]
impl ConversationAgent for FakeAgent {
    async fn reply(&self, context: &ConversationContext<'_>) -> Result<String, CollaboratorError> {
        if context.message.contains("DONE") {
            Ok(COMPLETION_REPLY.to_string())
        } else {
            Ok(format!("You said: {}. Anything else?", context.message))
        }
    }

    async fn draft_dispute_letter(
        &self,
        request: &DisputeLetterRequest<'_>,
    ) -> Result<String, CollaboratorError> {
        Ok(format!(
            "Dear Billing Department, I dispute {} charges.",
            request.discrepancies.len()
        ))
    }
}

/// 回显消息前先挂起一段时间, 记录同时在途的调用数
#[derive(Default)]
pub struct SlowEchoAgent {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

#[async_trait]
impl ConversationAgent for SlowEchoAgent {
    async fn reply(&self, context: &ConversationContext<'_>) -> Result<String, CollaboratorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("You said: {}. Anything else?", context.message))
    }

    async fn draft_dispute_letter(
        &self,
        _request: &DisputeLetterRequest<'_>,
    ) -> Result<String, CollaboratorError> {
        Ok("Dear Billing Department,".to_string())
    }
}

/// 返回固定快照的提取服务
pub struct FakeExtractor(pub BillSnapshot);

#[async_trait]
impl BillExtractor for FakeExtractor {
    async fn extract(&self, _bytes: Vec<u8>, _mime_type: &str) -> Result<BillSnapshot, CollaboratorError> {
        Ok(self.0.clone())
    }
}

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

/// JSON 中的金额 (字符串或数字)
pub fn money(value: &Value) -> BigDecimal {
    match value {
        Value::String(s) => dec(s),
        Value::Number(n) => dec(&n.to_string()),
        other => panic!("not a money value: {}", other),
    }
}

pub fn reference_table() -> ReferencePriceTable {
    ReferencePriceTable::new()
        .with_band("99284", dec("300"), dec("450"))
        .with_band("85025", dec("20"), dec("40"))
}

pub fn service_with(
    extractor: Arc<dyn BillExtractor>,
    agent: Arc<dyn ConversationAgent>,
) -> Arc<BillingService> {
    Arc::new(BillingService::new(
        DiscrepancyEngine::new(Arc::new(reference_table())),
        Arc::new(InMemorySessionStore::new()),
        extractor,
        agent,
        Duration::from_secs(5),
    ))
}

pub fn service() -> Arc<BillingService> {
    service_with(
        Arc::new(FakeExtractor(BillSnapshot::default())),
        Arc::new(FakeAgent),
    )
}

pub fn app(service: Arc<BillingService>) -> Router {
    api::router(service)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
