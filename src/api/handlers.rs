use crate::error::{AppError, AppResult};
use crate::models::{BillSnapshot, ChatReply, DisputePreview, Finding, ResultsSummary};
use crate::service::BillingService;
use axum::{
    extract::{Json, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 请求体: 会话ID
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// 请求体: 对话消息
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

/// 请求体: 用户确认/编辑后的账单
#[derive(Debug, Deserialize)]
pub struct ConfirmBillRequest {
    pub session_id: String,
    pub bill_data: BillSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub bill_data: BillSnapshot,
}

/// 分析结果响应体
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub discrepancies: Vec<Finding>,
    pub total_savings: BigDecimal,
}

/// 健康检查
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// 上传账单文件 (multipart 字段 `file`)
pub async fn upload_bill(
    State(service): State<Arc<BillingService>>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let (session_id, bill_data) = service.upload_bill(bytes.to_vec(), &mime_type).await?;
        return Ok(Json(UploadResponse {
            session_id,
            bill_data,
        }));
    }
    Err(AppError::InvalidInput("Missing multipart field 'file'".to_string()))
}

/// 提交结构化账单, 新建会话并立即分析
pub async fn analyze_bill(
    State(service): State<Arc<BillingService>>,
    Json(snapshot): Json<BillSnapshot>,
) -> AppResult<Json<AnalysisResponse>> {
    let (session_id, analysis) = service.create_session(snapshot).await?;
    Ok(Json(AnalysisResponse {
        session_id: Some(session_id),
        discrepancies: analysis.findings,
        total_savings: analysis.total_potential_savings,
    }))
}

/// 用户确认账单后重新分析
pub async fn confirm_bill(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<ConfirmBillRequest>,
) -> AppResult<Json<AnalysisResponse>> {
    let analysis = service.confirm_bill(&req.session_id, req.bill_data).await?;
    Ok(Json(AnalysisResponse {
        session_id: None,
        discrepancies: analysis.findings,
        total_savings: analysis.total_potential_savings,
    }))
}

/// 开始对话
pub async fn start_chat(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<SessionRequest>,
) -> AppResult<Json<ChatReply>> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::InvalidInput("session_id is required".to_string()));
    }
    Ok(Json(service.start_conversation(&req.session_id).await?))
}

/// 继续对话
pub async fn chat(
    State(service): State<Arc<BillingService>>,
    Json(msg): Json<ChatMessage>,
) -> AppResult<Json<ChatReply>> {
    Ok(Json(
        service
            .continue_conversation(&msg.session_id, &msg.message)
            .await?,
    ))
}

/// 查询会话结果
pub async fn get_results(
    State(service): State<Arc<BillingService>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<ResultsSummary>> {
    Ok(Json(service.get_results(&session_id).await?))
}

/// 导出 finding CSV
pub async fn export_results(
    State(service): State<Arc<BillingService>>,
    Path(session_id): Path<String>,
) -> AppResult<Response> {
    let csv = service.export_findings(&session_id).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}-findings.csv\"", session_id),
            ),
        ],
        csv,
    )
        .into_response())
}

/// 争议信预览
pub async fn dispute_preview(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<SessionRequest>,
) -> AppResult<Json<DisputePreview>> {
    Ok(Json(service.dispute_preview(&req.session_id).await?))
}

/// 删除会话
pub async fn delete_session(
    State(service): State<Arc<BillingService>>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    service.delete_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
