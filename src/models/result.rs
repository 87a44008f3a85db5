use super::{Assessment, BillSnapshot, ChatTurn, ConversationState, Disposition, Finding};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 一轮对话的返回: 展示给用户的回复 + (可能的) 评估
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub assessment: Option<Assessment>,
    pub state: ConversationState,
}

/// finding 及其处置状态
#[derive(Debug, Clone, Serialize)]
pub struct FindingOutcome {
    pub finding: Finding,
    pub disposition: Disposition,
}

/// 会话结果汇总
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSummary {
    pub session_id: String,
    pub bill_data: BillSnapshot,
    pub snapshot_version: u32,
    pub discrepancies: Vec<Finding>,
    pub outcomes: Vec<FindingOutcome>,
    pub assessment: Option<Assessment>,
    pub state: ConversationState,
    /// 包括潜在多收为 0 的条目
    pub issues_found: usize,
    /// 所有 finding 的潜在多收之和 (不论是否确认)
    pub total_potential_savings: BigDecimal,
    /// 已确认 finding 的潜在多收之和 (无评估时为 None)
    pub confirmed_savings: Option<BigDecimal>,
    /// 展示用总额: 评估给出的总额优先, 否则回退到 total_potential_savings
    pub total_savings: BigDecimal,
    pub chat_history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 争议信中的单个问题
#[derive(Debug, Clone, Serialize)]
pub struct DisputeIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub potential_overcharge: BigDecimal,
}

/// 争议信预览
#[derive(Debug, Clone, Serialize)]
pub struct DisputePreview {
    pub hospital_name: String,
    pub account_number: Option<String>,
    pub draft_letter: String,
    pub issues: Vec<DisputeIssue>,
    pub total_savings: BigDecimal,
}
