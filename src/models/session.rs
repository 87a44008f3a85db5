use super::{Assessment, BillSnapshot, Finding};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// 对话记录中的一轮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// 对话核对状态机: gathering -> complete (终态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    #[default]
    Gathering,
    Complete,
}

/// 会话: 一份账单快照 + 分析结果 + 对话记录 + 最新评估
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub snapshot: BillSnapshot,
    /// 0 = 仅提取未分析, 每次 (重新) 分析 +1
    pub snapshot_version: u32,
    pub findings: Vec<Finding>,
    pub total_potential_savings: BigDecimal,
    pub transcript: Vec<ChatTurn>,
    pub assessment: Option<Assessment>,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, snapshot: BillSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            snapshot,
            snapshot_version: 0,
            findings: Vec::new(),
            total_potential_savings: BigDecimal::zero(),
            transcript: Vec::new(),
            assessment: None,
            state: ConversationState::Gathering,
            created_at: now,
            updated_at: now,
        }
    }

    /// 用新快照及其分析结果整体替换旧数据; 对话记录和评估一并清空
    pub fn replace_analysis(
        &mut self,
        snapshot: BillSnapshot,
        findings: Vec<Finding>,
        total_potential_savings: BigDecimal,
    ) {
        self.snapshot = snapshot;
        self.snapshot_version += 1;
        self.findings = findings;
        self.total_potential_savings = total_potential_savings;
        self.transcript.clear();
        self.assessment = None;
        self.state = ConversationState::Gathering;
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.state == ConversationState::Complete
    }
}
