use bigdecimal::BigDecimal;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// 对话核对后的评估结果
///
/// `confirmed` / `cleared` 保存的是本会话 finding 的 id, 保序去重;
/// `new_concerns` 是患者提出、规则未检测到的问题 (自由文本)。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_complete: bool,
    pub confirmed: IndexSet<usize>,
    pub cleared: IndexSet<usize>,
    pub new_concerns: Vec<String>,
    /// 对话服务自行给出的争议总额
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_total: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// 单条 finding 的处置状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Confirmed,
    Cleared,
    Pending,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Confirmed => "confirmed",
            Disposition::Cleared => "cleared",
            Disposition::Pending => "pending",
        }
    }
}

impl Assessment {
    pub fn disposition(&self, finding_id: usize) -> Disposition {
        if self.confirmed.contains(&finding_id) {
            Disposition::Confirmed
        } else if self.cleared.contains(&finding_id) {
            Disposition::Cleared
        } else {
            Disposition::Pending
        }
    }
}
