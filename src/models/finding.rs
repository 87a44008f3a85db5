use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 差异类型 (闭集)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    DuplicateCharge,
    PriceInflation,
    QuantityAnomaly,
    MathError,
}

impl DiscrepancyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::DuplicateCharge => "duplicate_charge",
            DiscrepancyType::PriceInflation => "price_inflation",
            DiscrepancyType::QuantityAnomaly => "quantity_anomaly",
            DiscrepancyType::MathError => "math_error",
        }
    }
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// 规则置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        })
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

/// 参考价格区间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub avg_price: BigDecimal,
    pub high_price: BigDecimal,
}

/// 一条疑似计费问题。生成后不可变, 对话核对只标注处置状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// 在本次分析结果中的位置, 对话服务用它引用该条目
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: DiscrepancyType,
    pub severity: Severity,
    pub confidence: Confidence,
    pub description: String,
    pub items_involved: Vec<usize>,
    pub potential_overcharge: BigDecimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<PriceBand>,
}
