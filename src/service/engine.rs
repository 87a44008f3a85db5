use super::reference::ReferencePriceTable;
use super::rules;
use crate::models::{BillSnapshot, Finding};
use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;
use std::sync::Arc;

/// 一次分析的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub findings: Vec<Finding>,
    pub total_potential_savings: BigDecimal,
}

/// 差异分析引擎
///
/// 对同一快照重复分析结果完全一致 (无随机, 无外部调用)。
#[derive(Debug, Clone)]
pub struct DiscrepancyEngine {
    reference: Arc<ReferencePriceTable>,
}

impl DiscrepancyEngine {
    pub fn new(reference: Arc<ReferencePriceTable>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &ReferencePriceTable {
        &self.reference
    }

    /// 运行四条规则, 合并结果并统一编号
    pub fn analyze(&self, snapshot: &BillSnapshot) -> Analysis {
        let table = self.reference.as_ref();

        // 规则之间无共享状态, 并行执行; 合并顺序固定
        let ((duplicates, inflation), (quantity, arithmetic)) = rayon::join(
            || {
                rayon::join(
                    || rules::detect_duplicates(snapshot),
                    || rules::detect_price_inflation(snapshot, table),
                )
            },
            || {
                rayon::join(
                    || rules::detect_quantity_anomalies(snapshot),
                    || rules::check_arithmetic(snapshot),
                )
            },
        );

        tracing::debug!(
            "规则结果: duplicate={}, price={}, quantity={}, arithmetic={}",
            duplicates.len(),
            inflation.len(),
            quantity.len(),
            arithmetic.len()
        );

        let findings: Vec<Finding> = duplicates
            .into_iter()
            .chain(inflation)
            .chain(quantity)
            .chain(arithmetic)
            .enumerate()
            .map(|(id, finding)| Finding { id, ..finding })
            .collect();

        let total_potential_savings = total_overcharge(&findings);

        tracing::info!(
            "Analyzed {} line items: {} findings, potential savings ${}",
            snapshot.line_items.len(),
            findings.len(),
            rules::fmt_money(&total_potential_savings)
        );

        Analysis {
            findings,
            total_potential_savings,
        }
    }
}

/// 潜在多收金额之和 (0 金额的条目同样参与, 只是贡献为 0)
pub fn total_overcharge<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> BigDecimal {
    findings
        .into_iter()
        .fold(BigDecimal::zero(), |acc, f| acc + &f.potential_overcharge)
}
