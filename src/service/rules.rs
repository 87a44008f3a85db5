//! 四条独立的检测规则
//!
//! 每条规则都是快照上的纯函数, 互不共享状态。同一规则内的结果保持明细顺序;
//! `id` 由引擎在合并后统一编号, 这里先填 0。

use super::reference::ReferencePriceTable;
use crate::models::coerce::round_cents;
use crate::models::{BillSnapshot, Confidence, DiscrepancyType, Finding, Severity};
use bigdecimal::{BigDecimal, Signed, Zero};
use std::collections::HashMap;

/// 数量超过该值视为异常
pub const QUANTITY_THRESHOLD: u32 = 5;

/// 超过参考高价的该倍数为高严重度
fn severe_inflation_factor() -> BigDecimal {
    BigDecimal::new(15.into(), 1)
}

/// 明细合计与账单总额的容差
fn materiality_threshold() -> BigDecimal {
    BigDecimal::from(1)
}

pub(crate) fn fmt_money(amount: &BigDecimal) -> String {
    round_cents(amount).with_scale(2).to_string()
}

/// 重复收费: (编码, 规范化描述, 服务日期) 相同
///
/// 空描述不豁免, 同样参与比较。
pub fn detect_duplicates(snapshot: &BillSnapshot) -> Vec<Finding> {
    let mut seen: HashMap<(Option<&str>, String, Option<&str>), usize> = HashMap::new();
    let mut findings = Vec::new();

    for (idx, item) in snapshot.line_items.iter().enumerate() {
        let key = (
            item.code.as_deref(),
            item.description.trim().to_lowercase(),
            item.date_of_service.as_deref(),
        );
        match seen.get(&key) {
            Some(&first) => findings.push(Finding {
                id: 0,
                kind: DiscrepancyType::DuplicateCharge,
                severity: Severity::High,
                confidence: Confidence::High,
                description: format!(
                    "Duplicate charge detected: '{}' appears multiple times on {}",
                    item.description,
                    item.date_of_service.as_deref().unwrap_or("same date")
                ),
                items_involved: vec![first, idx],
                potential_overcharge: item.total_charge.clone(),
                reference: None,
            }),
            None => {
                seen.insert(key, idx);
            }
        }
    }

    findings
}

/// 价格虚高: 与参考高价比较, 无参考数据的明细直接跳过
pub fn detect_price_inflation(snapshot: &BillSnapshot, table: &ReferencePriceTable) -> Vec<Finding> {
    let factor = severe_inflation_factor();
    let mut findings = Vec::new();

    for (idx, item) in snapshot.line_items.iter().enumerate() {
        let Some(band) = item.code.as_deref().and_then(|code| table.get(code)) else {
            continue;
        };
        let charge = &item.total_charge;
        if charge.is_zero() {
            continue;
        }

        let high = &band.high_price;
        let (severity, description) = if *charge > high * &factor {
            (
                Severity::High,
                format!(
                    "'{}' charged at ${}, well above typical range (${}-${})",
                    item.description,
                    fmt_money(charge),
                    fmt_money(&band.avg_price),
                    fmt_money(high)
                ),
            )
        } else if charge > high {
            (
                Severity::Medium,
                format!(
                    "'{}' charged at ${}, above typical high of ${}",
                    item.description,
                    fmt_money(charge),
                    fmt_money(high)
                ),
            )
        } else {
            continue;
        };

        findings.push(Finding {
            id: 0,
            kind: DiscrepancyType::PriceInflation,
            severity,
            confidence: Confidence::Medium,
            description,
            items_involved: vec![idx],
            potential_overcharge: round_cents(&(charge - high)),
            reference: Some(band.clone()),
        });
    }

    findings
}

/// 数量异常: 只提示, 不量化金额
pub fn detect_quantity_anomalies(snapshot: &BillSnapshot) -> Vec<Finding> {
    snapshot
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.quantity > QUANTITY_THRESHOLD)
        .map(|(idx, item)| Finding {
            id: 0,
            kind: DiscrepancyType::QuantityAnomaly,
            severity: Severity::Medium,
            confidence: Confidence::Low,
            description: format!(
                "'{}' has quantity of {} - verify this is correct",
                item.description, item.quantity
            ),
            items_involved: vec![idx],
            potential_overcharge: BigDecimal::zero(),
            reference: None,
        })
        .collect()
}

/// 金额核对: 明细合计 vs 账单总额
///
/// 只有明细合计 *小于* 账单总额时差额才计为潜在多收;
/// 明细合计偏大只提示, 不计金额。
pub fn check_arithmetic(snapshot: &BillSnapshot) -> Vec<Finding> {
    let Some(stated) = snapshot.total_billed.as_ref() else {
        return Vec::new();
    };
    if snapshot.line_items.is_empty() {
        return Vec::new();
    }

    let calculated = snapshot
        .line_items
        .iter()
        .fold(BigDecimal::zero(), |acc, item| acc + &item.total_charge);
    let diff = (&calculated - stated).abs();
    if diff <= materiality_threshold() {
        return Vec::new();
    }

    let potential_overcharge = if calculated < *stated {
        round_cents(&diff)
    } else {
        BigDecimal::zero()
    };

    vec![Finding {
        id: 0,
        kind: DiscrepancyType::MathError,
        severity: Severity::High,
        confidence: Confidence::High,
        description: format!(
            "Line items total ${} but bill states ${} (difference: ${})",
            fmt_money(&calculated),
            fmt_money(stated),
            fmt_money(&diff)
        ),
        items_involved: Vec::new(),
        potential_overcharge,
        reference: None,
    }]
}
