//! 外部提取结果的宽松反序列化
//!
//! 提取服务返回的 JSON 字段类型不可靠 (数字可能是字符串, 可能缺失或为 null)。
//! 这里统一把它们收敛为安全的默认值, 输入错误永远不会导致整单失败。

use bigdecimal::{BigDecimal, Signed, Zero};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// 四舍五入到分
pub fn round_cents(amount: &BigDecimal) -> BigDecimal {
    // 先截到 4 位, 避免除法结果的超长精度
    amount.with_scale(4).round(2)
}

/// 解析金额: 数字, 数字字符串 ("$1,250.00") 均可
pub fn money_from_value(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            BigDecimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 行项目金额: 缺失/不可解析 -> 0, 负数 -> 0
pub fn lenient_money<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let amount = value
        .as_ref()
        .and_then(money_from_value)
        .unwrap_or_else(BigDecimal::zero);
    if amount.is_negative() {
        Ok(BigDecimal::zero())
    } else {
        Ok(amount)
    }
}

/// 可选金额 (账单总额, 保险调整等): null 保持 None, 不截断负数
pub fn lenient_optional_money<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(money_from_value))
}

/// 数量: 正整数, 缺失/零/负数/无法解析 -> 1, 小数向下取整
pub fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f.trunc() as u64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 1.0).map(|f| f.trunc() as u64))
        }
        _ => None,
    };
    Ok(parsed
        .map(|q| q.clamp(1, u32::MAX as u64) as u32)
        .unwrap_or(1))
}

/// 可选文本: 空串视为缺失, 数字转成字符串 (例如编码 99284)
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text_from_value))
}

/// 必填文本: 缺失/null -> ""
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// 数组字段: 缺失/null/非数组 -> 空; 无法解析的元素逐个丢弃
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(elements)) => elements
            .into_iter()
            .filter_map(|element| T::deserialize(element).ok())
            .collect(),
        _ => Vec::new(),
    })
}
