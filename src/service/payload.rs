//! 对话回复中结构化评估块的解析
//!
//! 对话服务在回复中用 ```json ... ``` 包裹评估结果。解析是一个独立步骤,
//! 失败的结果只有一种: 没有评估 (`None`), 不会向上抛错。

use crate::models::coerce::{lenient_optional_money, lenient_text, lenient_vec};
use crate::models::{Assessment, Finding};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";
const COMPLETION_KEY: &str = "assessment_complete";

/// 回复中只有评估块时展示的文字
pub const CLOSING_MESSAGE: &str =
    "Thanks for answering my questions. I've finished reviewing your bill - your results are ready.";

/// 对话服务给出的原始评估
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentPayload {
    pub assessment_complete: bool,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub confirmed_discrepancies: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub cleared_items: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub new_concerns: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_optional_money")]
    pub total_disputed_amount: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
}

/// 拆分后的回复: 展示文本 + 评估
#[derive(Debug, Clone)]
pub struct ParsedReply {
    pub display: String,
    pub payload: Option<AssessmentPayload>,
}

/// 拆出评估块; 块外的文字作为展示文本
pub fn parse_reply(text: &str) -> ParsedReply {
    let Some(start) = text.find(FENCE_OPEN) else {
        return ParsedReply {
            display: text.trim().to_string(),
            payload: None,
        };
    };

    let before = text[..start].trim();
    let after_fence = &text[start + FENCE_OPEN.len()..];

    let Some(end) = after_fence.find(FENCE_CLOSE) else {
        // 未闭合的块: 丢弃, 只展示前面的文字
        if after_fence.contains(COMPLETION_KEY) {
            tracing::warn!("Discarding unterminated assessment block");
            return ParsedReply {
                display: display_or_closing(before.to_string()),
                payload: None,
            };
        }
        return ParsedReply {
            display: text.trim().to_string(),
            payload: None,
        };
    };

    let block = after_fence[..end].trim();
    if !block.contains(COMPLETION_KEY) {
        // 普通代码块, 不是评估
        return ParsedReply {
            display: text.trim().to_string(),
            payload: None,
        };
    }

    let after = after_fence[end + FENCE_CLOSE.len()..].trim();
    let display = match (before.is_empty(), after.is_empty()) {
        (true, true) => String::new(),
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (false, false) => format!("{}\n\n{}", before, after),
    };

    let payload = match serde_json::from_str::<AssessmentPayload>(block) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Discarding malformed assessment block: {}", e);
            None
        }
    };

    ParsedReply {
        display: display_or_closing(display),
        payload,
    }
}

fn display_or_closing(display: String) -> String {
    if display.is_empty() {
        CLOSING_MESSAGE.to_string()
    } else {
        display
    }
}

/// 把原始评估落到本会话的 finding 上
///
/// 确认/排除中无法对应到 finding 的条目作为新问题 (自由文本) 保留;
/// 同时出现在确认和排除中的 finding 以确认为准。
pub fn resolve(payload: AssessmentPayload, findings: &[Finding]) -> Assessment {
    let mut assessment = Assessment {
        assessment_complete: payload.assessment_complete,
        reported_total: payload.total_disputed_amount,
        summary: payload.summary,
        ..Default::default()
    };
    let mut unresolved: Vec<String> = Vec::new();

    for value in &payload.confirmed_discrepancies {
        match resolve_ref(value, findings) {
            Some(id) => {
                assessment.confirmed.insert(id);
            }
            None => unresolved.extend(free_text(value)),
        }
    }

    for value in &payload.cleared_items {
        match resolve_ref(value, findings) {
            Some(id) if assessment.confirmed.contains(&id) => {
                tracing::warn!("Finding {} both confirmed and cleared, keeping confirmed", id);
            }
            Some(id) => {
                assessment.cleared.insert(id);
            }
            None => unresolved.extend(free_text(value)),
        }
    }

    for text in payload
        .new_concerns
        .iter()
        .filter_map(free_text)
        .chain(unresolved)
    {
        if !assessment.new_concerns.contains(&text) {
            assessment.new_concerns.push(text);
        }
    }

    assessment
}

fn resolve_ref(value: &Value, findings: &[Finding]) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|id| id as usize)
            .filter(|id| *id < findings.len()),
        Value::String(s) => {
            let s = s.trim();
            let numeric = s.trim_start_matches('#');
            if let Ok(id) = numeric.parse::<usize>() {
                return Some(id).filter(|id| *id < findings.len());
            }
            match_description(s, findings)
        }
        Value::Object(map) => ["id", "index", "finding_id"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| resolve_ref(v, findings))
            .or_else(|| {
                map.get("description")
                    .and_then(Value::as_str)
                    .and_then(|d| match_description(d, findings))
            }),
        _ => None,
    }
}

fn match_description(text: &str, findings: &[Finding]) -> Option<usize> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    findings
        .iter()
        .find(|f| f.description.trim().to_lowercase() == needle)
        .map(|f| f.id)
}

fn free_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["description", "concern", "text", "item"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| Some(value.to_string())),
        _ => None,
    }
}
