use super::coerce::{
    lenient_money, lenient_optional_money, lenient_quantity, lenient_string, lenient_text,
    lenient_vec,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize};

/// 费用类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Room,
    Procedure,
    Lab,
    Medication,
    Supply,
    Imaging,
    Therapy,
    Consultation,
    #[default]
    Other,
}

impl Category {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "room" => Category::Room,
            "procedure" => Category::Procedure,
            "lab" => Category::Lab,
            "medication" => Category::Medication,
            "supply" => Category::Supply,
            "imaging" => Category::Imaging,
            "therapy" => Category::Therapy,
            "consultation" => Category::Consultation,
            _ => Category::Other,
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(tag
            .as_ref()
            .and_then(|v| v.as_str())
            .map(Category::from_tag)
            .unwrap_or_default())
    }
}

/// 账单明细行 (身份 = 在账单中的位置索引)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient_money")]
    pub unit_charge: BigDecimal,
    #[serde(default, deserialize_with = "lenient_money")]
    pub total_charge: BigDecimal,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_of_service: Option<String>,
    #[serde(default)]
    pub category: Category,

    // 参考价格补充信息 (仅用于展示, 不参与规则判断)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_optional_money")]
    pub expected_charge: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_optional_money")]
    pub expected_charge_per_unit: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_optional_money")]
    pub high_price_per_unit: Option<BigDecimal>,
}

fn default_quantity() -> u32 {
    1
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: u32, total_charge: BigDecimal) -> Self {
        Self {
            code: None,
            description: description.into(),
            quantity: quantity.max(1),
            unit_charge: (&total_charge / BigDecimal::from(quantity.max(1))).with_scale(2),
            total_charge,
            date_of_service: None,
            category: Category::Other,
            expected_charge: None,
            expected_charge_per_unit: None,
            high_price_per_unit: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date_of_service = Some(date.into());
        self
    }
}

/// 账单快照 (一次提取结果, 分析后不可变; 编辑即产生新快照)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillSnapshot {
    #[serde(default, deserialize_with = "lenient_text")]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub provider_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub billing_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_money")]
    pub total_billed: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient_optional_money")]
    pub insurance_adjustments: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient_optional_money")]
    pub patient_responsibility: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub line_items: Vec<LineItem>,
}

impl BillSnapshot {
    pub fn with_items(line_items: Vec<LineItem>) -> Self {
        Self {
            line_items,
            ..Default::default()
        }
    }

    pub fn with_total(mut self, total: BigDecimal) -> Self {
        self.total_billed = Some(total);
        self
    }
}
