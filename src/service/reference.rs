use crate::db::queries;
use crate::error::AppResult;
use crate::models::coerce::round_cents;
use crate::models::{BillSnapshot, FeeScheduleRow, PriceBand};
use bigdecimal::{BigDecimal, Signed, Zero};
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// 规范化 CPT/HCPCS 编码: 去掉空格/横线/点, 转大写, 只保留前 5 位 (去掉修饰符)
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '.'))
        .flat_map(char::to_uppercase)
        .take(5)
        .collect()
}

/// CSV 行 (code,avg_price,high_price)
#[derive(Debug, Deserialize)]
struct ReferenceCsvRow {
    code: String,
    avg_price: BigDecimal,
    high_price: BigDecimal,
}

/// 参考价格表: 启动时加载一次, 之后只读
#[derive(Debug, Clone, Default)]
pub struct ReferencePriceTable {
    bands: HashMap<String, PriceBand>,
}

impl ReferencePriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一条参考价格 (编码会被规范化)
    pub fn insert(&mut self, code: &str, avg_price: BigDecimal, high_price: BigDecimal) {
        let key = normalize_code(code);
        if key.is_empty() {
            return;
        }
        self.bands.insert(
            key,
            PriceBand {
                avg_price: round_cents(&avg_price),
                high_price: round_cents(&high_price),
            },
        );
    }

    pub fn with_band(mut self, code: &str, avg_price: BigDecimal, high_price: BigDecimal) -> Self {
        self.insert(code, avg_price, high_price);
        self
    }

    pub fn get(&self, code: &str) -> Option<&PriceBand> {
        let key = normalize_code(code);
        if key.is_empty() {
            return None;
        }
        self.bands.get(&key)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// 从 CSV 读取 (必须带表头)
    pub fn from_csv_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut table = Self::new();
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in rdr.deserialize::<ReferenceCsvRow>() {
            let row = row?;
            if row.high_price.is_positive() {
                table.insert(&row.code, row.avg_price, row.high_price);
            }
        }
        Ok(table)
    }

    pub fn from_csv_path(path: &Path) -> AppResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// 从收费标准聚合行构建
    ///
    /// high = 所有非零价格点的最大值; avg = 非零均值的平均, 没有时取 high
    pub fn from_fee_rows(rows: &[FeeScheduleRow]) -> Self {
        let mut table = Self::new();
        for row in rows {
            let prices: Vec<&BigDecimal> = [&row.min_non_fac, &row.max_non_fac, &row.min_fac, &row.max_fac]
                .into_iter()
                .flatten()
                .filter(|p| p.is_positive())
                .collect();
            let Some(high) = prices.into_iter().max().cloned() else {
                continue;
            };

            let avgs: Vec<&BigDecimal> = [&row.avg_non_fac, &row.avg_fac]
                .into_iter()
                .flatten()
                .filter(|p| p.is_positive())
                .collect();
            let avg = if avgs.is_empty() {
                high.clone()
            } else {
                let sum = avgs.iter().fold(BigDecimal::zero(), |acc, a| acc + *a);
                sum / BigDecimal::from(avgs.len() as u64)
            };

            table.insert(&row.code, avg, high);
        }
        table
    }

    /// 从 PostgreSQL fee_schedule 表加载
    pub async fn load_from_db(pool: &PgPool) -> AppResult<Self> {
        let rows = queries::list_fee_schedule(pool).await?;
        let table = Self::from_fee_rows(&rows);
        tracing::info!(
            "Loaded {} reference prices from fee_schedule ({} rows)",
            table.len(),
            rows.len()
        );
        Ok(table)
    }

    /// 为明细补充参考价格 (仅用于展示)
    pub fn enrich(&self, snapshot: &mut BillSnapshot) -> usize {
        let mut found = 0;
        for item in snapshot.line_items.iter_mut() {
            let band = item
                .code
                .as_deref()
                .and_then(|code| self.get(code))
                .filter(|band| band.avg_price.is_positive());
            match band {
                Some(band) => {
                    let quantity = BigDecimal::from(item.quantity.max(1));
                    item.expected_charge = Some(round_cents(&(&band.avg_price * &quantity)));
                    item.expected_charge_per_unit = Some(band.avg_price.clone());
                    item.high_price_per_unit = Some(band.high_price.clone());
                    found += 1;
                }
                None => {
                    item.expected_charge = None;
                    item.expected_charge_per_unit = None;
                    item.high_price_per_unit = None;
                }
            }
        }
        tracing::info!(
            "Enriched {}/{} line items with reference prices",
            found,
            snapshot.line_items.len()
        );
        found
    }
}
