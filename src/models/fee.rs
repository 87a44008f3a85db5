use bigdecimal::BigDecimal;
use sqlx::FromRow;

/// 收费标准聚合行 (fee_schedule 按 hcpcs 分组)
#[derive(Debug, Clone, FromRow)]
pub struct FeeScheduleRow {
    pub code: String,
    pub min_non_fac: Option<BigDecimal>,
    pub max_non_fac: Option<BigDecimal>,
    pub avg_non_fac: Option<BigDecimal>,
    pub min_fac: Option<BigDecimal>,
    pub max_fac: Option<BigDecimal>,
    pub avg_fac: Option<BigDecimal>,
}
