use crate::models::FeeScheduleRow;
use sqlx::PgPool;

/// 按 HCPCS 编码聚合收费标准 (0 视为无效价格)
pub async fn list_fee_schedule(pool: &PgPool) -> Result<Vec<FeeScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, FeeScheduleRow>(
        r#"
        SELECT hcpcs AS code,
               MIN(NULLIF(non_fac_fee, 0))::numeric AS min_non_fac,
               MAX(non_fac_fee)::numeric            AS max_non_fac,
               AVG(NULLIF(non_fac_fee, 0))::numeric AS avg_non_fac,
               MIN(NULLIF(fac_fee, 0))::numeric     AS min_fac,
               MAX(fac_fee)::numeric                AS max_fac,
               AVG(NULLIF(fac_fee, 0))::numeric     AS avg_fac
        FROM fee_schedule
        WHERE hcpcs IS NOT NULL
        GROUP BY hcpcs
        "#
    )
    .fetch_all(pool)
    .await
}
