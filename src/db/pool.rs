use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// 费用表聚合查询较重, 超过该时长记 warn
const SLOW_QUERY: Duration = Duration::from_secs(15);

/// 创建数据库连接池
///
/// 只在启动时加载参考价格表, 一条连接即可; 加载完成后由调用方关闭。
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let connect_options = PgConnectOptions::from_str(database_url)?
        .application_name("medbill-analyzer")
        .log_statements(tracing::log::LevelFilter::Debug)
        .log_slow_statements(tracing::log::LevelFilter::Warn, SLOW_QUERY);

    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}
