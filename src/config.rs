use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    pub collaborator: CollaboratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 参考价格库 (fee_schedule), 未配置时不连接数据库
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// 参考价格 CSV (code,avg_price,high_price)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub csv_path: Option<String>,
}

/// 外部提取/对话服务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig::default(),
            reference: ReferenceConfig::default(),
            collaborator: CollaboratorConfig {
                base_url: None,
                timeout_secs: 30,
            },
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    ///
    /// 优先级: SERVER_HOST / SERVER_PORT / DATABASE_URL > MEDBILL__* > 默认值
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("collaborator.timeout_secs", defaults.collaborator.timeout_secs as i64)?
            .add_source(
                config::Environment::with_prefix("MEDBILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }
}
