use medbill_analyzer::service::{
    BillExtractor, ConversationAgent, HttpCollaborator, UnavailableCollaborator,
};
use medbill_analyzer::{
    api, create_pool, AppConfig, BillingService, DiscrepancyEngine, InMemorySessionStore,
    ReferencePriceTable,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

/// 加载参考价格表: CSV 优先, 其次数据库, 都没有则为空表
async fn load_reference_table(config: &AppConfig) -> Result<ReferencePriceTable, Box<dyn std::error::Error>> {
    if let Some(path) = &config.reference.csv_path {
        let table = ReferencePriceTable::from_csv_path(Path::new(path))?;
        info!("Loaded {} reference prices from {}", table.len(), path);
        return Ok(table);
    }

    if let Some(url) = &config.database.url {
        let pool = create_pool(url).await?;
        info!("Database pool created");
        let table = ReferencePriceTable::load_from_db(&pool).await?;
        pool.close().await;
        return Ok(table);
    }

    warn!("No reference price source configured, price inflation checks disabled");
    Ok(ReferencePriceTable::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!("Starting server with config: {:?}", config);

    // 参考价格表 (启动后只读)
    let reference = Arc::new(load_reference_table(&config).await?);
    let engine = DiscrepancyEngine::new(reference);

    // 外部提取/对话服务
    let timeout = config.collaborator.timeout();
    let (extractor, agent): (Arc<dyn BillExtractor>, Arc<dyn ConversationAgent>) =
        match &config.collaborator.base_url {
            Some(url) => {
                let client = Arc::new(HttpCollaborator::new(url, timeout)?);
                info!("Using external collaborator at {} (timeout {:?})", url, timeout);
                let extractor: Arc<dyn BillExtractor> = client.clone();
                let agent: Arc<dyn ConversationAgent> = client;
                (extractor, agent)
            }
            None => {
                warn!("No collaborator configured, upload/chat endpoints will return 503");
                let unavailable = Arc::new(UnavailableCollaborator);
                let extractor: Arc<dyn BillExtractor> = unavailable.clone();
                let agent: Arc<dyn ConversationAgent> = unavailable;
                (extractor, agent)
            }
        };

    let service = Arc::new(BillingService::new(
        engine,
        Arc::new(InMemorySessionStore::new()),
        extractor,
        agent,
        timeout,
    ));

    // 构建路由
    let app = api::router(service).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /upload-bill         - extract a bill image/PDF");
    info!("  POST /analyze             - analyse a structured bill");
    info!("  POST /confirm-bill        - re-analyse an edited bill");
    info!("  POST /chat/start, /chat   - review conversation");
    info!("  GET  /results/:id         - results summary");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
