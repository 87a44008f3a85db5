use super::aggregate;
use super::collaborator::{BillExtractor, ConversationAgent, DisputeLetterRequest};
use super::engine::{Analysis, DiscrepancyEngine};
use super::reconcile::reconcile;
use super::store::{SessionHandle, SessionStore};
use crate::error::{AppError, AppResult, CollaboratorError};
use crate::models::{BillSnapshot, ChatReply, DisputePreview, ResultsSummary, Session};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 允许上传的账单文件类型
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "application/pdf",
];

const LETTER_FALLBACK: &str = "Error generating dispute letter. Please try again.";

/// 账单分析服务: HTTP 层调用的唯一入口
///
/// 同一会话的所有操作在会话锁内完成 (包括外部调用), 不同会话并行。
pub struct BillingService {
    engine: DiscrepancyEngine,
    store: Arc<dyn SessionStore>,
    extractor: Arc<dyn BillExtractor>,
    agent: Arc<dyn ConversationAgent>,
    timeout: Duration,
}

impl BillingService {
    pub fn new(
        engine: DiscrepancyEngine,
        store: Arc<dyn SessionStore>,
        extractor: Arc<dyn BillExtractor>,
        agent: Arc<dyn ConversationAgent>,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            store,
            extractor,
            agent,
            timeout,
        }
    }

    /// 纯分析, 不创建会话
    pub fn analyze(&self, snapshot: &BillSnapshot) -> Analysis {
        self.engine.analyze(snapshot)
    }

    async fn session(&self, id: &str) -> AppResult<SessionHandle> {
        match self.store.get(id).await {
            Some(handle) => Ok(handle),
            None => {
                tracing::warn!("Session {} not found", id);
                Err(AppError::NotFound(id.to_string()))
            }
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("{} timed out (>{:?})", what, self.timeout);
                Err(CollaboratorError::Timeout(self.timeout))
            }
        }
    }

    /// 上传账单: 提取 -> 补充参考价格 -> 新建会话 (确认前不分析)
    pub async fn upload_bill(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> AppResult<(String, BillSnapshot)> {
        if !ALLOWED_MIME_TYPES.contains(&mime_type) {
            return Err(AppError::InvalidInput(format!(
                "Unsupported file type: {}",
                mime_type
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
        }

        let mut snapshot = self
            .bounded("Bill extraction", self.extractor.extract(bytes, mime_type))
            .await?;
        self.engine.reference().enrich(&mut snapshot);

        let id = self.store.next_id();
        self.store.put(Session::new(id.clone(), snapshot.clone())).await;
        tracing::info!(
            "Session {} created from upload ({} line items)",
            id,
            snapshot.line_items.len()
        );
        Ok((id, snapshot))
    }

    /// 直接提交结构化账单: 新建会话并立即分析
    pub async fn create_session(&self, mut snapshot: BillSnapshot) -> AppResult<(String, Analysis)> {
        self.engine.reference().enrich(&mut snapshot);
        let analysis = self.engine.analyze(&snapshot);

        let id = self.store.next_id();
        let mut session = Session::new(id.clone(), BillSnapshot::default());
        session.replace_analysis(
            snapshot,
            analysis.findings.clone(),
            analysis.total_potential_savings.clone(),
        );
        self.store.put(session).await;
        tracing::info!("Session {} created with {} findings", id, analysis.findings.len());
        Ok((id, analysis))
    }

    /// 确认 (可能已编辑) 的账单并重新分析
    ///
    /// 旧的 finding, 对话记录和评估在同一把锁内整体替换。
    pub async fn confirm_bill(&self, id: &str, mut snapshot: BillSnapshot) -> AppResult<Analysis> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;

        self.engine.reference().enrich(&mut snapshot);
        let analysis = self.engine.analyze(&snapshot);
        session.replace_analysis(
            snapshot,
            analysis.findings.clone(),
            analysis.total_potential_savings.clone(),
        );
        tracing::info!(
            "Session {} analysed (version {}): {} findings",
            id,
            session.snapshot_version,
            analysis.findings.len()
        );
        Ok(analysis)
    }

    pub async fn start_conversation(&self, id: &str) -> AppResult<ChatReply> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        reconcile(&mut session, None, self.agent.as_ref(), self.timeout).await
    }

    pub async fn continue_conversation(&self, id: &str, message: &str) -> AppResult<ChatReply> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        reconcile(&mut session, Some(message), self.agent.as_ref(), self.timeout).await
    }

    pub async fn get_results(&self, id: &str) -> AppResult<ResultsSummary> {
        let handle = self.session(id).await?;
        let session = handle.lock().await;
        Ok(aggregate::results(&session))
    }

    /// 争议信预览; 信件生成失败时返回固定提示, 不影响其余内容
    pub async fn dispute_preview(&self, id: &str) -> AppResult<DisputePreview> {
        let handle = self.session(id).await?;
        let session = handle.lock().await;

        let request = DisputeLetterRequest {
            bill_data: &session.snapshot,
            discrepancies: &session.findings,
            assessment: session.assessment.as_ref(),
        };
        let draft_letter = match self
            .bounded("Dispute letter", self.agent.draft_dispute_letter(&request))
            .await
        {
            Ok(letter) => letter,
            Err(e) => {
                tracing::error!("Session {}: letter generation failed: {}", id, e);
                LETTER_FALLBACK.to_string()
            }
        };

        let summary = aggregate::results(&session);
        Ok(DisputePreview {
            hospital_name: session
                .snapshot
                .provider_name
                .clone()
                .unwrap_or_else(|| "Unknown Provider".to_string()),
            account_number: session.snapshot.account_number.clone(),
            draft_letter,
            issues: aggregate::dispute_issues(&session),
            total_savings: summary.total_savings,
        })
    }

    pub async fn export_findings(&self, id: &str) -> AppResult<Vec<u8>> {
        let handle = self.session(id).await?;
        let session = handle.lock().await;
        let mut buf = Vec::new();
        aggregate::export_findings_csv(&session, &mut buf)?;
        Ok(buf)
    }

    pub async fn delete_session(&self, id: &str) -> AppResult<()> {
        if self.store.delete(id).await {
            tracing::info!("Session {} deleted", id);
            Ok(())
        } else {
            Err(AppError::NotFound(id.to_string()))
        }
    }
}
