//! 外部协作服务: 账单提取 + 对话/信件生成
//!
//! 核心逻辑只依赖这里的 trait; HTTP 实现把请求转发给配置的文本生成服务。

use crate::error::CollaboratorError;
use crate::models::{Assessment, BillSnapshot, ChatTurn, Finding};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 没有用户消息时 (开场) 发给对话服务的提示, 不写入对话记录
pub const OPENING_PROMPT: &str = "Hello, I'd like to review my medical bill.";

/// 对话服务的工作说明 (评估块格式约定)
pub const CONVERSATION_INSTRUCTIONS: &str = r#"You are a friendly, professional medical billing assistant helping a patient review their bill.
Ask short, specific questions about the visit (length of stay, procedures, medications, tests) to verify the
automatically detected discrepancies. Ask no more than 6-8 questions. Patient testimony is supporting evidence,
not proof; "I don't remember" is fine. Use plain language.
Refer to discrepancies by their "id". When you have enough information, reply with a JSON block wrapped in
```json``` tags:
```json
{"assessment_complete": true, "confirmed_discrepancies": [ids], "cleared_items": [ids], "new_concerns": ["text"], "total_disputed_amount": 0.0, "summary": "text"}
```
Until then, just ask your next question."#;

/// 一轮对话的上下文
#[derive(Debug, Serialize)]
pub struct ConversationContext<'a> {
    pub bill_data: &'a BillSnapshot,
    pub discrepancies: &'a [Finding],
    pub chat_history: &'a [ChatTurn],
    /// 当前评估 (还在收集阶段时可能已有部分结论)
    pub assessment: Option<&'a Assessment>,
    pub message: &'a str,
}

/// 争议信生成请求
#[derive(Debug, Serialize)]
pub struct DisputeLetterRequest<'a> {
    pub bill_data: &'a BillSnapshot,
    pub discrepancies: &'a [Finding],
    pub assessment: Option<&'a Assessment>,
}

/// 从账单图片/PDF 提取结构化数据
#[async_trait]
pub trait BillExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BillSnapshot, CollaboratorError>;
}

/// 对话与信件文本生成
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// 返回原始回复文本 (可能内嵌评估块)
    async fn reply(&self, context: &ConversationContext<'_>) -> Result<String, CollaboratorError>;

    async fn draft_dispute_letter(
        &self,
        request: &DisputeLetterRequest<'_>,
    ) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    instructions: &'a str,
    #[serde(flatten)]
    context: &'a ConversationContext<'a>,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    #[serde(default)]
    text: Option<String>,
}

impl TextResponse {
    fn into_text(self) -> Result<String, CollaboratorError> {
        self.text
            .filter(|t| !t.trim().is_empty())
            .ok_or(CollaboratorError::EmptyReply)
    }
}

/// 基于 HTTP 的协作服务客户端
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCollaborator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_for_text<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        response.json::<TextResponse>().await?.into_text()
    }
}

#[async_trait]
impl BillExtractor for HttpCollaborator {
    async fn extract(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BillSnapshot, CollaboratorError> {
        let response = self
            .client
            .post(self.url("extract"))
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<BillSnapshot>().await?)
    }
}

#[async_trait]
impl ConversationAgent for HttpCollaborator {
    async fn reply(&self, context: &ConversationContext<'_>) -> Result<String, CollaboratorError> {
        let request = ChatRequest {
            instructions: CONVERSATION_INSTRUCTIONS,
            context,
        };
        self.post_for_text("chat", &request).await
    }

    async fn draft_dispute_letter(
        &self,
        request: &DisputeLetterRequest<'_>,
    ) -> Result<String, CollaboratorError> {
        self.post_for_text("dispute-letter", request).await
    }
}

/// 未配置外部服务时使用: 所有调用返回 Unavailable
#[derive(Debug, Clone, Default)]
pub struct UnavailableCollaborator;

#[async_trait]
impl BillExtractor for UnavailableCollaborator {
    async fn extract(&self, _bytes: Vec<u8>, _mime_type: &str) -> Result<BillSnapshot, CollaboratorError> {
        Err(CollaboratorError::Unavailable("bill extraction".to_string()))
    }
}

#[async_trait]
impl ConversationAgent for UnavailableCollaborator {
    async fn reply(&self, _context: &ConversationContext<'_>) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("conversation".to_string()))
    }

    async fn draft_dispute_letter(
        &self,
        _request: &DisputeLetterRequest<'_>,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("dispute letter".to_string()))
    }
}
