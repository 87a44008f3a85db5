//! 评估核对状态机
//!
//! gathering --(每轮对话)--> gathering
//! gathering --(评估块带 assessment_complete=true)--> complete (终态)
//!
//! 分类完全由对话服务决定; 这里只负责解析, 校验引用, 落盘。
//! 外部调用成功之前不修改会话, 失败的一轮不会留下任何痕迹。

use super::collaborator::{ConversationAgent, ConversationContext, OPENING_PROMPT};
use super::payload::{self, CLOSING_MESSAGE};
use crate::error::{AppResult, CollaboratorError};
use crate::models::{ChatReply, ChatTurn, ConversationState, Role, Session};
use chrono::Utc;
use std::time::Duration;

/// 处理一轮对话, 返回展示文本和当前评估
///
/// `incoming` 为空 (或只有空白) 时视为没有用户消息, 例如开场。
pub async fn reconcile(
    session: &mut Session,
    incoming: Option<&str>,
    agent: &dyn ConversationAgent,
    timeout: Duration,
) -> AppResult<ChatReply> {
    if session.is_complete() {
        // 终态: 记录后按空操作处理, 返回冻结的评估
        tracing::warn!(
            "Session {} already complete, ignoring new turn",
            session.id
        );
        let message = session
            .transcript
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Model)
            .map(|turn| turn.content.clone())
            .unwrap_or_else(|| CLOSING_MESSAGE.to_string());
        return Ok(ChatReply {
            message,
            assessment: session.assessment.clone(),
            state: session.state,
        });
    }

    let incoming = incoming.map(str::trim).filter(|m| !m.is_empty());
    let message = match incoming {
        Some(m) => m,
        None if session.transcript.is_empty() => OPENING_PROMPT,
        None => "",
    };

    let context = ConversationContext {
        bill_data: &session.snapshot,
        discrepancies: &session.findings,
        chat_history: &session.transcript,
        assessment: session.assessment.as_ref(),
        message,
    };

    let raw = match tokio::time::timeout(timeout, agent.reply(&context)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            tracing::error!("Session {}: conversation call failed: {}", session.id, e);
            return Err(e.into());
        }
        Err(_) => {
            tracing::error!(
                "Session {}: conversation call timed out (>{:?})",
                session.id,
                timeout
            );
            return Err(CollaboratorError::Timeout(timeout).into());
        }
    };

    if raw.trim().is_empty() {
        return Err(CollaboratorError::EmptyReply.into());
    }

    let parsed = payload::parse_reply(&raw);

    // 外部调用成功, 开始写入会话
    if let Some(m) = incoming {
        session.transcript.push(ChatTurn::user(m));
    }
    session.transcript.push(ChatTurn::model(parsed.display.clone()));

    if let Some(raw_payload) = parsed.payload {
        let assessment = payload::resolve(raw_payload, &session.findings);
        if assessment.assessment_complete {
            session.state = ConversationState::Complete;
            tracing::info!(
                "Session {}: assessment complete (confirmed={}, cleared={}, new={})",
                session.id,
                assessment.confirmed.len(),
                assessment.cleared.len(),
                assessment.new_concerns.len()
            );
        }
        session.assessment = Some(assessment);
    }
    session.updated_at = Utc::now();

    Ok(ChatReply {
        message: parsed.display,
        assessment: session.assessment.clone(),
        state: session.state,
    })
}
