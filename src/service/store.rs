//! 会话存储
//!
//! 每个会话一把锁: 同一会话的分析/对话/查询串行执行, 不同会话互不影响。
//! 存储实现可替换 (内存, 外部缓存, 数据库), 引擎只依赖 `SessionStore`。

use crate::models::Session;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 会话句柄: 持有锁期间独占该会话
pub type SessionHandle = Arc<Mutex<Session>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 分配一个新的会话 ID
    fn next_id(&self) -> String;

    async fn get(&self, id: &str) -> Option<SessionHandle>;

    /// 写入 (覆盖同 ID 的旧会话), 返回句柄
    async fn put(&self, session: Session) -> SessionHandle;

    async fn delete(&self, id: &str) -> bool;
}

/// 内存实现
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionHandle>,
    counter: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("session-{}", n)
    }

    async fn get(&self, id: &str) -> Option<SessionHandle> {
        // 克隆 Arc 后立即释放分片锁, 不在 await 期间持有
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    async fn put(&self, session: Session) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&handle));
        handle
    }

    async fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }
}
