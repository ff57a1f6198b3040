use crate::error::AuctionError;
use crate::keys;
use crate::store::{Store, WriteBatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 세션 모델 (쿠키 발급은 요청 계층 담당)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn Store>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), AuctionError> {
        let mut batch = WriteBatch::new();
        batch.hash_set(
            keys::session(&session.id),
            vec![
                ("userId".to_string(), session.user_id.clone()),
                ("username".to_string(), session.username.clone()),
            ],
        );
        self.store.apply(batch).await?;
        Ok(())
    }

    /// 없는 세션은 None
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, AuctionError> {
        let mut fields = self.store.hgetall(&keys::session(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Session {
            id: id.to_string(),
            user_id: fields.remove("userId").unwrap_or_default(),
            username: fields.remove("username").unwrap_or_default(),
        }))
    }
}
