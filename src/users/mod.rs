/// 사용자 저장소
/// 사용자 이름 중복 검사와 등록은 사용자 이름 집합 키의 락 안에서 수행한다.
// region:    --- Imports
use crate::error::AuctionError;
use crate::ids;
use crate::keys;
use crate::lock::LockManager;
use crate::store::{Store, StoreError, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub mod sessions;

pub use sessions::{Session, SessionRepository};
// endregion: --- Imports

// region:    --- Model
/// 사용자 모델
/// password는 호출자가 만든 해시를 그대로 저장하며 응답에는 포함하지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// 사용자 생성 요청
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserAttrs {
    pub username: String,
    pub password: String,
}

impl User {
    fn to_record(&self) -> Vec<(String, String)> {
        vec![
            ("username".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
        ]
    }

    fn from_record(id: &str, mut fields: HashMap<String, String>) -> Option<User> {
        if fields.is_empty() {
            return None;
        }
        Some(User {
            id: id.to_string(),
            username: fields.remove("username").unwrap_or_default(),
            password: fields.remove("password").unwrap_or_default(),
        })
    }
}
// endregion: --- Model

// region:    --- User Repository
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn Store>,
    locks: LockManager,
}

impl UserRepository {
    pub fn new(store: Arc<dyn Store>, locks: LockManager) -> Self {
        Self { store, locks }
    }

    /// 사용자 생성
    /// 레코드, 사용자 이름 집합, 이름 -> 아이디 랭킹을 한 배치로 쓴다.
    pub async fn create_user(&self, attrs: CreateUserAttrs) -> Result<User, AuctionError> {
        let store = Arc::clone(&self.store);
        let usernames_key = keys::usernames();

        let user = self
            .locks
            .with_lock(&usernames_key, |signal| async move {
                if store.sismember(&keys::usernames(), &attrs.username).await? {
                    return Err(AuctionError::UsernameTaken(attrs.username));
                }

                let (id, score) = ids::generate_with_score();
                let user = User {
                    id,
                    username: attrs.username,
                    password: attrs.password,
                };
                let mut batch = WriteBatch::new();
                batch
                    .hash_set(keys::user(&user.id), user.to_record())
                    .set_add(keys::usernames(), user.username.clone())
                    .sorted_set_add(keys::usernames_by_id(), user.username.clone(), score);

                signal.ensure_live()?;
                store.apply(batch).await?;
                Ok(user)
            })
            .await?;

        info!("{:<12} --> 사용자 생성: {} ({})", "User", user.username, user.id);
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<User, AuctionError> {
        let fields = self.store.hgetall(&keys::user(id)).await?;
        User::from_record(id, fields).ok_or_else(|| AuctionError::UserNotFound(id.to_string()))
    }

    /// 이름 -> 아이디 랭킹의 점수로 아이디를 복원해 조회
    pub async fn get_user_by_username(&self, username: &str) -> Result<User, AuctionError> {
        let score = self
            .store
            .zscore(&keys::usernames_by_id(), username)
            .await?
            .ok_or_else(|| AuctionError::UserNotFound(username.to_string()))?;
        let id = ids::from_score(score).ok_or_else(|| StoreError::Corrupt {
            key: keys::usernames_by_id(),
            reason: format!("{} 점수 {}", username, score),
        })?;
        self.get_user_by_id(&id).await
    }
}
// endregion: --- User Repository

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockOptions;
    use crate::store::MemoryStore;

    fn repository(store: &MemoryStore) -> UserRepository {
        let store: Arc<dyn Store> = Arc::new(store.clone());
        UserRepository::new(Arc::clone(&store), LockManager::new(store, LockOptions::default()))
    }

    fn attrs(username: &str) -> CreateUserAttrs {
        CreateUserAttrs {
            username: username.into(),
            password: "hashed".into(),
        }
    }

    #[tokio::test]
    async fn creates_and_finds_user() {
        let store = MemoryStore::new();
        let users = repository(&store);

        let user = users.create_user(attrs("alice")).await.unwrap();

        assert_eq!(users.get_user_by_id(&user.id).await.unwrap(), user);
        assert_eq!(users.get_user_by_username("alice").await.unwrap(), user);
        assert_eq!(
            store.zscore(&keys::usernames_by_id(), "alice").await.unwrap(),
            ids::to_score(&user.id)
        );
        // 락은 해제되어 있어야 한다
        assert_eq!(store.get(&keys::lock_key(&keys::usernames())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_taken_username() {
        let store = MemoryStore::new();
        let users = repository(&store);
        users.create_user(attrs("alice")).await.unwrap();

        assert!(matches!(
            users.create_user(attrs("alice")).await,
            Err(AuctionError::UsernameTaken(name)) if name == "alice"
        ));
        assert_eq!(store.smembers(&keys::usernames()).await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn concurrent_signups_for_one_name_admit_one() {
        let store = MemoryStore::with_latency(std::time::Duration::from_millis(2));
        let users = repository(&store);

        let (first, second) = tokio::join!(
            users.create_user(attrs("bob")),
            users.create_user(attrs("bob"))
        );
        let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1);
        assert!(matches!(
            (first, second),
            (Err(AuctionError::UsernameTaken(_)), Ok(_)) | (Ok(_), Err(AuctionError::UsernameTaken(_)))
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let users = repository(&MemoryStore::new());
        assert!(matches!(
            users.get_user_by_username("nobody").await,
            Err(AuctionError::UserNotFound(_))
        ));
        assert!(matches!(
            users.get_user_by_id("000000000000").await,
            Err(AuctionError::UserNotFound(_))
        ));
    }
}
// endregion: --- Tests
