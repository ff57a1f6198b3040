// region:    --- Imports
use crate::bidding::model::Item;
use crate::error::AuctionError;
use crate::keys;
use crate::store::{AtomicScript, Store};
use std::sync::Arc;
use tracing::info;

use super::ItemRepository;

// endregion: --- Imports

// region:    --- Like Repository
/// 좋아요
/// 집합 멤버십이 실제로 바뀐 경우에만 상품의 likes 필드를 조정한다. (스크립트 한 번으로 처리)
#[derive(Clone)]
pub struct LikeRepository {
    store: Arc<dyn Store>,
    items: ItemRepository,
}

impl LikeRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            items: ItemRepository::new(Arc::clone(&store)),
            store,
        }
    }

    /// 좋아요 추가, 상태가 바뀌었으면 true
    pub async fn like_item(&self, item_id: &str, user_id: &str) -> Result<bool, AuctionError> {
        self.toggle(AtomicScript::LikeItem, item_id, user_id).await
    }

    /// 좋아요 취소, 상태가 바뀌었으면 true
    pub async fn unlike_item(&self, item_id: &str, user_id: &str) -> Result<bool, AuctionError> {
        self.toggle(AtomicScript::UnlikeItem, item_id, user_id).await
    }

    async fn toggle(
        &self,
        script: AtomicScript,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, AuctionError> {
        let changed = self
            .store
            .run_script(
                script,
                &[keys::user_likes(user_id), keys::item(item_id)],
                &[item_id.to_string()],
            )
            .await?;
        match changed {
            -1 => Err(AuctionError::ItemNotFound(item_id.to_string())),
            0 => Ok(false),
            _ => {
                info!("{:<12} --> {:?}: {} / {}", "Like", script, user_id, item_id);
                Ok(true)
            }
        }
    }

    pub async fn user_likes_item(&self, item_id: &str, user_id: &str) -> Result<bool, AuctionError> {
        Ok(self
            .store
            .sismember(&keys::user_likes(user_id), item_id)
            .await?)
    }

    /// 사용자가 좋아요한 상품
    pub async fn liked_items(&self, user_id: &str) -> Result<Vec<Item>, AuctionError> {
        let ids = self.store.smembers(&keys::user_likes(user_id)).await?;
        self.items.get_items(&ids).await
    }

    /// 모든 사용자가 공통으로 좋아요한 상품
    pub async fn common_liked_items(&self, user_ids: &[String]) -> Result<Vec<Item>, AuctionError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let like_keys: Vec<String> = user_ids.iter().map(|id| keys::user_likes(id)).collect();
        let ids = self.store.sinter(&like_keys).await?;
        self.items.get_items(&ids).await
    }
}
// endregion: --- Like Repository

// endregion: --- Tests
