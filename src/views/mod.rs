/// 순 방문자 조회수
/// 방문자 추정기 추가, 조회수 필드 증가, 조회수 랭킹 증가를 스크립트 한 번으로 처리한다.
/// 같은 (상품, 방문자) 쌍은 한 번만 집계된다.
// region:    --- Imports
use crate::error::AuctionError;
use crate::keys;
use crate::store::{AtomicScript, Store};
use std::sync::Arc;
use tracing::debug;

// endregion: --- Imports

#[derive(Clone)]
pub struct ViewCounter {
    store: Arc<dyn Store>,
}

impl ViewCounter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 조회 기록, 새 방문자로 집계되었으면 true
    pub async fn record_view(&self, item_id: &str, viewer_id: &str) -> Result<bool, AuctionError> {
        let counted = self
            .store
            .run_script(
                AtomicScript::IncrementView,
                &[
                    keys::item_views(item_id),
                    keys::item(item_id),
                    keys::items_by_views(),
                ],
                &[item_id.to_string(), viewer_id.to_string()],
            )
            .await?;

        match counted {
            -1 => Err(AuctionError::ItemNotFound(item_id.to_string())),
            0 => Ok(false),
            _ => {
                debug!("{:<12} --> 새 방문자 집계: {} / {}", "View", item_id, viewer_id);
                Ok(true)
            }
        }
    }

    /// 추정 순 방문자 수
    pub async fn unique_viewers(&self, item_id: &str) -> Result<u64, AuctionError> {
        Ok(self.store.pfcount(&keys::item_views(item_id)).await?)
    }
}

// endregion: --- Tests
