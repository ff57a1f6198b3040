/// 상품 저장소
/// 상품 레코드와 세 랭킹 항목(조회수, 가격, 마감 시각)은 항상 하나의 원자 배치로 함께 쓰인다.
// region:    --- Imports
use crate::bidding::model::{CreateItemAttrs, Item, MAX_EXACT_AMOUNT};
use crate::error::AuctionError;
use crate::ids;
use crate::keys;
use crate::store::{Store, WriteBatch};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub mod likes;

pub use likes::LikeRepository;
// endregion: --- Imports

/// 새 상품 상태
pub const STATUS_ACTIVE: &str = "ACTIVE";

// region:    --- Item Repository
#[derive(Clone)]
pub struct ItemRepository {
    store: Arc<dyn Store>,
}

impl ItemRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 상품 생성
    pub async fn create_item(&self, attrs: CreateItemAttrs) -> Result<Item, AuctionError> {
        if attrs.price > MAX_EXACT_AMOUNT {
            return Err(AuctionError::AmountOutOfRange {
                amount: attrs.price,
                max: MAX_EXACT_AMOUNT,
            });
        }
        let item = Item {
            id: ids::generate(),
            name: attrs.name,
            description: attrs.description,
            owner_id: attrs.owner_id,
            highest_bid_user_id: String::new(),
            price: attrs.price,
            views: 0,
            likes: 0,
            bids: 0,
            // 저장 정밀도(밀리초)에 맞춘다
            created_at: Utc::now().trunc_subsecs(3),
            ending_at: attrs.ending_at.trunc_subsecs(3),
            image_url: attrs.image_url,
            status: STATUS_ACTIVE.to_string(),
        };

        self.store.apply(stage_new_item(&item)).await?;
        info!("{:<12} --> 상품 생성: {} ({})", "Item", item.id, item.name);
        Ok(item)
    }

    /// 단일 상품 조회
    pub async fn get_item(&self, id: &str) -> Result<Item, AuctionError> {
        debug!("{:<12} --> 상품 조회 id: {}", "Item", id);
        self.find_item(id)
            .await?
            .ok_or_else(|| AuctionError::ItemNotFound(id.to_string()))
    }

    /// 여러 상품 조회 (없는 아이디는 건너뜀, 요청 순서 유지)
    pub async fn get_items(&self, ids: &[String]) -> Result<Vec<Item>, AuctionError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.find_item(id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// 사용자가 등록한 상품
    pub async fn items_by_owner(&self, owner_id: &str) -> Result<Vec<Item>, AuctionError> {
        let ids = self.store.smembers(&keys::user_items(owner_id)).await?;
        self.get_items(&ids).await
    }

    async fn find_item(&self, id: &str) -> Result<Option<Item>, AuctionError> {
        let fields = self.store.hgetall(&keys::item(id)).await?;
        Ok(Item::from_record(id, &fields)?)
    }
}

/// 상품 레코드 + 랭킹 세 건 + 소유자 상품 집합
fn stage_new_item(item: &Item) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch
        .hash_set(keys::item(&item.id), item.to_record())
        .sorted_set_add(keys::items_by_views(), item.id.clone(), item.views as f64)
        .sorted_set_add(keys::items_by_price(), item.id.clone(), item.price as f64)
        .sorted_set_add(
            keys::items_by_ending_at(),
            item.id.clone(),
            item.ending_at.timestamp_millis() as f64,
        )
        .set_add(keys::user_items(&item.owner_id), item.id.clone());
    batch
}
// endregion: --- Item Repository

// endregion: --- Tests
