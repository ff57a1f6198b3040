// region:    --- Imports
use crate::bidding::BidRepository;
use crate::items::{ItemRepository, LikeRepository};
use crate::lock::{LockManager, LockOptions};
use crate::query::{ItemSearch, RankingQueries};
use crate::store::{SearchIndex, Store};
use crate::users::{SessionRepository, UserRepository};
use crate::views::ViewCounter;
use std::sync::Arc;

// endregion: --- Imports

/// 핸들러 공유 상태
/// 저장소 연결은 여기서 한 번 만들어 모든 저장소 객체에 주입한다.
#[derive(Clone)]
pub struct AppState {
    pub items: ItemRepository,
    pub bids: BidRepository,
    pub likes: LikeRepository,
    pub views: ViewCounter,
    pub rankings: RankingQueries,
    pub search: ItemSearch,
    pub users: UserRepository,
    pub sessions: SessionRepository,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, index: Arc<dyn SearchIndex>, lock_options: LockOptions) -> Self {
        let locks = LockManager::new(Arc::clone(&store), lock_options);
        Self {
            items: ItemRepository::new(Arc::clone(&store)),
            bids: BidRepository::new(Arc::clone(&store), locks.clone()),
            likes: LikeRepository::new(Arc::clone(&store)),
            views: ViewCounter::new(Arc::clone(&store)),
            rankings: RankingQueries::new(Arc::clone(&store)),
            search: ItemSearch::new(index),
            users: UserRepository::new(Arc::clone(&store), locks),
            sessions: SessionRepository::new(store),
        }
    }
}
