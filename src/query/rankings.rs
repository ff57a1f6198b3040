// region:    --- Imports
use crate::error::AuctionError;
use crate::keys;
use crate::store::{ScoreRange, SortOrder, Store};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Rankings
/// 랭킹 인덱스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Price,
    Views,
    EndingAt,
}

impl Ranking {
    pub fn key(&self) -> String {
        match self {
            Ranking::Price => keys::items_by_price(),
            Ranking::Views => keys::items_by_views(),
            Ranking::EndingAt => keys::items_by_ending_at(),
        }
    }
}

/// 랭킹 조회 결과 (상세 정보는 호출자가 상품 레코드로 조회)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub id: String,
    pub score: f64,
}
// endregion: --- Rankings

// region:    --- Ranking Queries
/// 랭킹 조회
/// 같은 점수끼리의 순서는 저장소 기본 순서(멤버 사전순)를 따른다.
#[derive(Clone)]
pub struct RankingQueries {
    store: Arc<dyn Store>,
}

impl RankingQueries {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 가격순
    pub async fn by_price(
        &self,
        order: SortOrder,
        offset: usize,
        count: usize,
    ) -> Result<Vec<RankedItem>, AuctionError> {
        self.range(Ranking::Price, ScoreRange::all(order, offset, count))
            .await
    }

    /// 조회수순
    pub async fn by_views(
        &self,
        order: SortOrder,
        offset: usize,
        count: usize,
    ) -> Result<Vec<RankedItem>, AuctionError> {
        self.range(Ranking::Views, ScoreRange::all(order, offset, count))
            .await
    }

    /// 마감 임박순, 이미 마감된 상품은 제외
    pub async fn ending_soonest(
        &self,
        offset: usize,
        count: usize,
    ) -> Result<Vec<RankedItem>, AuctionError> {
        let range = ScoreRange {
            min: Utc::now().timestamp_millis() as f64,
            max: f64::INFINITY,
            order: SortOrder::Asc,
            offset,
            count,
        };
        self.range(Ranking::EndingAt, range).await
    }

    /// 한 상품의 랭킹 점수
    pub async fn score_of(&self, ranking: Ranking, item_id: &str) -> Result<Option<f64>, AuctionError> {
        Ok(self.store.zscore(&ranking.key(), item_id).await?)
    }

    async fn range(&self, ranking: Ranking, range: ScoreRange) -> Result<Vec<RankedItem>, AuctionError> {
        info!("{:<12} --> 랭킹 조회: {:?} {:?}", "Query", ranking, range.order);
        let entries = self.store.zrange_by_score(&ranking.key(), &range).await?;
        Ok(entries
            .into_iter()
            .map(|(id, score)| RankedItem { id, score })
            .collect())
    }
}
// endregion: --- Ranking Queries

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WriteBatch};

    async fn seeded() -> RankingQueries {
        let store = MemoryStore::new();
        let now = Utc::now().timestamp_millis() as f64;
        let mut batch = WriteBatch::new();
        batch
            .sorted_set_add(keys::items_by_price(), "a", 30.0)
            .sorted_set_add(keys::items_by_price(), "b", 10.0)
            .sorted_set_add(keys::items_by_price(), "c", 20.0)
            .sorted_set_add(keys::items_by_ending_at(), "a", now - 1_000.0)
            .sorted_set_add(keys::items_by_ending_at(), "b", now + 60_000.0)
            .sorted_set_add(keys::items_by_ending_at(), "c", now + 10_000.0);
        store.apply(batch).await.unwrap();
        RankingQueries::new(Arc::new(store))
    }

    fn ids(items: &[RankedItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[tokio::test]
    async fn price_ranking_respects_order_and_paging() {
        let rankings = seeded().await;

        let top = rankings.by_price(SortOrder::Desc, 0, 2).await.unwrap();
        assert_eq!(ids(&top), vec!["a", "c"]);
        assert_eq!(top[0].score, 30.0);

        let cheapest = rankings.by_price(SortOrder::Asc, 1, 5).await.unwrap();
        assert_eq!(ids(&cheapest), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn ending_soonest_skips_closed_items() {
        let rankings = seeded().await;
        let soon = rankings.ending_soonest(0, 10).await.unwrap();
        assert_eq!(ids(&soon), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn empty_ranking_is_empty() {
        let rankings = seeded().await;
        assert!(rankings.by_views(SortOrder::Desc, 0, 10).await.unwrap().is_empty());
        assert_eq!(rankings.score_of(Ranking::Views, "a").await.unwrap(), None);
        assert_eq!(rankings.score_of(Ranking::Price, "b").await.unwrap(), Some(10.0));
    }
}
// endregion: --- Tests
