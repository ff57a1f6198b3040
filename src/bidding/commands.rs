/// 입찰 관련 커맨드 처리
/// 1. 입찰 (낙관적 감시, 기본 경로)
/// 2. 입찰 (분산 락, 대안 경로)
/// 3. 입찰 이력 조회
///
/// 입찰이 받아들여지면 다음 세 쓰기가 하나의 원자 단위로 적용된다.
/// - 상품 입찰 이력 리스트에 입찰 추가
/// - 상품 레코드 갱신 (bids + 1, price, highestBidUserId)
/// - 가격 랭킹 점수 갱신
// region:    --- Imports
use super::model::{Bid, Item, MAX_EXACT_AMOUNT};
use crate::error::AuctionError;
use crate::keys;
use crate::lock::LockManager;
use crate::store::{Store, WriteBatch};
use crate::transaction::OptimisticExecutor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
/// created_at은 요청 계층이 접수 시각으로 찍으며, 마감 여부 판단에도 이 시각을 쓴다.
/// amount는 가격 랭킹 점수(f64)로 정확히 표현되는 `MAX_EXACT_AMOUNT` 이하여야 한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub item_id: String,
    pub user_id: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// 검증 순서: 금액 -> 마감 시각 (상품 존재 여부는 호출 전에 확인)
fn validate_bid(item: &Item, cmd: &PlaceBidCommand) -> Result<(), AuctionError> {
    if cmd.amount > MAX_EXACT_AMOUNT {
        return Err(AuctionError::AmountOutOfRange {
            amount: cmd.amount,
            max: MAX_EXACT_AMOUNT,
        });
    }
    if cmd.amount <= item.price {
        return Err(AuctionError::BidTooLow {
            amount: cmd.amount,
            price: item.price,
        });
    }
    if cmd.created_at >= item.ending_at {
        return Err(AuctionError::AuctionClosed(item.id.clone()));
    }
    Ok(())
}

/// 입찰 쓰기 세 건을 배치로 구성
fn stage_bid(item: &Item, cmd: &PlaceBidCommand, bid: &Bid) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch
        .list_push(keys::item_bids(&item.id), bid.encode())
        .hash_set(
            keys::item(&item.id),
            vec![
                ("bids".to_string(), (item.bids + 1).to_string()),
                ("price".to_string(), cmd.amount.to_string()),
                ("highestBidUserId".to_string(), cmd.user_id.clone()),
            ],
        )
        .sorted_set_add(keys::items_by_price(), item.id.clone(), cmd.amount as f64);
    batch
}

fn checked_bid(
    cmd: &PlaceBidCommand,
    fields: &std::collections::HashMap<String, String>,
) -> Result<(Item, Bid), AuctionError> {
    let item = Item::from_record(&cmd.item_id, fields)?
        .ok_or_else(|| AuctionError::ItemNotFound(cmd.item_id.clone()))?;
    validate_bid(&item, cmd)?;
    let bid = Bid {
        amount: cmd.amount,
        created_at: cmd.created_at,
    };
    Ok((item, bid))
}
// endregion: --- Commands

// region:    --- Bid Repository
#[derive(Clone)]
pub struct BidRepository {
    store: Arc<dyn Store>,
    executor: OptimisticExecutor,
    locks: LockManager,
}

impl BidRepository {
    pub fn new(store: Arc<dyn Store>, locks: LockManager) -> Self {
        Self {
            executor: OptimisticExecutor::new(Arc::clone(&store)),
            store,
            locks,
        }
    }

    /// 1. 입찰
    /// 상품 레코드를 감시한 채로 검증하고, 그 사이 상품이 바뀌었으면 `WriteConflict`
    pub async fn place_bid(&self, cmd: PlaceBidCommand) -> Result<Bid, AuctionError> {
        info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);
        let item_key = keys::item(&cmd.item_id);

        let result = self
            .executor
            .execute(&[item_key.clone()], move |tx| {
                Box::pin(async move {
                    let fields = tx.hgetall(&item_key).await?;
                    let (item, bid) = checked_bid(&cmd, &fields)?;
                    Ok((stage_bid(&item, &cmd, &bid), bid))
                })
            })
            .await;

        log_outcome(&result);
        result
    }

    /// 충돌 시 최신 상태로 다시 검증하며 재시도
    /// 도메인 거절은 즉시 돌려주고, 재시도 횟수를 넘기면 마지막 충돌을 돌려준다.
    pub async fn place_bid_with_retry(
        &self,
        cmd: PlaceBidCommand,
        max_retries: u32,
    ) -> Result<Bid, AuctionError> {
        let mut retries = 0;
        loop {
            match self.place_bid(cmd.clone()).await {
                Err(AuctionError::WriteConflict) if retries < max_retries => {
                    retries += 1;
                    warn!(
                        "{:<12} --> 낙관적 업데이트로 인한 충돌: 재시도 ({}/{})",
                        "Command", retries, max_retries
                    );
                }
                outcome => return outcome,
            }
        }
    }

    /// 2. 입찰 (락 기반)
    /// 상품 키의 락 안에서 검증하고, 쓰기 직전에 락 생존 여부를 확인한다.
    pub async fn place_bid_with_lock(&self, cmd: PlaceBidCommand) -> Result<Bid, AuctionError> {
        info!("{:<12} --> 락 기반 입찰 요청 처리 시작: {:?}", "Command", cmd);
        let resource_key = keys::item(&cmd.item_id);
        let item_key = resource_key.clone();
        let store = Arc::clone(&self.store);

        let result = self
            .locks
            .with_lock(&resource_key, |signal| async move {
                let fields = store.hgetall(&item_key).await?;
                let (item, bid) = checked_bid(&cmd, &fields)?;
                let batch = stage_bid(&item, &cmd, &bid);
                signal.ensure_live()?;
                store.apply(batch).await?;
                Ok(bid)
            })
            .await;

        log_outcome(&result);
        result
    }

    /// 3. 입찰 이력 조회
    /// 가장 최근 offset건을 건너뛴 뒤 count건, 오래된 순
    pub async fn get_bid_history(
        &self,
        item_id: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Bid>, AuctionError> {
        info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", item_id);
        let Some((start, stop)) = history_range(offset, count) else {
            return Ok(Vec::new());
        };
        let key = keys::item_bids(item_id);
        let entries = self.store.lrange(&key, start, stop).await?;
        let bids = entries
            .iter()
            .map(|raw| Bid::decode(&key, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bids)
    }
}

/// 최근 기준 (offset, count) -> 리스트 음수 인덱스 (start, stop)
/// 빈 페이지이거나 인덱스로 표현할 수 없으면 None
fn history_range(offset: usize, count: usize) -> Option<(isize, isize)> {
    if count == 0 {
        return None;
    }
    let end = isize::try_from(offset.checked_add(count)?).ok()?;
    let offset = isize::try_from(offset).ok()?;
    Some((end.checked_neg()?, (-1isize).checked_sub(offset)?))
}

fn log_outcome(result: &Result<Bid, AuctionError>) {
    match result {
        Ok(bid) => info!("{:<12} --> 입찰 성공: 현재 가격 {}", "Command", bid.amount),
        Err(e) => warn!("{:<12} --> 입찰 실패: {}", "Command", e),
    }
}
// endregion: --- Bid Repository

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::model::from_millis;
    use crate::store::WriteOp;
    use chrono::Duration;

    fn item(price: i64) -> Item {
        let created_at = from_millis(0).unwrap();
        Item {
            id: "i1".into(),
            name: "n".into(),
            description: String::new(),
            owner_id: "o".into(),
            highest_bid_user_id: String::new(),
            price,
            views: 0,
            likes: 0,
            bids: 2,
            created_at,
            ending_at: created_at + Duration::seconds(60),
            image_url: String::new(),
            status: "ACTIVE".into(),
        }
    }

    fn cmd(amount: i64, at_secs: i64) -> PlaceBidCommand {
        PlaceBidCommand {
            item_id: "i1".into(),
            user_id: "u1".into(),
            amount,
            created_at: from_millis(at_secs * 1000).unwrap(),
        }
    }

    #[test]
    fn low_bid_is_checked_before_closing_time() {
        assert!(matches!(
            validate_bid(&item(10), &cmd(10, 61)),
            Err(AuctionError::BidTooLow { amount: 10, price: 10 })
        ));
        assert!(matches!(
            validate_bid(&item(10), &cmd(11, 60)),
            Err(AuctionError::AuctionClosed(_))
        ));
        assert!(validate_bid(&item(10), &cmd(11, 59)).is_ok());
    }

    #[test]
    fn history_range_handles_empty_and_oversized_pages() {
        assert_eq!(history_range(0, 2), Some((-2, -1)));
        assert_eq!(history_range(2, 2), Some((-4, -3)));
        assert_eq!(history_range(0, 0), None);
        assert_eq!(history_range(usize::MAX, 10), None);
        assert_eq!(history_range(1usize << 63, 10), None);
        assert_eq!(history_range(isize::MAX as usize, 1), None);
        assert_eq!(
            history_range(isize::MAX as usize - 1, 1),
            Some((-isize::MAX, -isize::MAX))
        );
    }

    #[test]
    fn amounts_up_to_exact_score_limit_keep_their_ranking_score() {
        let item = item(10);
        let command = cmd(MAX_EXACT_AMOUNT, 1);
        let bid = Bid {
            amount: MAX_EXACT_AMOUNT,
            created_at: command.created_at,
        };
        let batch = stage_bid(&item, &command, &bid);
        let score = batch.ops().iter().find_map(|op| match op {
            WriteOp::SortedSetAdd { score, .. } => Some(*score),
            _ => None,
        });
        assert_eq!(score.map(|s| s as i64), Some(MAX_EXACT_AMOUNT));
        assert!(matches!(
            validate_bid(&item, &cmd(MAX_EXACT_AMOUNT + 1, 1)),
            Err(AuctionError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn stages_exactly_three_writes() {
        let item = item(10);
        let cmd = cmd(20, 1);
        let bid = Bid {
            amount: 20,
            created_at: cmd.created_at,
        };
        let batch = stage_bid(&item, &cmd, &bid);
        let keys: Vec<_> = batch.ops().iter().map(|op| op.key().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                keys::item_bids("i1"),
                keys::item("i1"),
                keys::items_by_price()
            ]
        );
    }
}
// endregion: --- Tests
