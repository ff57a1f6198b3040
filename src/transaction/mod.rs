/// 낙관적 트랜잭션 실행기
/// 감시 키 지정 -> 현재 상태 조회 -> 쓰기 배치 계산 -> 제출
/// 감시 키가 그 사이 바뀌었으면 배치 전체가 버려지고 `WriteConflict`를 돌려준다.
/// 재시도 정책은 호출자 책임이다.
// region:    --- Imports
use crate::error::AuctionError;
use crate::store::{Store, StoreError, WatchSession, WriteBatch};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Watched Transaction
/// 감시 중인 트랜잭션 (읽기 전용 핸들)
pub struct WatchedTransaction {
    session: Box<dyn WatchSession>,
}

impl WatchedTransaction {
    pub async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.session.hgetall(key).await
    }
}
// endregion: --- Watched Transaction

// region:    --- Optimistic Executor
#[derive(Clone)]
pub struct OptimisticExecutor {
    store: Arc<dyn Store>,
}

impl OptimisticExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 트랜잭션 실행
    /// 클로저가 오류를 돌려주면 감시를 해제하고 아무것도 쓰지 않는다.
    pub async fn execute<F, R>(&self, watch_keys: &[String], f: F) -> Result<R, AuctionError>
    where
        F: for<'c> FnOnce(
            &'c mut WatchedTransaction,
        ) -> Pin<
            Box<dyn Future<Output = Result<(WriteBatch, R), AuctionError>> + Send + 'c>,
        >,
    {
        let session = self.store.watch(watch_keys).await?;
        let mut tx = WatchedTransaction { session };

        match f(&mut tx).await {
            Ok((batch, value)) => {
                let staged = batch.len();
                if tx.session.commit(batch).await? {
                    debug!("{:<12} --> 커밋 성공: {}건", "Transaction", staged);
                    Ok(value)
                } else {
                    warn!(
                        "{:<12} --> 낙관적 업데이트 충돌: {:?}",
                        "Transaction", watch_keys
                    );
                    Err(AuctionError::WriteConflict)
                }
            }
            Err(e) => {
                if let Err(discard_err) = tx.session.discard().await {
                    warn!("{:<12} --> 감시 해제 실패: {:?}", "Transaction", discard_err);
                }
                Err(e)
            }
        }
    }
}
// endregion: --- Optimistic Executor

// endregion: --- Tests
