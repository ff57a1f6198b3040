/// 분산 락
/// 조건부 생성(SET NX PX) 키로 상호 배제를 얻고, TTL로 죽은 보유자를 회수한다.
/// TTL은 생존성 보장 장치일 뿐이므로 임계 구역은 쓰기 전에 반드시 신호를 확인해야 한다.
// region:    --- Imports
use crate::error::AuctionError;
use crate::ids;
use crate::keys;
use crate::store::{AtomicScript, Store};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Options
/// 락 TTL
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_millis(2000);
/// 재시도 간격
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// 최대 시도 횟수
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    pub ttl: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_LOCK_TTL,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
// endregion: --- Options

// region:    --- Lock Signal
/// 락 생존 신호
/// TTL이 지나면 저장소가 이미 락 키를 지웠고 다른 호출자가 락을 가졌을 수 있다.
#[derive(Debug, Clone)]
pub struct LockSignal {
    resource: String,
    expires_at: Instant,
}

impl LockSignal {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// 만료되었으면 `LockExpired`
    pub fn ensure_live(&self) -> Result<(), AuctionError> {
        if self.is_expired() {
            warn!("{:<12} --> 락 만료 후 쓰기 시도 차단: {}", "Lock", self.resource);
            return Err(AuctionError::LockExpired(self.resource.clone()));
        }
        Ok(())
    }
}
// endregion: --- Lock Signal

// region:    --- Lock Manager
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn Store>,
    options: LockOptions,
}

impl LockManager {
    pub fn new(store: Arc<dyn Store>, options: LockOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// 락을 잡고 임계 구역 실행
    /// 락을 얻지 못하면 임계 구역은 실행되지 않는다.
    /// 임계 구역의 성공/실패와 관계없이 해제를 시도한 뒤 결과를 그대로 돌려준다.
    pub async fn with_lock<F, Fut, R>(&self, resource_key: &str, critical_section: F) -> Result<R, AuctionError>
    where
        F: FnOnce(LockSignal) -> Fut,
        Fut: Future<Output = Result<R, AuctionError>>,
    {
        let lock_key = keys::lock_key(resource_key);
        let token = ids::lock_token();

        let signal = self.acquire(&lock_key, &token).await?;
        let result = critical_section(signal).await;
        self.release(&lock_key, &token).await;
        result
    }

    /// 락 획득 (고정 간격 재시도)
    async fn acquire(&self, lock_key: &str, token: &str) -> Result<LockSignal, AuctionError> {
        for attempt in 1..=self.options.max_attempts {
            let started_at = Instant::now();
            if self
                .store
                .set_if_absent(lock_key, token, self.options.ttl)
                .await?
            {
                debug!("{:<12} --> 락 획득: {} ({}회)", "Lock", lock_key, attempt);
                return Ok(LockSignal {
                    resource: lock_key.to_string(),
                    expires_at: started_at + self.options.ttl,
                });
            }
            if attempt < self.options.max_attempts {
                sleep(self.options.retry_delay).await;
            }
        }

        warn!(
            "{:<12} --> 락 획득 실패: {} ({}회 시도)",
            "Lock", lock_key, self.options.max_attempts
        );
        Err(AuctionError::LockAcquisitionTimeout {
            resource: lock_key.to_string(),
            attempts: self.options.max_attempts,
        })
    }

    /// 토큰이 일치할 때만 삭제
    async fn release(&self, lock_key: &str, token: &str) {
        let released = self
            .store
            .run_script(
                AtomicScript::ReleaseLock,
                &[lock_key.to_string()],
                &[token.to_string()],
            )
            .await;
        match released {
            Ok(1) => debug!("{:<12} --> 락 해제: {}", "Lock", lock_key),
            Ok(_) => info!(
                "{:<12} --> 락이 이미 만료되어 다른 보유자의 락은 유지: {}",
                "Lock", lock_key
            ),
            Err(e) => warn!("{:<12} --> 락 해제 실패 (TTL로 회수됨): {:?}", "Lock", e),
        }
    }
}
// endregion: --- Lock Manager

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn manager(store: &MemoryStore, options: LockOptions) -> LockManager {
        LockManager::new(Arc::new(store.clone()), options)
    }

    fn fast_options(ttl_ms: u64, attempts: u32) -> LockOptions {
        LockOptions {
            ttl: Duration::from_millis(ttl_ms),
            retry_delay: Duration::from_millis(5),
            max_attempts: attempts,
        }
    }

    #[test]
    fn default_options_match_protocol() {
        let options = LockOptions::default();
        assert_eq!(options.ttl, Duration::from_millis(2000));
        assert_eq!(options.retry_delay, Duration::from_millis(100));
        assert_eq!(options.max_attempts, 20);
    }

    #[tokio::test]
    async fn runs_critical_section_and_releases() {
        let store = MemoryStore::new();
        let locks = manager(&store, LockOptions::default());
        let resource = keys::item("i1");

        let value = locks
            .with_lock(&resource, |signal| async move {
                signal.ensure_live()?;
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(store.get(&keys::lock_key(&resource)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn releases_after_critical_section_error() {
        let store = MemoryStore::new();
        let locks = manager(&store, LockOptions::default());
        let resource = keys::item("i1");

        let result: Result<(), _> = locks
            .with_lock(&resource, |_| async move { Err(AuctionError::ItemNotFound("i1".into())) })
            .await;

        assert!(matches!(result, Err(AuctionError::ItemNotFound(_))));
        assert_eq!(store.get(&keys::lock_key(&resource)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn gives_up_without_entering_critical_section() {
        let store = MemoryStore::new();
        let resource = keys::item("i1");
        store
            .set_if_absent(&keys::lock_key(&resource), "holder", Duration::from_secs(10))
            .await
            .unwrap();

        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let locks = manager(&store, fast_options(2000, 3));
        let result = locks
            .with_lock(&resource, |_| async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(AuctionError::LockAcquisitionTimeout { attempts: 3, .. })
        ));
        assert!(!entered.load(Ordering::SeqCst));
        assert_eq!(
            store.get(&keys::lock_key(&resource)).await.unwrap().as_deref(),
            Some("holder")
        );
    }

    #[tokio::test]
    async fn waits_for_holder_to_expire() {
        let store = MemoryStore::new();
        let resource = keys::item("i1");
        store
            .set_if_absent(&keys::lock_key(&resource), "holder", Duration::from_millis(30))
            .await
            .unwrap();

        let locks = manager(&store, fast_options(2000, 50));
        let result = locks.with_lock(&resource, |_| async move { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn expired_holder_does_not_release_new_holders_lock() {
        let store = MemoryStore::new();
        let resource = keys::item("i1");
        let lock_key = keys::lock_key(&resource);
        let locks = manager(&store, fast_options(40, 1));

        let intruder_store = store.clone();
        let intruder_key = lock_key.clone();
        let result: Result<(), _> = locks
            .with_lock(&resource, |signal| async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                // TTL이 지나 다른 호출자가 락을 잡은 상황
                let acquired = intruder_store
                    .set_if_absent(&intruder_key, "intruder", Duration::from_secs(5))
                    .await?;
                assert!(acquired);
                signal.ensure_live()
            })
            .await;

        assert!(matches!(result, Err(AuctionError::LockExpired(_))));
        assert_eq!(store.get(&lock_key).await.unwrap().as_deref(), Some("intruder"));
    }
}
// endregion: --- Tests
