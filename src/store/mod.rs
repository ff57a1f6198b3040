/// 저장소 추상화
/// 키 단위 원자성과 몇 가지 다중 키 원시 연산(조건부 생성, WATCH/EXEC, 스크립트)만 제공하는
/// 네트워크 키-값 저장소를 표현한다.
// region:    --- Imports
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub mod memory_store;
pub mod redis_store;
pub mod scripts;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use scripts::AtomicScript;
// endregion: --- Imports

// region:    --- Store Error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("저장소 요청 실패: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("저장소 연결이 종료되었습니다.")]
    Disconnected,

    #[error("키 {0}의 자료형이 맞지 않습니다.")]
    WrongType(String),

    #[error("레코드 {key} 해석 실패: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("스크립트 {script:?} 호출 인자 오류: {reason}")]
    InvalidScriptCall { script: AtomicScript, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
// endregion: --- Store Error

// region:    --- Queries
/// 정렬 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 점수 범위 조회 조건
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub order: SortOrder,
    pub offset: usize,
    pub count: usize,
}

impl ScoreRange {
    /// 전체 점수 범위
    pub fn all(order: SortOrder, offset: usize, count: usize) -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            order,
            offset,
            count,
        }
    }
}

/// 전문 검색 결과 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub fields: HashMap<String, String>,
}
// endregion: --- Queries

// region:    --- Write Batch
/// 배치에 담기는 쓰기 명령
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// 해시 필드 병합
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// 정렬 집합 추가/갱신
    SortedSetAdd { key: String, member: String, score: f64 },
    /// 집합 추가
    SetAdd { key: String, member: String },
    /// 리스트 끝에 추가
    ListPush { key: String, value: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::HashSet { key, .. }
            | WriteOp::SortedSetAdd { key, .. }
            | WriteOp::SetAdd { key, .. }
            | WriteOp::ListPush { key, .. } => key,
        }
    }
}

/// 하나의 원자 단위로 커밋되는 쓰기 묶음
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_set(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.ops.push(WriteOp::HashSet {
            key: key.into(),
            fields,
        });
        self
    }

    pub fn sorted_set_add(
        &mut self,
        key: impl Into<String>,
        member: impl Into<String>,
        score: f64,
    ) -> &mut Self {
        self.ops.push(WriteOp::SortedSetAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn list_push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::ListPush {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
// endregion: --- Write Batch

// region:    --- Store Trait
/// 저장소 트레이트
#[async_trait]
pub trait Store: Send + Sync {
    /// 해시 레코드 전체 조회 (없으면 빈 맵)
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// 점수 범위 조회 (member, score)
    async fn zrange_by_score(&self, key: &str, range: &ScoreRange) -> StoreResult<Vec<(String, f64)>>;

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn sinter(&self, keys: &[String]) -> StoreResult<Vec<String>>;

    /// 인덱스 범위 조회, 음수는 끝에서부터
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 순 방문자 추정치
    async fn pfcount(&self, key: &str) -> StoreResult<u64>;

    /// 키가 없을 때만 생성하고 ttl 이후 자동 삭제
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// 배치를 하나의 원자 단위로 적용
    async fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// 사전 등록된 스크립트를 다른 연산과 섞이지 않게 실행
    async fn run_script(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64>;

    /// 키 감시 시작
    async fn watch(&self, keys: &[String]) -> StoreResult<Box<dyn WatchSession>>;
}

/// 감시 세션
/// 감시 시작 이후 감시 키가 바뀌지 않았을 때만 배치가 커밋된다.
#[async_trait]
pub trait WatchSession: Send {
    async fn hgetall(&mut self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// 커밋 성공 시 true, 감시 키가 변경되어 버려졌으면 false
    async fn commit(&mut self, batch: WriteBatch) -> StoreResult<bool>;

    async fn discard(&mut self) -> StoreResult<()>;
}

/// 외부 전문 검색 기능
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, index: &str, query: &str, limit: usize) -> StoreResult<Vec<SearchHit>>;
}
// endregion: --- Store Trait

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keeps_staging_order() {
        let mut batch = WriteBatch::new();
        batch
            .list_push("l", "1:2")
            .hash_set("h", vec![("price".into(), "1".into())])
            .sorted_set_add("z", "m", 1.0);

        assert_eq!(batch.len(), 3);
        let keys: Vec<_> = batch.ops().iter().map(WriteOp::key).collect();
        assert_eq!(keys, vec!["l", "h", "z"]);
    }
}
