/// 단일 프로세스 메모리 저장소
/// Redis와 같은 의미를 갖도록 키 버전(WATCH 충돌 감지), 만료 키, 스크립트를 구현한다.
/// 순 방문자 추정기는 정확한 집합으로 대신한다.
// region:    --- Imports
use super::{
    AtomicScript, ScoreRange, SearchHit, SearchIndex, SortOrder, Store, StoreError, StoreResult,
    WatchSession, WriteBatch, WriteOp,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

// endregion: --- Imports

// region:    --- State
enum Entry {
    Text {
        value: String,
        expires_at: Option<Instant>,
    },
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
    List(Vec<String>),
    Estimator(HashSet<String>),
}

macro_rules! entry_accessors {
    ($read:ident, $write:ident, $variant:ident, $ty:ty) => {
        fn $read(&self, key: &str) -> StoreResult<Option<&$ty>> {
            match self.entries.get(key) {
                None => Ok(None),
                Some(Entry::$variant(value)) => Ok(Some(value)),
                Some(_) => Err(StoreError::WrongType(key.to_string())),
            }
        }

        fn $write(&mut self, key: &str) -> StoreResult<&mut $ty> {
            match self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::$variant(Default::default()))
            {
                Entry::$variant(value) => Ok(value),
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        }
    };
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
}

impl MemoryState {
    entry_accessors!(hash, hash_mut, Hash, HashMap<String, String>);
    entry_accessors!(set, set_mut, Set, HashSet<String>);
    entry_accessors!(sorted_set, sorted_set_mut, SortedSet, HashMap<String, f64>);
    entry_accessors!(list, list_mut, List, Vec<String>);
    entry_accessors!(estimator, estimator_mut, Estimator, HashSet<String>);

    /// 키 변경 기록 (감시 세션 충돌 감지용)
    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// 만료된 문자열 키 제거
    fn expire(&mut self, key: &str) {
        let expired = matches!(
            self.entries.get(key),
            Some(Entry::Text { expires_at: Some(at), .. }) if *at <= Instant::now()
        );
        if expired {
            self.entries.remove(key);
            self.touch(key);
        }
    }

    fn hash_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.hash(key)?.map(|fields| !fields.is_empty()).unwrap_or(false))
    }

    fn hash_increment(&mut self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let fields = self.hash_mut(key)?;
        let current = match fields.get(field) {
            Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("{} 필드가 정수가 아닙니다: {}", field, raw),
            })?,
            None => 0,
        };
        let next = current + delta;
        fields.insert(field.to_string(), next.to_string());
        self.touch(key);
        Ok(next)
    }

    /// 배치 적용 전 자료형 검사 (부분 적용 방지)
    fn check_types(&self, batch: &WriteBatch) -> StoreResult<()> {
        for op in batch.ops() {
            match op {
                WriteOp::HashSet { key, .. } => {
                    self.hash(key)?;
                }
                WriteOp::SortedSetAdd { key, .. } => {
                    self.sorted_set(key)?;
                }
                WriteOp::SetAdd { key, .. } => {
                    self.set(key)?;
                }
                WriteOp::ListPush { key, .. } => {
                    self.list(key)?;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: &WriteBatch) -> StoreResult<()> {
        self.check_types(batch)?;
        for op in batch.ops() {
            match op {
                WriteOp::HashSet { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    self.hash_mut(key)?.extend(fields.iter().cloned());
                }
                WriteOp::SortedSetAdd { key, member, score } => {
                    self.sorted_set_mut(key)?.insert(member.clone(), *score);
                }
                WriteOp::SetAdd { key, member } => {
                    self.set_mut(key)?.insert(member.clone());
                }
                WriteOp::ListPush { key, value } => {
                    self.list_mut(key)?.push(value.clone());
                }
            }
            self.touch(op.key());
        }
        Ok(())
    }

    fn run_script(&mut self, script: AtomicScript, keys: &[String], args: &[String]) -> StoreResult<i64> {
        if keys.len() != script.key_count() || args.len() != script.arg_count() {
            return Err(StoreError::InvalidScriptCall {
                script,
                reason: format!("키 {}개, 인자 {}개", keys.len(), args.len()),
            });
        }

        match script {
            AtomicScript::IncrementView => {
                let (viewers, record, ranking) = (&keys[0], &keys[1], &keys[2]);
                if !self.hash_exists(record)? {
                    return Ok(-1);
                }
                self.sorted_set(ranking)?;
                if !self.estimator_mut(viewers)?.insert(args[1].clone()) {
                    return Ok(0);
                }
                self.touch(viewers);
                self.hash_increment(record, "views", 1)?;
                *self
                    .sorted_set_mut(ranking)?
                    .entry(args[0].clone())
                    .or_insert(0.0) += 1.0;
                self.touch(ranking);
                Ok(1)
            }
            AtomicScript::ReleaseLock => {
                let key = &keys[0];
                self.expire(key);
                let owned = matches!(
                    self.entries.get(key),
                    Some(Entry::Text { value, .. }) if *value == args[0]
                );
                if !owned {
                    return Ok(0);
                }
                self.entries.remove(key);
                self.touch(key);
                Ok(1)
            }
            AtomicScript::LikeItem | AtomicScript::UnlikeItem => {
                let (likes, record) = (&keys[0], &keys[1]);
                if !self.hash_exists(record)? {
                    return Ok(-1);
                }
                let members = self.set_mut(likes)?;
                let changed = if script == AtomicScript::LikeItem {
                    members.insert(args[0].clone())
                } else {
                    members.remove(&args[0])
                };
                if !changed {
                    return Ok(0);
                }
                self.touch(likes);
                let delta = if script == AtomicScript::LikeItem { 1 } else { -1 };
                self.hash_increment(record, "likes", delta)?;
                Ok(1)
            }
        }
    }
}

/// Redis LRANGE 인덱스 규칙
fn list_range(list: &[String], start: isize, stop: isize) -> Vec<String> {
    let len = list.len() as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    list[start as usize..=stop as usize].to_vec()
}

/// 검색 쿼리에서 `%term%` 토큰 추출
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split('%')
        .skip(1)
        .step_by(2)
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
// endregion: --- State

// region:    --- Memory Store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 요청 앞에 왕복 지연을 넣는다. (동시성 시나리오 재현용)
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Arc::default(),
            latency: Some(latency),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    async fn round_trip(&self) {
        pause(self.latency).await;
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn pause(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.round_trip().await;
        let state = self.state();
        Ok(state.hash(key)?.cloned().unwrap_or_default())
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.round_trip().await;
        let state = self.state();
        Ok(state.sorted_set(key)?.and_then(|scores| scores.get(member).copied()))
    }

    async fn zrange_by_score(&self, key: &str, range: &ScoreRange) -> StoreResult<Vec<(String, f64)>> {
        self.round_trip().await;
        let state = self.state();
        let Some(scores) = state.sorted_set(key)? else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(String, f64)> = scores
            .iter()
            .filter(|(_, score)| **score >= range.min && **score <= range.max)
            .map(|(member, score)| (member.clone(), *score))
            .collect();
        // 같은 점수는 멤버 사전순 (Redis와 동일)
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        if range.order == SortOrder::Desc {
            entries.reverse();
        }
        Ok(entries
            .into_iter()
            .skip(range.offset)
            .take(range.count)
            .collect())
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.round_trip().await;
        let state = self.state();
        Ok(state.set(key)?.map(|members| members.contains(member)).unwrap_or(false))
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.round_trip().await;
        let state = self.state();
        let mut members: Vec<String> = state
            .set(key)?
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn sinter(&self, keys: &[String]) -> StoreResult<Vec<String>> {
        self.round_trip().await;
        let state = self.state();
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match state.set(key)? {
                Some(members) => sets.push(members),
                None => return Ok(Vec::new()),
            }
        }
        let Some((first, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        let mut common: Vec<String> = first
            .iter()
            .filter(|member| rest.iter().all(|other| other.contains(*member)))
            .cloned()
            .collect();
        common.sort();
        Ok(common)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.round_trip().await;
        let state = self.state();
        Ok(state
            .list(key)?
            .map(|values| list_range(values, start, stop))
            .unwrap_or_default())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.round_trip().await;
        let mut state = self.state();
        state.expire(key);
        match state.entries.get(key) {
            None => Ok(None),
            Some(Entry::Text { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn pfcount(&self, key: &str) -> StoreResult<u64> {
        self.round_trip().await;
        let state = self.state();
        Ok(state.estimator(key)?.map(|viewers| viewers.len() as u64).unwrap_or(0))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.round_trip().await;
        let mut state = self.state();
        state.expire(key);
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        state.entries.insert(
            key.to_string(),
            Entry::Text {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        state.touch(key);
        Ok(true)
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        self.round_trip().await;
        let mut state = self.state();
        state.apply(&batch)
    }

    async fn run_script(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64> {
        self.round_trip().await;
        let mut state = self.state();
        state.run_script(script, keys, args)
    }

    async fn watch(&self, keys: &[String]) -> StoreResult<Box<dyn WatchSession>> {
        self.round_trip().await;
        let watched = {
            let mut state = self.state();
            keys.iter()
                .map(|key| {
                    state.expire(key);
                    (key.clone(), state.version(key))
                })
                .collect()
        };
        Ok(Box::new(MemoryWatchSession {
            state: Arc::clone(&self.state),
            watched,
            latency: self.latency,
        }))
    }
}

#[async_trait]
impl SearchIndex for MemoryStore {
    /// `%term%` 토큰이 name 또는 description에 포함된 해시를 찾는다.
    async fn search(&self, _index: &str, query: &str, limit: usize) -> StoreResult<Vec<SearchHit>> {
        self.round_trip().await;
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.state();
        let mut hits: Vec<SearchHit> = state
            .entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                Entry::Hash(fields) if fields.contains_key("name") => Some((key, fields)),
                _ => None,
            })
            .filter(|(_, fields)| {
                ["name", "description"].iter().any(|field| {
                    let text = fields.get(*field).map(|v| v.to_lowercase()).unwrap_or_default();
                    terms.iter().any(|term| text.contains(term.as_str()))
                })
            })
            .map(|(key, fields)| SearchHit {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.key.cmp(&b.key));
        hits.truncate(limit);
        Ok(hits)
    }
}
// endregion: --- Memory Store

// region:    --- Watch Session
pub struct MemoryWatchSession {
    state: Arc<Mutex<MemoryState>>,
    watched: Vec<(String, u64)>,
    latency: Option<Duration>,
}

#[async_trait]
impl WatchSession for MemoryWatchSession {
    async fn hgetall(&mut self, key: &str) -> StoreResult<HashMap<String, String>> {
        pause(self.latency).await;
        let state = lock_state(&self.state);
        Ok(state.hash(key)?.cloned().unwrap_or_default())
    }

    async fn commit(&mut self, batch: WriteBatch) -> StoreResult<bool> {
        pause(self.latency).await;
        let watched = std::mem::take(&mut self.watched);
        let mut state = lock_state(&self.state);
        for (key, version) in &watched {
            state.expire(key);
            if state.version(key) != *version {
                return Ok(false);
            }
        }
        state.apply(&batch)?;
        Ok(true)
    }

    async fn discard(&mut self) -> StoreResult<()> {
        self.watched.clear();
        Ok(())
    }
}
// endregion: --- Watch Session

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn list_range_follows_redis_indices() {
        let list = keys(&["a", "b", "c", "d"]);
        assert_eq!(list_range(&list, 0, -1), keys(&["a", "b", "c", "d"]));
        assert_eq!(list_range(&list, -2, -1), keys(&["c", "d"]));
        assert_eq!(list_range(&list, -10, -3), keys(&["a", "b"]));
        assert_eq!(list_range(&list, 2, 10), keys(&["c", "d"]));
        assert!(list_range(&list, -10, -5).is_empty());
        assert!(list_range(&list, 3, 1).is_empty());
    }

    #[test]
    fn extracts_fuzzy_terms() {
        let query = "(@name:(%Chair% %red%) => { $weight: 5.0 }) | (@description:(%chair% %red%))";
        assert_eq!(query_terms(query), keys(&["chair", "red"]));
        assert!(query_terms("plain").is_empty());
    }

    #[tokio::test]
    async fn watch_detects_concurrent_write() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.hash_set("h", vec![("price".into(), "1".into())]);
        store.apply(batch).await.unwrap();

        let mut session = store.watch(&keys(&["h"])).await.unwrap();
        assert_eq!(session.hgetall("h").await.unwrap()["price"], "1");

        let mut other = WriteBatch::new();
        other.hash_set("h", vec![("price".into(), "2".into())]);
        store.apply(other).await.unwrap();

        let mut staged = WriteBatch::new();
        staged.hash_set("h", vec![("price".into(), "3".into())]);
        assert!(!session.commit(staged).await.unwrap());
        assert_eq!(store.hgetall("h").await.unwrap()["price"], "2");
    }

    #[tokio::test]
    async fn watch_commits_when_untouched() {
        let store = MemoryStore::new();
        let mut session = store.watch(&keys(&["h"])).await.unwrap();
        let mut staged = WriteBatch::new();
        staged.hash_set("h", vec![("price".into(), "3".into())]).list_push("l", "x");
        assert!(session.commit(staged).await.unwrap());
        assert_eq!(store.lrange("l", 0, -1).await.unwrap(), keys(&["x"]));
    }

    #[tokio::test]
    async fn wrong_type_batch_is_not_partially_applied() {
        let store = MemoryStore::new();
        let mut first = WriteBatch::new();
        first.set_add("s", "m");
        store.apply(first).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.list_push("l", "x").hash_set("s", vec![("f".into(), "v".into())]);
        assert!(matches!(store.apply(batch).await, Err(StoreError::WrongType(_))));
        assert!(store.lrange("l", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditional_create_respects_expiry() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", "a", Duration::from_millis(30)).await.unwrap());
        assert!(!store.set_if_absent("k", "b", Duration::from_millis(30)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.set_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn ranges_order_ties_by_member() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .sorted_set_add("z", "b", 1.0)
            .sorted_set_add("z", "a", 1.0)
            .sorted_set_add("z", "c", 5.0);
        store.apply(batch).await.unwrap();

        let asc = store.zrange_by_score("z", &ScoreRange::all(SortOrder::Asc, 0, 10)).await.unwrap();
        let members: Vec<_> = asc.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["a", "b", "c"]);

        let desc = store.zrange_by_score("z", &ScoreRange::all(SortOrder::Desc, 1, 1)).await.unwrap();
        assert_eq!(desc, vec![("b".to_string(), 1.0)]);
    }

    #[tokio::test]
    async fn script_arity_is_checked() {
        let store = MemoryStore::new();
        let result = store
            .run_script(AtomicScript::ReleaseLock, &keys(&["a", "b"]), &keys(&["t"]))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidScriptCall { .. })));
    }
}
// endregion: --- Tests
