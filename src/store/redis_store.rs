// region:    --- Imports
use super::{
    AtomicScript, ScoreRange, SearchHit, SearchIndex, SortOrder, Store, StoreError, StoreResult,
    WatchSession, WriteBatch, WriteOp,
};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Pipeline, Script, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Redis Store
/// Redis 저장소
/// 일반 명령은 하나의 멀티플렉스 연결을 공유하고, 감시 세션은 전용 연결을 연다.
pub struct RedisStore {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    scripts: HashMap<AtomicScript, Script>,
}

impl RedisStore {
    /// 연결
    pub async fn connect(url: &str) -> StoreResult<Self> {
        info!("{:<12} --> Redis 연결 시작", "Store");
        let client = Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        let scripts = AtomicScript::ALL
            .iter()
            .map(|script| (*script, Script::new(script.source())))
            .collect();

        info!("{:<12} --> Redis 연결 성공", "Store");
        Ok(Self {
            client,
            connection: RwLock::new(Some(connection)),
            scripts,
        })
    }

    /// 연결 종료
    /// 이후의 모든 요청은 `StoreError::Disconnected`로 실패한다.
    pub fn disconnect(&self) {
        let mut guard = self
            .connection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            info!("{:<12} --> Redis 연결 종료", "Store");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn connection(&self) -> StoreResult<MultiplexedConnection> {
        self.connection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(StoreError::Disconnected)
    }
}

/// 점수 인자 (무한대는 Redis 표기로)
fn score_arg(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

/// 배치를 파이프라인에 적재
fn stage(pipe: &mut Pipeline, batch: &WriteBatch) {
    for op in batch.ops() {
        match op {
            WriteOp::HashSet { key, fields } => {
                if fields.is_empty() {
                    continue;
                }
                pipe.cmd("HSET").arg(key);
                for (field, value) in fields {
                    pipe.arg(field).arg(value);
                }
                pipe.ignore();
            }
            WriteOp::SortedSetAdd { key, member, score } => {
                pipe.cmd("ZADD").arg(key).arg(*score).arg(member).ignore();
            }
            WriteOp::SetAdd { key, member } => {
                pipe.cmd("SADD").arg(key).arg(member).ignore();
            }
            WriteOp::ListPush { key, value } => {
                pipe.cmd("RPUSH").arg(key).arg(value).ignore();
            }
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut con = self.connection()?;
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut con).await?;
        Ok(fields)
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let mut con = self.connection()?;
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut con)
            .await?;
        Ok(score)
    }

    async fn zrange_by_score(&self, key: &str, range: &ScoreRange) -> StoreResult<Vec<(String, f64)>> {
        let mut con = self.connection()?;
        let (command, from, to) = match range.order {
            SortOrder::Asc => ("ZRANGEBYSCORE", score_arg(range.min), score_arg(range.max)),
            SortOrder::Desc => ("ZREVRANGEBYSCORE", score_arg(range.max), score_arg(range.min)),
        };
        let entries: Vec<(String, f64)> = redis::cmd(command)
            .arg(key)
            .arg(from)
            .arg(to)
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(range.offset)
            .arg(range.count)
            .query_async(&mut con)
            .await?;
        Ok(entries)
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut con = self.connection()?;
        let found: bool = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut con)
            .await?;
        Ok(found)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut con = self.connection()?;
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut con).await?;
        Ok(members)
    }

    async fn sinter(&self, keys: &[String]) -> StoreResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut con = self.connection()?;
        let mut cmd = redis::cmd("SINTER");
        for key in keys {
            cmd.arg(key);
        }
        let members: Vec<String> = cmd.query_async(&mut con).await?;
        Ok(members)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut con = self.connection()?;
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut con)
            .await?;
        Ok(values)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut con = self.connection()?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    async fn pfcount(&self, key: &str) -> StoreResult<u64> {
        let mut con = self.connection()?;
        let count: u64 = redis::cmd("PFCOUNT").arg(key).query_async(&mut con).await?;
        Ok(count)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut con = self.connection()?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut con)
            .await?;
        Ok(reply.is_some())
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut con = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        stage(&mut pipe, &batch);
        let _: Value = pipe.query_async(&mut con).await?;
        debug!("{:<12} --> 배치 적용: {}건", "Store", batch.len());
        Ok(())
    }

    async fn run_script(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64> {
        let registered = self
            .scripts
            .get(&script)
            .ok_or_else(|| StoreError::InvalidScriptCall {
                script,
                reason: "등록되지 않은 스크립트".to_string(),
            })?;
        let mut con = self.connection()?;
        let mut invocation = registered.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        let reply: i64 = invocation.invoke_async(&mut con).await?;
        Ok(reply)
    }

    async fn watch(&self, keys: &[String]) -> StoreResult<Box<dyn WatchSession>> {
        // 공유 연결이 닫혔으면 새 세션도 열지 않는다.
        self.connection()?;
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let mut cmd = redis::cmd("WATCH");
        for key in keys {
            cmd.arg(key);
        }
        let _: () = cmd.query_async(&mut connection).await?;
        Ok(Box::new(RedisWatchSession { connection }))
    }
}

#[async_trait]
impl SearchIndex for RedisStore {
    async fn search(&self, index: &str, query: &str, limit: usize) -> StoreResult<Vec<SearchHit>> {
        let mut con = self.connection()?;
        let reply: Vec<Value> = redis::cmd("FT.SEARCH")
            .arg(index)
            .arg(query)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut con)
            .await?;

        // [전체 건수, 키1, [필드, 값, ...], 키2, [...], ...]
        let mut hits = Vec::new();
        let mut entries = reply.iter().skip(1);
        while let (Some(key), Some(fields)) = (entries.next(), entries.next()) {
            let key: String = redis::from_redis_value(key)?;
            let flat: Vec<String> = redis::from_redis_value(fields)?;
            let fields = flat
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect();
            hits.push(SearchHit { key, fields });
        }
        Ok(hits)
    }
}
// endregion: --- Redis Store

// region:    --- Watch Session
/// WATCH 세션 (전용 연결)
pub struct RedisWatchSession {
    connection: MultiplexedConnection,
}

#[async_trait]
impl WatchSession for RedisWatchSession {
    async fn hgetall(&mut self, key: &str) -> StoreResult<HashMap<String, String>> {
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        Ok(fields)
    }

    async fn commit(&mut self, batch: WriteBatch) -> StoreResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        stage(&mut pipe, &batch);
        // EXEC가 nil이면 감시 키가 바뀐 것
        let reply: Option<Value> = pipe.query_async(&mut self.connection).await?;
        Ok(reply.is_some())
    }

    async fn discard(&mut self) -> StoreResult<()> {
        let _: () = redis::cmd("UNWATCH")
            .query_async(&mut self.connection)
            .await?;
        Ok(())
    }
}
// endregion: --- Watch Session
