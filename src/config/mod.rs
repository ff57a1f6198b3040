/// 환경 변수 설정
// region:    --- Imports
use crate::lock::{LockOptions, DEFAULT_LOCK_TTL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use anyhow::{anyhow, Result};
use std::time::Duration;

// endregion: --- Imports

// region:    --- Config
/// 저장소 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("알 수 없는 STORE_BACKEND: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub lock: LockOptions,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn load_config() -> Result<AppConfig> {
    config_from(|key| std::env::var(key).ok())
}

/// 조회 함수로부터 설정 구성 (없거나 해석할 수 없는 숫자 값은 기본값)
pub fn config_from<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    let cfg = AppConfig {
        store: StoreConfig {
            backend: env.string("STORE_BACKEND", "redis").parse()?,
            redis_url: env.string("REDIS_URL", "redis://127.0.0.1:6379"),
        },
        api: ApiConfig {
            host: env.string("API_HOST", "0.0.0.0"),
            port: env.u16("API_PORT", 3000),
        },
        lock: LockOptions {
            ttl: Duration::from_millis(env.u64("LOCK_TTL_MS", DEFAULT_LOCK_TTL.as_millis() as u64)),
            retry_delay: Duration::from_millis(
                env.u64("LOCK_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY.as_millis() as u64),
            ),
            max_attempts: env.u32("LOCK_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
        },
    };
    if cfg.lock.max_attempts == 0 {
        return Err(anyhow!("LOCK_MAX_ATTEMPTS는 1 이상이어야 합니다."));
    }
    Ok(cfg)
}
// endregion: --- Config

// region:    --- Env Helpers
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn u16(&self, key: &str, default: u16) -> u16 {
        (self.lookup)(key)
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(default)
    }

    fn u32(&self, key: &str, default: u32) -> u32 {
        (self.lookup)(key)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default)
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        (self.lookup)(key)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default)
    }
}
// endregion: --- Env Helpers

// endregion: --- Tests
