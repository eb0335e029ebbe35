//! 멱등성 게이트.
//!
//! 같은 (symbol, signal_time) 신호의 재전송을 파이프라인 진입 전에
//! 차단합니다. 공유 저장소의 원자적 set-if-absent가 분산 환경에서도
//! 정확히 하나의 수신자만 신호를 통과시키도록 보장합니다.
//!
//! 저장소 장애 시에는 제한된 재시도 후 **fail-open** 합니다: 중복 억제의
//! 정확성보다 실거래 신호를 조용히 버리지 않는 쪽을 우선합니다.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::StoreError,
    retry::{with_retry_if, RetryConfig},
    shared_cache::{SharedCache, IDEMPOTENCY_TTL_SECS},
};

/// 멱등성 게이트 trait.
#[async_trait]
pub trait DuplicateGate: Send + Sync {
    /// 신호 수락 여부.
    ///
    /// # Returns
    ///
    /// - `true`: 첫 관측, 처리 진행
    /// - `false`: 중복, 처리 중단
    async fn admit(&self, key: &str) -> bool;
}

/// Redis 기반 멱등성 게이트.
pub struct RedisGate {
    cache: SharedCache,
    retry: RetryConfig,
}

impl RedisGate {
    pub fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            retry: RetryConfig::default(),
        }
    }

    /// 재시도 설정 교체.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl DuplicateGate for RedisGate {
    async fn admit(&self, key: &str) -> bool {
        let result = with_retry_if(
            &self.retry,
            || self.cache.set_if_absent(key, IDEMPOTENCY_TTL_SECS),
            |e| matches!(e, StoreError::Redis(_)),
        )
        .await;

        match result {
            Ok(fresh) => {
                if !fresh {
                    info!(key = key, "중복 신호 차단");
                }
                fresh
            }
            Err(e) => {
                // 저장소 장애: 중복 억제를 포기하고 신호를 통과시킴
                warn!(key = key, error = %e, "멱등성 게이트 장애, fail-open으로 수락");
                true
            }
        }
    }
}

/// 인메모리 멱등성 게이트 (테스트/단일 프로세스용).
///
/// TTL 없이 프로세스 수명 동안 관측된 키를 기억합니다.
#[derive(Debug, Default)]
pub struct MemoryGate {
    seen: Mutex<HashSet<String>>,
}

impl MemoryGate {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DuplicateGate for MemoryGate {
    async fn admit(&self, key: &str) -> bool {
        self.seen.lock().await.insert(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_gate_blocks_second_observation() {
        let gate = MemoryGate::new();
        assert!(gate.admit("idempotency:NIFTY:2026-08-25T09:20:00Z").await);
        assert!(!gate.admit("idempotency:NIFTY:2026-08-25T09:20:00Z").await);
    }

    #[tokio::test]
    async fn memory_gate_keys_are_independent() {
        let gate = MemoryGate::new();
        assert!(gate.admit("idempotency:NIFTY:2026-08-25T09:20:00Z").await);
        assert!(gate.admit("idempotency:NIFTY:2026-08-25T09:25:00Z").await);
        assert!(gate.admit("idempotency:TCS:2026-08-25T09:20:00Z").await);
    }
}
