//! 요청 범위 계약 캐시.
//!
//! 하나의 신호를 처리하는 동안 같은 계약 목록 조회를 중복 수행하지
//! 않도록 합니다 (예: 후보 계약 3개를 순회하며 포지션을 스캔할 때).
//! 신호 간 누수를 막기 위해 매 신호 시작 시 `clear()`로 비웁니다.
//!
//! # 사용 패턴
//!
//! ```text
//! // 신호 처리 시작
//! contract_cache.clear().await;
//!
//! // 후보 계약 조회 (같은 키는 캐시에서 반환)
//! if let Some(contracts) = contract_cache.get(symbol, segment).await {
//!     return contracts;
//! }
//! let contracts = fetch_from_shared_cache_or_broker().await?;
//! contract_cache.put(symbol, segment, contracts.clone()).await;
//! ```

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::{Instrument, Segment};

/// 캐시 적중/미적중 통계.
///
/// 모니터링 전용이며 `clear()` 시에도 초기화되지 않고 누적됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 적중 횟수
    pub hits: u64,
    /// 미적중 횟수
    pub misses: u64,
}

impl CacheStats {
    /// 적중률 (%). 조회가 없으면 0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// 요청 범위 계약 캐시.
///
/// # 스레드 안전성
///
/// 내부적으로 `RwLock`을 사용하여 다중 읽기 / 단일 쓰기를 보장합니다.
#[derive(Debug, Default)]
pub struct ContractCache {
    entries: RwLock<HashMap<(String, Segment), Vec<Instrument>>>,
    stats: RwLock<CacheStats>,
}

impl ContractCache {
    /// 빈 캐시 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시된 계약 목록 조회.
    pub async fn get(&self, base_symbol: &str, segment: Segment) -> Option<Vec<Instrument>> {
        let key = (base_symbol.to_string(), segment);
        let found = self.entries.read().await.get(&key).cloned();
        let mut stats = self.stats.write().await;
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// 계약 목록 저장.
    pub async fn put(&self, base_symbol: &str, segment: Segment, contracts: Vec<Instrument>) {
        let key = (base_symbol.to_string(), segment);
        self.entries.write().await.insert(key, contracts);
    }

    /// 요청 시작 시 캐시 비우기. 통계는 유지됩니다.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// 누적 통계 조회.
    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contracts() -> Vec<Instrument> {
        vec![Instrument::spot("RELIANCE", Segment::Nse)]
    }

    #[tokio::test]
    async fn cache_hit_after_put() {
        let cache = ContractCache::new();
        assert!(cache.get("NIFTY", Segment::Nfo).await.is_none());

        cache.put("NIFTY", Segment::Nfo, sample_contracts()).await;
        assert!(cache.get("NIFTY", Segment::Nfo).await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn clear_empties_entries_but_keeps_stats() {
        let cache = ContractCache::new();
        cache.put("NIFTY", Segment::Nfo, sample_contracts()).await;
        let _ = cache.get("NIFTY", Segment::Nfo).await;

        cache.clear().await;
        assert!(cache.get("NIFTY", Segment::Nfo).await.is_none());

        // put → get(적중) → clear → get(미적중): 적중 1, 미적중 1
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn segments_are_independent_keys() {
        let cache = ContractCache::new();
        cache.put("GOLD", Segment::Mcx, sample_contracts()).await;
        assert!(cache.get("GOLD", Segment::Nfo).await.is_none());
        assert!(cache.get("GOLD", Segment::Mcx).await.is_some());
    }

    #[test]
    fn hit_rate_without_lookups_is_zero() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
