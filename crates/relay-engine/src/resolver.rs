//! 계약 해석기.
//!
//! 기초자산 이름과 세그먼트에서 거래 대상 계약을 결정합니다.
//!
//! # 2계층 캐시 구조
//!
//! ```text
//! 요청 → 요청 범위 캐시 (신호당 초기화) → Redis 공유 캐시 (24h TTL) → 브로커
//! ```
//!
//! - 요청 범위 캐시: 후보 3개를 순회하며 포지션을 스캔할 때 같은
//!   계약 목록을 중복 조회하지 않기 위한 것. 신호 간 누수 방지를 위해
//!   신호마다 `begin_request()`로 비웁니다.
//! - 공유 캐시: 세그먼트 전체 목록 다운로드가 크므로 프로세스 간 공유.
//!   조회 실패는 미스로 취급합니다 (브로커로 fallback).

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use relay_core::{
    domain::{normalize_base_symbol, BrokerGateway, Instrument, InstrumentType, Segment},
    ContractCache,
};
use relay_store::SharedCache;
use tracing::{debug, info, warn};

use crate::error::Result;

/// 후보 계약 최대 수 (근월물부터 3개).
pub const MAX_CANDIDATES: usize = 3;

/// 계약 해석기.
pub struct ContractResolver {
    broker: Arc<dyn BrokerGateway>,
    /// Redis 공유 캐시 (선택적)
    shared: Option<Arc<SharedCache>>,
    /// 요청 범위 캐시
    request_cache: ContractCache,
}

impl ContractResolver {
    pub fn new(broker: Arc<dyn BrokerGateway>) -> Self {
        Self {
            broker,
            shared: None,
            request_cache: ContractCache::new(),
        }
    }

    /// 공유 캐시 설정 (2계층 캐시 활성화).
    pub fn with_shared_cache(mut self, shared: Arc<SharedCache>) -> Self {
        info!("공유 종목 캐시 활성화");
        self.shared = Some(shared);
        self
    }

    /// 신호 처리 시작. 요청 범위 캐시를 비웁니다 (통계는 누적 유지).
    pub async fn begin_request(&self) {
        self.request_cache.clear().await;
    }

    /// 세그먼트 전체 종목 목록 조회 (공유 캐시 → 브로커).
    pub async fn instruments(&self, segment: Segment) -> Result<Vec<Instrument>> {
        if let Some(shared) = &self.shared {
            match shared.instruments_get(segment).await {
                Ok(Some(instruments)) => return Ok(instruments),
                Ok(None) => {}
                Err(e) => {
                    warn!(segment = %segment, error = %e, "공유 캐시 조회 실패, 브로커 fallback");
                }
            }
        }

        let instruments = self.broker.list_instruments(segment).await?;
        debug!(
            segment = %segment,
            count = instruments.len(),
            "브로커 종목 목록 다운로드"
        );

        if let Some(shared) = &self.shared {
            if let Err(e) = shared.instruments_put(segment, &instruments).await {
                warn!(segment = %segment, error = %e, "공유 캐시 저장 실패");
            }
        }
        Ok(instruments)
    }

    /// 공유 캐시 무효화 후 최신 목록 강제 로드.
    ///
    /// 롤오버 스케줄러가 기상 직후 사용합니다.
    pub async fn refresh_instruments(&self, segment: Segment) -> Result<Vec<Instrument>> {
        if let Some(shared) = &self.shared {
            if let Err(e) = shared.instruments_invalidate(segment).await {
                warn!(segment = %segment, error = %e, "공유 캐시 무효화 실패");
            }
        }
        self.instruments(segment).await
    }

    /// 후보 계약 해석.
    ///
    /// 파생 세그먼트: 기초자산이 일치하는 선물 계약을 만기 오름차순으로
    /// 최대 3개. 현물 세그먼트: 받은 심볼 그대로 (랏 사이즈 1).
    pub async fn resolve_candidates(
        &self,
        base_symbol: &str,
        segment: Segment,
    ) -> Result<Vec<Instrument>> {
        // 현물 심볼은 정규화하지 않음: 끝자리 숫자가 티커의 일부인
        // 종목(예: ICICIB22)이 있으므로 받은 그대로 주문 대상이 됨
        if !segment.is_derivative() {
            return Ok(vec![Instrument::spot(base_symbol, segment)]);
        }

        let normalized = normalize_base_symbol(base_symbol);

        if let Some(cached) = self.request_cache.get(&normalized, segment).await {
            return Ok(cached);
        }

        let instruments = self.instruments(segment).await?;
        let mut candidates: Vec<Instrument> = instruments
            .into_iter()
            .filter(|i| {
                i.instrument_type == InstrumentType::Fut && i.underlying_name == normalized
            })
            .collect();
        // 만기 오름차순, 만기 없는 행은 뒤로
        candidates.sort_by_key(|i| i.expiry.unwrap_or(NaiveDate::MAX));
        candidates.truncate(MAX_CANDIDATES);

        debug!(
            base_symbol = %normalized,
            segment = %segment,
            candidates = candidates.len(),
            "후보 계약 해석 완료"
        );

        self.request_cache
            .put(&normalized, segment, candidates.clone())
            .await;
        Ok(candidates)
    }
}

/// 진입 계약 선택 (롤오버 규칙).
///
/// 근월물의 남은 일수가 임계값 이하이고 오늘이 평일이며 차월물이
/// 존재하면 차월물을 선택합니다. 만기 직전 계약에 신규 진입하는 것을
/// 방지합니다. 후보가 하나뿐이면 그것을 그대로 사용합니다.
pub fn select_entry_contract(
    candidates: &[Instrument],
    today: NaiveDate,
    threshold_days: i64,
) -> Option<&Instrument> {
    let front = candidates.first()?;
    if let (Some(days_left), Some(next)) = (front.days_to_expiry(today), candidates.get(1)) {
        if days_left <= threshold_days && is_weekday(today) {
            debug!(
                front = %front.tradingsymbol,
                next = %next.tradingsymbol,
                days_left = days_left,
                "만기 임박, 차월물로 진입"
            );
            return Some(next);
        }
    }
    Some(front)
}

/// 평일 여부.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fut(symbol: &str, underlying: &str, expiry: (i32, u32, u32)) -> Instrument {
        Instrument {
            tradingsymbol: symbol.to_string(),
            exchange: Segment::Nfo,
            instrument_type: InstrumentType::Fut,
            underlying_name: underlying.to_string(),
            expiry: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2),
            lot_size: 75,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn near_expiry_on_weekday_selects_next_contract() {
        let candidates = vec![
            fut("NIFTY26SEPFUT", "NIFTY", (2026, 9, 24)),
            fut("NIFTY26OCTFUT", "NIFTY", (2026, 10, 29)),
        ];
        // 2026-09-22는 화요일, days_left = 2
        let selected = select_entry_contract(&candidates, day(2026, 9, 22), 7).unwrap();
        assert_eq!(selected.tradingsymbol, "NIFTY26OCTFUT");
    }

    #[test]
    fn near_expiry_on_weekend_keeps_front_contract() {
        let candidates = vec![
            fut("NIFTY26SEPFUT", "NIFTY", (2026, 9, 24)),
            fut("NIFTY26OCTFUT", "NIFTY", (2026, 10, 29)),
        ];
        // 2026-09-20은 일요일
        let selected = select_entry_contract(&candidates, day(2026, 9, 20), 7).unwrap();
        assert_eq!(selected.tradingsymbol, "NIFTY26SEPFUT");
    }

    #[test]
    fn far_expiry_keeps_front_contract() {
        let candidates = vec![
            fut("NIFTY26SEPFUT", "NIFTY", (2026, 9, 24)),
            fut("NIFTY26OCTFUT", "NIFTY", (2026, 10, 29)),
        ];
        let selected = select_entry_contract(&candidates, day(2026, 9, 1), 7).unwrap();
        assert_eq!(selected.tradingsymbol, "NIFTY26SEPFUT");
    }

    #[test]
    fn single_candidate_is_used_even_near_expiry() {
        let candidates = vec![fut("NIFTY26SEPFUT", "NIFTY", (2026, 9, 24))];
        let selected = select_entry_contract(&candidates, day(2026, 9, 22), 7).unwrap();
        assert_eq!(selected.tradingsymbol, "NIFTY26SEPFUT");
    }

    #[test]
    fn no_candidates_yields_none() {
        assert!(select_entry_contract(&[], day(2026, 9, 22), 7).is_none());
    }

    #[tokio::test]
    async fn derivative_candidates_sorted_by_expiry_and_capped() {
        use relay_broker::MockBroker;

        let broker = MockBroker::new();
        broker
            .set_instruments(
                Segment::Nfo,
                vec![
                    fut("NIFTY26DECFUT", "NIFTY", (2026, 12, 31)),
                    fut("NIFTY26SEPFUT", "NIFTY", (2026, 9, 24)),
                    fut("NIFTY27JANFUT", "NIFTY", (2027, 1, 28)),
                    fut("NIFTY26OCTFUT", "NIFTY", (2026, 10, 29)),
                    fut("BANKNIFTY26SEPFUT", "BANKNIFTY", (2026, 9, 24)),
                ],
            )
            .await;

        let resolver = ContractResolver::new(Arc::new(broker));
        let candidates = resolver
            .resolve_candidates("NIFTY1!", Segment::Nfo)
            .await
            .unwrap();

        let symbols: Vec<_> = candidates.iter().map(|c| c.tradingsymbol.as_str()).collect();
        assert_eq!(
            symbols,
            vec!["NIFTY26SEPFUT", "NIFTY26OCTFUT", "NIFTY26DECFUT"]
        );
    }

    #[tokio::test]
    async fn cash_segment_resolves_symbol_verbatim() {
        use relay_broker::MockBroker;

        let resolver = ContractResolver::new(Arc::new(MockBroker::new()));
        let candidates = resolver
            .resolve_candidates("RELIANCE", Segment::Nse)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tradingsymbol, "RELIANCE");
        assert_eq!(candidates[0].lot_size, 1);
    }

    #[tokio::test]
    async fn cash_symbol_with_trailing_digit_is_not_mangled() {
        use relay_broker::MockBroker;

        // BHARAT 22 ETF처럼 끝자리 숫자가 티커의 일부인 현물 종목
        let resolver = ContractResolver::new(Arc::new(MockBroker::new()));
        let candidates = resolver
            .resolve_candidates("ICICIB22", Segment::Nse)
            .await
            .unwrap();
        assert_eq!(candidates[0].tradingsymbol, "ICICIB22");
    }
}
