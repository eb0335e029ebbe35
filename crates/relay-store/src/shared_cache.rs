//! Redis 공유 캐시.
//!
//! 프로세스 외부 공유 저장소로 두 가지 용도를 담당합니다:
//!
//! - **멱등성 키**: `idempotency:{symbol}:{signal_time}` 에 대한
//!   원자적 set-if-absent (24시간 만료)
//! - **종목 목록 캐시**: `instrument_cache:{segment}` 에 세그먼트 전체
//!   종목 목록을 JSON으로 저장 (24시간 TTL). 목록이 크므로 여러
//!   프로세스가 공유하여 중복 전체 다운로드를 방지합니다.

use redis::{aio::ConnectionManager, AsyncCommands};
use relay_core::domain::{Instrument, Segment};
use tracing::{debug, info};

use crate::error::Result;

/// 멱등성 키 만료 시간 (24시간).
pub const IDEMPOTENCY_TTL_SECS: u64 = 86_400;

/// 종목 목록 캐시 TTL (24시간).
pub const INSTRUMENT_TTL_SECS: u64 = 86_400;

/// Redis 공유 캐시.
///
/// `ConnectionManager`는 내부적으로 재연결을 처리하며 clone이 저렴합니다.
#[derive(Clone)]
pub struct SharedCache {
    conn: ConnectionManager,
}

impl SharedCache {
    /// Redis 연결 생성.
    ///
    /// # Errors
    ///
    /// URL이 잘못되었거나 초기 연결에 실패하면 `StoreError::Redis`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        info!("Redis 공유 캐시 연결 완료");
        Ok(Self { conn })
    }

    /// 원자적 set-if-absent (SET NX EX).
    ///
    /// # Returns
    ///
    /// - `true`: 키가 새로 설정됨 (첫 관측)
    /// - `false`: 키가 이미 존재함 (중복)
    pub async fn set_if_absent(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    /// 세그먼트 종목 목록 캐시 키.
    fn instruments_key(segment: Segment) -> String {
        format!("instrument_cache:{}", segment)
    }

    /// 캐시된 세그먼트 종목 목록 조회.
    ///
    /// 캐시 미스 또는 TTL 만료 시 `Ok(None)`.
    pub async fn instruments_get(&self, segment: Segment) -> Result<Option<Vec<Instrument>>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(Self::instruments_key(segment)).await?;
        match payload {
            Some(json) => {
                let instruments: Vec<Instrument> = serde_json::from_str(&json)?;
                debug!(
                    segment = %segment,
                    count = instruments.len(),
                    "종목 목록 캐시 히트"
                );
                Ok(Some(instruments))
            }
            None => {
                debug!(segment = %segment, "종목 목록 캐시 미스");
                Ok(None)
            }
        }
    }

    /// 세그먼트 종목 목록 캐시 저장 (24시간 TTL).
    pub async fn instruments_put(&self, segment: Segment, instruments: &[Instrument]) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(instruments)?;
        let _: () = conn
            .set_ex(Self::instruments_key(segment), json, INSTRUMENT_TTL_SECS)
            .await?;
        debug!(
            segment = %segment,
            count = instruments.len(),
            "종목 목록 캐시 저장 완료"
        );
        Ok(())
    }

    /// 세그먼트 종목 목록 캐시 즉시 무효화.
    ///
    /// 롤오버 스케줄러가 기상 직후 최신 목록을 강제하기 위해 사용합니다.
    pub async fn instruments_invalidate(&self, segment: Segment) -> Result<()> {
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(Self::instruments_key(segment)).await?;
        if deleted > 0 {
            info!(segment = %segment, "종목 목록 캐시 무효화");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruments_key_includes_segment() {
        assert_eq!(
            SharedCache::instruments_key(Segment::Nfo),
            "instrument_cache:NFO"
        );
        assert_eq!(
            SharedCache::instruments_key(Segment::Nse),
            "instrument_cache:NSE"
        );
    }
}
