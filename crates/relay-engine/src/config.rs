//! 엔진 설정.
//!
//! 환경변수 기반 설정입니다. 바이너리가 `dotenvy`로 `.env`를 로드한 뒤
//! `EngineConfig::from_env()`를 호출합니다. 잘못된 값은 경고 후 기본값을
//! 사용합니다.
//!
//! | 환경변수 | 기본값 | 설명 |
//! |---|---|---|
//! | `FORWARD_TESTING` | `false` | 합성 주문 모드 (브로커 호출 없음) |
//! | `ROLLOVER_THRESHOLD_DAYS` | `7` | 만기 임박 판정 일수 |
//! | `PROTECTION_BUFFER` | `0.005` | 보호가 버퍼 (±0.5%) |
//! | `POSITION_TIMEOUT_SECS` | `10` | 포지션 조회 타임아웃 |
//! | `EXCHANGE_TIMEZONE` | `Asia/Kolkata` | 거래소 현지 시간대 |
//! | `REDIS_URL` | (없음) | 공유 캐시. 없으면 게이트는 인메모리 |
//! | `DATABASE_URL` | (없음) | 주문 원장 PostgreSQL |

use std::time::Duration;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::warn;

/// 롤오버 기상 시각 (거래소 현지, 시).
pub const ROLLOVER_WAKE_HOUR: u32 = 9;
/// 롤오버 기상 시각 (거래소 현지, 분). 장 시작 직전 09:25.
pub const ROLLOVER_WAKE_MINUTE: u32 = 25;

/// 엔진 설정.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 포워드 테스트 모드 (브로커 호출 없이 합성 주문 기록)
    pub forward_testing: bool,
    /// 만기까지 남은 일수가 이 값 이하이면 롤오버 대상
    pub rollover_threshold_days: i64,
    /// 보호가 버퍼 (매수 +, 매도 -)
    pub protection_buffer: Decimal,
    /// 포지션 조회 레그별 타임아웃
    pub position_timeout: Duration,
    /// 거래소 현지 시간대
    pub timezone: Tz,
    /// 롤오버 루프 에러 후 대기 시간
    pub error_sleep: Duration,
    /// 공유 캐시 URL (없으면 인메모리 게이트로 동작)
    pub redis_url: Option<String>,
    /// 주문 원장 URL
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forward_testing: false,
            rollover_threshold_days: 7,
            protection_buffer: Decimal::new(5, 3), // 0.005
            position_timeout: Duration::from_secs(10),
            timezone: chrono_tz::Asia::Kolkata,
            error_sleep: Duration::from_secs(60),
            redis_url: None,
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// 환경변수에서 설정 로드.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let forward_testing = parse_env("FORWARD_TESTING", defaults.forward_testing);
        let rollover_threshold_days =
            parse_env("ROLLOVER_THRESHOLD_DAYS", defaults.rollover_threshold_days);
        let protection_buffer = parse_env("PROTECTION_BUFFER", defaults.protection_buffer);
        let position_timeout = Duration::from_secs(parse_env(
            "POSITION_TIMEOUT_SECS",
            defaults.position_timeout.as_secs(),
        ));
        let timezone = parse_env("EXCHANGE_TIMEZONE", defaults.timezone);

        Self {
            forward_testing,
            rollover_threshold_days,
            protection_buffer,
            position_timeout,
            timezone,
            error_sleep: defaults.error_sleep,
            redis_url: std::env::var("REDIS_URL").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }

    /// 포워드 테스트 모드 설정 (빌더 패턴).
    pub fn with_forward_testing(mut self, enabled: bool) -> Self {
        self.forward_testing = enabled;
        self
    }
}

/// 환경변수 파싱. 없거나 잘못된 값이면 기본값.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, raw = %raw, default = ?default, "환경변수 파싱 실패, 기본값 사용");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn defaults_match_operating_parameters() {
        let config = EngineConfig::default();
        assert!(!config.forward_testing);
        assert_eq!(config.rollover_threshold_days, 7);
        assert_eq!(config.protection_buffer, dec!(0.005));
        assert_eq!(config.position_timeout, Duration::from_secs(10));
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.error_sleep, Duration::from_secs(60));
    }
}
