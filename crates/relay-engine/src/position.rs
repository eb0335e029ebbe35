//! 포지션 리더.
//!
//! 한 종목의 부호 있는 순수량을 브로커 실시간 조회로 계산합니다.
//! 포지션은 절대 캐시하지 않습니다 (stale 포지션은 잘못된 주문
//! 수량으로 이어짐).
//!
//! # 세그먼트별 조회 방식
//!
//! - 파생: NRML 순포지션만 (심볼 + 거래소 일치)
//! - 현물: 보유잔고(결제 + 미결제)와 당일 포지션을 **동시에** 조회해
//!   합산. 당일 숏과 보유 주식이 서로 다른 브로커 뷰에 있기 때문.
//!
//! 각 조회는 독립적인 10초 타임아웃을 가지며, 타임아웃/에러는 해당
//! 레그만 0으로 강등됩니다. 실패한 포지션 조회가 신호 처리 전체를
//! 막아서는 안 됩니다.

use std::sync::Arc;
use std::time::Duration;

use relay_core::domain::{BrokerGateway, Instrument, ProductType};
use tokio::time::timeout;
use tracing::warn;

/// 포지션 리더.
pub struct PositionReader {
    broker: Arc<dyn BrokerGateway>,
    /// 레그별 조회 타임아웃
    timeout: Duration,
}

impl PositionReader {
    pub fn new(broker: Arc<dyn BrokerGateway>, timeout: Duration) -> Self {
        Self { broker, timeout }
    }

    /// 부호 있는 순수량 조회 (양수=롱, 음수=숏, 0=플랫/조회 실패).
    pub async fn read(&self, instrument: &Instrument) -> i64 {
        if instrument.exchange.is_derivative() {
            self.read_derivative(instrument).await
        } else {
            self.read_cash(instrument).await
        }
    }

    /// 파생: NRML 순포지션.
    async fn read_derivative(&self, instrument: &Instrument) -> i64 {
        match timeout(self.timeout, self.broker.net_positions()).await {
            Ok(Ok(positions)) => positions
                .iter()
                .filter(|p| {
                    p.tradingsymbol == instrument.tradingsymbol
                        && p.exchange == instrument.exchange
                        && p.product == ProductType::Nrml
                })
                .map(|p| p.quantity)
                .sum(),
            Ok(Err(e)) => {
                warn!(
                    symbol = %instrument.tradingsymbol,
                    error = %e,
                    "포지션 조회 실패, 플랫으로 간주"
                );
                0
            }
            Err(_) => {
                warn!(
                    symbol = %instrument.tradingsymbol,
                    timeout_secs = self.timeout.as_secs(),
                    "포지션 조회 타임아웃, 플랫으로 간주"
                );
                0
            }
        }
    }

    /// 현물: 보유잔고 + 당일 포지션, 병렬 조회 후 합산.
    async fn read_cash(&self, instrument: &Instrument) -> i64 {
        let (holdings, positions) = tokio::join!(
            timeout(self.timeout, self.broker.holdings()),
            timeout(self.timeout, self.broker.net_positions()),
        );

        let held = match holdings {
            Ok(Ok(rows)) => rows
                .iter()
                .filter(|h| h.tradingsymbol == instrument.tradingsymbol)
                .map(|h| h.total_quantity())
                .sum(),
            Ok(Err(e)) => {
                warn!(symbol = %instrument.tradingsymbol, error = %e, "보유잔고 조회 실패, 0으로 강등");
                0
            }
            Err(_) => {
                warn!(symbol = %instrument.tradingsymbol, "보유잔고 조회 타임아웃, 0으로 강등");
                0
            }
        };

        let intraday = match positions {
            Ok(Ok(rows)) => rows
                .iter()
                .filter(|p| {
                    p.tradingsymbol == instrument.tradingsymbol
                        && p.exchange == instrument.exchange
                })
                .map(|p| p.quantity)
                .sum(),
            Ok(Err(e)) => {
                warn!(symbol = %instrument.tradingsymbol, error = %e, "당일 포지션 조회 실패, 0으로 강등");
                0
            }
            Err(_) => {
                warn!(symbol = %instrument.tradingsymbol, "당일 포지션 조회 타임아웃, 0으로 강등");
                0
            }
        };

        held + intraday
    }
}
