//! Mock 브로커 게이트웨이.
//!
//! 테스트와 파이프라인 검증에 사용하는 가상 브로커입니다. 종목 목록,
//! 포지션, 보유잔고, 미체결 주문을 시나리오별로 구성할 수 있고,
//! 주문 제출 결과를 스크립트로 지정할 수 있습니다 (예: 첫 시도는
//! 유동성 부족 거부, 재시도는 접수).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use relay_core::domain::{
    BrokerError, BrokerGateway, BrokerHolding, BrokerPosition, Instrument, OpenOrder,
    OrderRequest, Segment,
};

/// 스크립트된 주문 제출 결과.
#[derive(Debug, Clone)]
pub enum PlaceOutcome {
    /// 접수 (주문번호 자동 생성)
    Accept,
    /// 유동성 부족 거부 (보호가 재시도 대상)
    RejectIlliquid,
    /// 터미널 거부
    Reject(String),
    /// 네트워크 에러
    NetworkError,
}

#[derive(Debug, Default)]
struct MockState {
    instruments: HashMap<Segment, Vec<Instrument>>,
    positions: Vec<BrokerPosition>,
    holdings: Vec<BrokerHolding>,
    open_orders: Vec<OpenOrder>,
    /// 제출 결과 스크립트. 비어 있으면 항상 접수.
    place_script: VecDeque<PlaceOutcome>,
    /// 접수된 주문 기록
    placed: Vec<OrderRequest>,
    next_order_seq: u64,
}

/// Mock 브로커.
#[derive(Debug, Default)]
pub struct MockBroker {
    state: RwLock<MockState>,
    /// 모든 호출에 적용되는 인위적 지연 (타임아웃 테스트용)
    response_delay: Option<Duration>,
    /// 조회 호출 전체 실패 모드
    fail_queries: bool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 호출에 인위적 지연 추가 (빌더 패턴).
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    /// 조회 호출이 항상 실패하는 브로커.
    pub fn failing_queries() -> Self {
        Self {
            fail_queries: true,
            ..Default::default()
        }
    }

    /// 세그먼트 종목 목록 설정.
    pub async fn set_instruments(&self, segment: Segment, instruments: Vec<Instrument>) {
        self.state.write().await.instruments.insert(segment, instruments);
    }

    /// 순포지션 설정.
    pub async fn set_positions(&self, positions: Vec<BrokerPosition>) {
        self.state.write().await.positions = positions;
    }

    /// 보유잔고 설정.
    pub async fn set_holdings(&self, holdings: Vec<BrokerHolding>) {
        self.state.write().await.holdings = holdings;
    }

    /// 미체결 주문 설정.
    pub async fn set_open_orders(&self, orders: Vec<OpenOrder>) {
        self.state.write().await.open_orders = orders;
    }

    /// 다음 주문 제출 결과 스크립트 추가 (FIFO 소비).
    pub async fn script_place(&self, outcome: PlaceOutcome) {
        self.state.write().await.place_script.push_back(outcome);
    }

    /// 접수된 주문 기록 조회.
    pub async fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.placed.clone()
    }

    async fn apply_delay(&self) {
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn query_guard(&self) -> Result<(), BrokerError> {
        if self.fail_queries {
            Err(BrokerError::Network("mock: 조회 실패 모드".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrokerGateway for MockBroker {
    async fn list_instruments(&self, segment: Segment) -> Result<Vec<Instrument>, BrokerError> {
        self.apply_delay().await;
        self.query_guard()?;
        let state = self.state.read().await;
        Ok(state.instruments.get(&segment).cloned().unwrap_or_default())
    }

    async fn net_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        self.apply_delay().await;
        self.query_guard()?;
        Ok(self.state.read().await.positions.clone())
    }

    async fn holdings(&self) -> Result<Vec<BrokerHolding>, BrokerError> {
        self.apply_delay().await;
        self.query_guard()?;
        Ok(self.state.read().await.holdings.clone())
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        self.apply_delay().await;
        self.query_guard()?;
        Ok(self.state.read().await.open_orders.clone())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<String, BrokerError> {
        self.apply_delay().await;
        let mut state = self.state.write().await;
        let outcome = state.place_script.pop_front().unwrap_or(PlaceOutcome::Accept);
        match outcome {
            PlaceOutcome::Accept => {
                state.next_order_seq += 1;
                let order_id = format!("MOCK{:06}", state.next_order_seq);
                debug!(
                    symbol = %request.tradingsymbol,
                    order_id = %order_id,
                    "mock 주문 접수"
                );
                state.placed.push(request.clone());
                Ok(order_id)
            }
            PlaceOutcome::RejectIlliquid => Err(BrokerError::IlliquidRejection(
                "Market orders are blocked for illiquid ETFs".to_string(),
            )),
            PlaceOutcome::Reject(reason) => Err(BrokerError::Rejected(reason)),
            PlaceOutcome::NetworkError => {
                Err(BrokerError::Network("mock: 연결 실패".to_string()))
            }
        }
    }

    fn broker_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use relay_core::domain::{OrderType, ProductType, TransactionType};
    use rust_decimal_macros::dec;

    use super::*;

    fn market_buy(symbol: &str) -> OrderRequest {
        OrderRequest::market(symbol, Segment::Nse, TransactionType::Buy, 10, ProductType::Cnc)
    }

    #[tokio::test]
    async fn unscripted_place_accepts_with_sequential_ids() {
        let broker = MockBroker::new();
        let id1 = broker.place_order(&market_buy("RELIANCE")).await.unwrap();
        let id2 = broker.place_order(&market_buy("TCS")).await.unwrap();
        assert_eq!(id1, "MOCK000001");
        assert_eq!(id2, "MOCK000002");
        assert_eq!(broker.placed_orders().await.len(), 2);
    }

    #[tokio::test]
    async fn scripted_illiquid_then_accept() {
        let broker = MockBroker::new();
        broker.script_place(PlaceOutcome::RejectIlliquid).await;

        let err = broker.place_order(&market_buy("GOLDBEES")).await.unwrap_err();
        assert!(err.is_illiquid_rejection());

        // 스크립트 소진 후에는 접수
        let retry = market_buy("GOLDBEES").with_protected_price(dec!(100.5));
        let id = broker.place_order(&retry).await.unwrap();
        assert_eq!(id, "MOCK000001");

        let placed = broker.placed_orders().await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].order_type, OrderType::Limit);
    }

    #[tokio::test]
    async fn failing_queries_do_not_block_placement() {
        let broker = MockBroker::failing_queries();
        assert!(broker.net_positions().await.is_err());
        assert!(broker.holdings().await.is_err());
        assert!(broker.open_orders().await.is_err());
        assert!(broker.place_order(&market_buy("RELIANCE")).await.is_ok());
    }
}
