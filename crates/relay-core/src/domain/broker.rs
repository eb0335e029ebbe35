//! 브로커 게이트웨이 추상화.
//!
//! 종목 목록, 포지션/보유잔고, 미체결 주문 조회와 주문 제출을
//! 브로커 중립적인 인터페이스로 제공합니다. 인증/토큰 교환은
//! 게이트웨이 구현 내부의 책임이며 이 추상화에 나타나지 않습니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Instrument, OrderRequest, ProductType, Segment, TransactionType};

// =============================================================================
// 조회 타입
// =============================================================================

/// 브로커 순포지션.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// 거래 심볼
    pub tradingsymbol: String,
    /// 거래소 세그먼트
    pub exchange: Segment,
    /// 상품 유형
    pub product: ProductType,
    /// 부호 있는 수량 (양수=롱, 음수=숏, 0=플랫)
    pub quantity: i64,
}

/// 브로커 보유잔고 (현물 전용 뷰).
///
/// 당일 숏 포지션과 보유 주식은 서로 다른 브로커 뷰에 기록되므로
/// 현물 세그먼트는 포지션과 보유잔고를 합산해야 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerHolding {
    /// 거래 심볼
    pub tradingsymbol: String,
    /// 결제 완료 수량
    pub quantity: i64,
    /// 미결제(T+1) 수량
    pub t1_quantity: i64,
}

impl BrokerHolding {
    /// 결제 완료 + 미결제 합산 수량.
    pub fn total_quantity(&self) -> i64 {
        self.quantity + self.t1_quantity
    }
}

/// 브로커 미체결 주문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    /// 브로커 주문번호
    pub order_id: String,
    /// 거래 심볼
    pub tradingsymbol: String,
    /// 거래소 세그먼트
    pub exchange: Segment,
    /// 매수/매도
    pub transaction_type: TransactionType,
    /// 브로커 상태 문자열 (OPEN, TRIGGER PENDING 등, 와이어 값 그대로)
    pub status: String,
    /// 주문 수량
    pub quantity: i64,
    /// 지정가 (시장가면 None)
    pub price: Option<Decimal>,
}

// =============================================================================
// 에러 타입
// =============================================================================

/// 브로커 게이트웨이 에러.
///
/// 주문 거부는 게이트웨이 경계에서 분류됩니다:
/// `IlliquidRejection`은 보호가 폴백으로 1회 재시도 가능,
/// `Rejected`는 터미널 거부로 재시도하지 않습니다.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),
    /// 인증 실패 (토큰 만료 등)
    #[error("인증 실패: {0}")]
    Authentication(String),
    /// 유동성 부족 종목의 시장가 주문 차단 (보호가 폴백 대상)
    #[error("유동성 부족 거부: {0}")]
    IlliquidRejection(String),
    /// 기타 주문 거부 (터미널)
    #[error("주문 거부: {0}")]
    Rejected(String),
    /// 조회 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),
    /// 응답 파싱 실패
    #[error("파싱 에러: {0}")]
    Parse(String),
}

impl BrokerError {
    /// 보호가 폴백으로 재시도 가능한 거부인지 확인.
    pub fn is_illiquid_rejection(&self) -> bool {
        matches!(self, BrokerError::IlliquidRejection(_))
    }
}

// =============================================================================
// BrokerGateway Trait
// =============================================================================

/// 브로커 게이트웨이 trait.
///
/// 브로커 호출은 느리고 상태를 가지므로, 호출자는 같은 신호에 대해
/// 주문 제출을 중복 호출해서는 안 됩니다. 그 보장은 상위의
/// 멱등성 게이트와 원장 기록이 담당합니다.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// 세그먼트 전체 종목 목록 조회.
    ///
    /// 목록이 크므로 호출자는 공유 캐시에 24시간 TTL로 저장합니다.
    ///
    /// # Errors
    ///
    /// - `BrokerError::Network`: 네트워크 연결 실패
    /// - `BrokerError::Authentication`: 인증 실패
    async fn list_instruments(&self, segment: Segment) -> Result<Vec<Instrument>, BrokerError>;

    /// 순포지션 조회.
    async fn net_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// 보유잔고 조회 (현물).
    async fn holdings(&self) -> Result<Vec<BrokerHolding>, BrokerError>;

    /// 미체결 주문 조회.
    ///
    /// 중복 미체결 주문 검사에 사용됩니다. 이 조회의 실패는
    /// fail-open으로 처리됩니다 (주문 진행).
    async fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError>;

    /// 주문 제출.
    ///
    /// # Returns
    ///
    /// 브로커 주문번호.
    ///
    /// # Errors
    ///
    /// - `BrokerError::IlliquidRejection`: 시장가 차단 종목 (보호가 재시도 대상)
    /// - `BrokerError::Rejected`: 기타 거부 (터미널)
    async fn place_order(&self, request: &OrderRequest) -> Result<String, BrokerError>;

    /// 브로커 이름 (로깅용).
    fn broker_name(&self) -> &str;
}
