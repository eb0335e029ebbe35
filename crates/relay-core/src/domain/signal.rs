//! 외부 알림에서 수신한 매매 신호.
//!
//! 이 모듈은 웹훅 등 외부 채널에서 들어온 알림을 검증된 `Signal`로
//! 변환하는 타입을 정의합니다:
//! - `SignalAction` - 매수/매도 구분
//! - `Segment` - 거래소 세그먼트 (현물/파생)
//! - `Signal` - 검증 완료된 신호 엔티티

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 신호 검증 에러.
///
/// 검증 실패한 신호는 파이프라인에 진입하기 전에 거부되며 재시도하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// buy/sell 이외의 액션
    #[error("지원하지 않는 액션: {0}")]
    InvalidAction(String),
    /// 신호 타임스탬프 누락 (멱등성 보장 불가)
    #[error("신호 타임스탬프 누락: 멱등성을 보장할 수 없음")]
    MissingTimestamp,
    /// 심볼 누락
    #[error("심볼 누락")]
    MissingSymbol,
    /// 알 수 없는 세그먼트
    #[error("알 수 없는 세그먼트: {0}")]
    InvalidSegment(String),
}

/// 신호 액션 (매수/매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for SignalAction {
    type Err = SignalError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(SignalAction::Buy),
            "sell" => Ok(SignalAction::Sell),
            other => Err(SignalError::InvalidAction(other.to_string())),
        }
    }
}

/// 거래소 세그먼트.
///
/// 세그먼트가 상품 유형(CNC/MIS vs NRML)과 포지션 조회 방식
/// (보유잔고+당일포지션 vs 순포지션)을 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Segment {
    /// 현물 주식
    Nse,
    /// 주가지수/주식 선물
    Nfo,
    /// 상품 선물
    Mcx,
}

impl Segment {
    /// 파생 세그먼트 여부.
    pub fn is_derivative(&self) -> bool {
        matches!(self, Segment::Nfo | Segment::Mcx)
    }

    /// 롤오버 스케줄러가 추적하는 파생 세그먼트 목록.
    pub fn derivative_segments() -> &'static [Segment] {
        &[Segment::Nfo, Segment::Mcx]
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Nse => write!(f, "NSE"),
            Segment::Nfo => write!(f, "NFO"),
            Segment::Mcx => write!(f, "MCX"),
        }
    }
}

impl std::str::FromStr for Segment {
    type Err = SignalError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NSE" => Ok(Segment::Nse),
            "NFO" => Ok(Segment::Nfo),
            "MCX" => Ok(Segment::Mcx),
            other => Err(SignalError::InvalidSegment(other.to_string())),
        }
    }
}

/// 검증 완료된 매매 신호.
///
/// 한 번 생성되면 불변입니다. 생성 시점에 액션과 타임스탬프 존재 여부를
/// 검증하며, 파생 세그먼트는 수량을 1랏으로 강제합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// 매수/매도
    pub action: SignalAction,
    /// 신호 제공자가 보낸 원본 심볼 (연속 계약 마커 포함 가능)
    pub symbol: String,
    /// 거래소 세그먼트
    pub segment: Segment,
    /// 신호 발생 시점의 참조 가격 (보호가 산출에 사용)
    pub price: Decimal,
    /// 요청 수량 (파생은 랏 수, 현물은 주식 수)
    pub quantity: i64,
    /// 신호 제공자 타임스탬프 (멱등성 키의 일부, 불투명 문자열)
    pub signal_time: String,
}

impl Signal {
    /// 신호 검증 및 생성.
    ///
    /// # Errors
    ///
    /// - `SignalError::InvalidAction`: buy/sell 이외의 액션
    /// - `SignalError::MissingTimestamp`: 타임스탬프가 비어 있음
    /// - `SignalError::MissingSymbol`: 심볼이 비어 있음
    pub fn new(
        action: SignalAction,
        symbol: impl Into<String>,
        segment: Segment,
        price: Decimal,
        quantity: i64,
        signal_time: impl Into<String>,
    ) -> Result<Self, SignalError> {
        let symbol = symbol.into();
        let signal_time = signal_time.into();
        if symbol.trim().is_empty() {
            return Err(SignalError::MissingSymbol);
        }
        if signal_time.trim().is_empty() {
            return Err(SignalError::MissingTimestamp);
        }
        // 파생 세그먼트는 항상 1랏 단위로만 진입
        let quantity = if segment.is_derivative() {
            1
        } else {
            quantity.max(1)
        };
        Ok(Self {
            action,
            symbol,
            segment,
            price,
            quantity,
            signal_time,
        })
    }

    /// 멱등성 키 (공유 저장소의 set-if-absent 키).
    pub fn idempotency_key(&self) -> String {
        format!("idempotency:{}:{}", self.symbol, self.signal_time)
    }
}
