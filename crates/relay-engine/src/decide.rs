//! 재조정 결정 상태 기계.
//!
//! 현재 부호 있는 포지션과 신호 액션만으로 결정하는 순수 함수입니다.
//! I/O가 없으므로 전체 전이 표를 단위 테스트로 검증합니다.
//!
//! | action | 롱 (>0) | 숏 (<0) | 플랫 (=0) |
//! |---|---|---|---|
//! | buy | no-op | 커버: BUY abs(qty) | 진입: BUY req×lot |
//! | sell | 청산: SELL qty | no-op | 숏 진입: SELL req×lot |

use relay_core::domain::{Instrument, ProductType, Segment, SignalAction, TransactionType};

/// 주문을 내지 않는 이유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 이미 롱 포지션 보유 중인데 매수 신호
    AlreadyLong,
    /// 이미 숏 포지션 보유 중인데 매도 신호
    AlreadyShort,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyLong => write!(f, "이미 롱 포지션 보유"),
            SkipReason::AlreadyShort => write!(f, "이미 숏 포지션 보유"),
        }
    }
}

/// 제출할 주문 계획.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    pub tradingsymbol: String,
    pub exchange: Segment,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub product: ProductType,
}

/// 재조정 결정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 주문 없음
    Skip(SkipReason),
    /// 주문 제출
    Submit(OrderPlan),
}

/// 상품 유형 결정.
///
/// 파생은 항상 NRML. 현물은 진입/청산이 CNC, 숏 진입과 숏 커버는
/// MIS (현물 공매도는 당일 청산 상품으로만 가능).
fn product_for(segment: Segment, short_side: bool) -> ProductType {
    if segment.is_derivative() {
        ProductType::Nrml
    } else if short_side {
        ProductType::Mis
    } else {
        ProductType::Cnc
    }
}

/// 재조정 결정 (순수 함수).
///
/// `instrument`는 주문이 나갈 종목입니다: 플랫이면 진입 계약 (파생은
/// 롤오버 규칙으로 선택), 포지션이 있으면 그 포지션을 실제로 들고 있는
/// 계약입니다.
pub fn reconcile(
    action: SignalAction,
    signed_quantity: i64,
    requested_quantity: i64,
    instrument: &Instrument,
) -> Decision {
    let lot = i64::from(instrument.lot_size.max(1));
    let submit = |transaction_type, quantity, short_side| {
        Decision::Submit(OrderPlan {
            tradingsymbol: instrument.tradingsymbol.clone(),
            exchange: instrument.exchange,
            transaction_type,
            quantity,
            product: product_for(instrument.exchange, short_side),
        })
    };

    match (action, signed_quantity.signum()) {
        (SignalAction::Buy, 1) => Decision::Skip(SkipReason::AlreadyLong),
        (SignalAction::Buy, -1) => {
            // 숏 커버: 보유 숏 전량 매수
            submit(TransactionType::Buy, signed_quantity.abs(), true)
        }
        (SignalAction::Buy, _) => {
            // 신규 진입
            submit(TransactionType::Buy, requested_quantity * lot, false)
        }
        (SignalAction::Sell, 1) => {
            // 롱 청산: 보유 롱 전량 매도
            submit(TransactionType::Sell, signed_quantity, false)
        }
        (SignalAction::Sell, -1) => Decision::Skip(SkipReason::AlreadyShort),
        (SignalAction::Sell, _) => {
            // 신규 숏 진입
            submit(TransactionType::Sell, requested_quantity * lot, true)
        }
    }
}
