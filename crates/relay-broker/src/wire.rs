//! 브로커 와이어 값 분류.
//!
//! 브로커가 반환하는 자유 텍스트 에러와 상태 문자열을 내부 분류로
//! 변환합니다. 분류는 이 경계에서만 수행되며, 파이프라인 내부에서는
//! 문자열 패턴 매칭을 하지 않습니다.

use relay_core::domain::BrokerError;

/// 미체결로 간주하는 브로커 주문 상태.
///
/// 중복 미체결 주문 검사에서 이 상태의 기존 주문이 발견되면
/// 같은 방향의 새 주문은 제출하지 않습니다.
pub const PENDING_ORDER_STATUSES: &[&str] = &[
    "OPEN",
    "TRIGGER PENDING",
    "PENDING",
    "AMO REQ RECEIVED",
    "MODIFY PENDING",
    "CANCEL PENDING",
];

/// 유동성 부족 거부 패턴.
///
/// 브로커가 시장가 주문을 차단한 종목의 거부 메시지 패턴.
/// 이 패턴에 해당하는 거부만 보호가 지정가로 1회 재시도합니다.
pub const ILLIQUID_ERROR_PATTERNS: &[&str] = &[
    "market orders are blocked for illiquid etfs",
    "market protection",
    "illiquid",
];

/// 주문 상태 문자열이 미체결 상태인지 확인.
pub fn is_pending_status(status: &str) -> bool {
    let upper = status.trim().to_uppercase();
    PENDING_ORDER_STATUSES.iter().any(|s| upper == *s)
}

/// 거부 메시지가 유동성 부족 관련인지 확인.
pub fn is_illiquid_error(error_message: &str) -> bool {
    let lower = error_message.to_lowercase();
    ILLIQUID_ERROR_PATTERNS.iter().any(|p| lower.contains(p))
}

/// 브로커 거부 메시지를 내부 에러로 분류.
///
/// 유동성 부족 패턴이면 `IlliquidRejection` (보호가 폴백 대상),
/// 그 외에는 터미널 `Rejected`.
pub fn classify_rejection(error_message: &str) -> BrokerError {
    if is_illiquid_error(error_message) {
        BrokerError::IlliquidRejection(error_message.to_string())
    } else {
        BrokerError::Rejected(error_message.to_string())
    }
}
