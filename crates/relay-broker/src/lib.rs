//! 브로커 경계 계층.
//!
//! 내부 닫힌 enum과 브로커 와이어 값 사이의 번역, 거부 사유 분류,
//! 그리고 테스트/포워드 테스트용 Mock 게이트웨이를 제공합니다.
//!
//! # 거래소 중립성
//!
//! 파이프라인은 `relay_core::BrokerGateway` trait에만 의존합니다.
//! 실제 브로커 커넥터와 Mock은 동일한 인터페이스를 구현하므로
//! 재조정 코드는 브로커 종류와 무관하게 동일하게 동작합니다.

pub mod mock;
pub mod wire;

pub use mock::{MockBroker, PlaceOutcome};
pub use wire::{
    classify_rejection, is_illiquid_error, is_pending_status, ILLIQUID_ERROR_PATTERNS,
    PENDING_ORDER_STATUSES,
};
