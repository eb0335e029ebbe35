//! 재조정 파이프라인 에러 타입.

use relay_core::domain::{BrokerError, SignalError};
use relay_store::StoreError;
use thiserror::Error;

/// 재조정 파이프라인 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 신호 검증 실패 (재시도하지 않음)
    #[error("신호 검증 실패: {0}")]
    Signal(#[from] SignalError),
    /// 브로커 게이트웨이 에러
    #[error("브로커 에러: {0}")]
    Broker(#[from] BrokerError),
    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),
    /// 거래 가능한 계약을 찾지 못함
    #[error("계약 없음: {base_symbol} ({segment})")]
    NoContract {
        base_symbol: String,
        segment: String,
    },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, EngineError>;
