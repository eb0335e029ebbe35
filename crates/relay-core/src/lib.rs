//! Relay 핵심 도메인 크레이트.
//!
//! 신호 → 주문 변환 파이프라인 전체에서 공유되는 도메인 타입과
//! 브로커 게이트웨이 추상화를 제공합니다. I/O는 포함하지 않습니다.
//!
//! # 구조
//!
//! ```text
//! relay-core
//! ├── domain
//! │   ├── signal      // 외부 알림에서 수신한 매매 신호
//! │   ├── instrument  // 거래 가능 종목 (현물/선물)
//! │   ├── order       // 주문 요청과 내부 주문 enum
//! │   └── broker      // BrokerGateway trait + 에러 분류
//! └── cache           // 요청 범위 계약 캐시
//! ```

pub mod cache;
pub mod domain;

pub use cache::ContractCache;
pub use domain::{
    BrokerError, BrokerGateway, BrokerHolding, BrokerPosition, Instrument, InstrumentType,
    OpenOrder, OrderRequest, OrderType, ProductType, Segment, Signal, SignalAction, SignalError,
    TransactionType, Validity,
};
