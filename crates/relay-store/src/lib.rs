//! 외부 저장소 계층.
//!
//! 재조정 파이프라인이 의존하는 두 저장소와 파생 뷰를 제공합니다:
//!
//! - **공유 캐시** (Redis): 멱등성 게이트의 set-if-absent 키와
//!   세그먼트별 종목 목록 캐시 (24시간 TTL)
//! - **주문 원장** (PostgreSQL): 모든 주문 시도의 영구 기록
//! - **실현 손익**: 원장의 체결 기록에서 매번 재계산되는 FIFO 파생 뷰
//!
//! # 저장소 구조
//!
//! ```text
//! 신호 → DuplicateGate ──→ Redis (idempotency:{symbol}:{time}, 24h)
//!          │
//!          ▼
//! ContractResolver ──────→ Redis (instrument_cache:{segment}, 24h)
//!          │
//!          ▼
//! OrderSubmitter ────────→ PostgreSQL (order_attempts)
//!          │
//!          ▼
//! PnL / 리포트 ──────────→ 원장에서 FIFO 재계산 (저장하지 않음)
//! ```

pub mod error;
pub mod gate;
pub mod ledger;
pub mod pnl;
pub mod retry;
pub mod shared_cache;

pub use error::{Result, StoreError};
pub use gate::{DuplicateGate, MemoryGate, RedisGate};
pub use ledger::{
    LedgerStats, MemoryLedger, NewOrderAttempt, OrderAttempt, OrderLog, OrderStatus, PgOrderLedger,
    PURGE_CONFIRMATION_TOKEN,
};
pub use pnl::{
    portfolio_summary, realized_pnl, symbol_report, Fill, FillSide, PortfolioSummary, SymbolPnl,
};
pub use retry::{with_retry_if, RetryConfig};
pub use shared_cache::SharedCache;
