//! 신호-주문 재조정 엔진.
//!
//! 웹훅 신호의 **의도**(롱 전환 / 숏 전환)를 브로커의 **현재 포지션**과
//! 비교해 필요한 주문만 만들어 내는 핵심 파이프라인입니다.
//!
//! ```text
//!          ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! 신호 ──▶ │ 멱등 게이트 │──▶│ 계약 해석  │──▶│ 포지션 조회 │──▶│ 결정/제출  │──▶ 원장
//!          └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! 별도로 [`rollover::RolloverScheduler`]가 평일 09:25에 깨어나
//! 만기 임박 선물 포지션을 차월물로 이월합니다.

pub mod config;
pub mod decide;
pub mod engine;
pub mod error;
pub mod position;
pub mod resolver;
pub mod rollover;
pub mod submit;

pub use config::EngineConfig;
pub use decide::{reconcile, Decision, OrderPlan, SkipReason};
pub use engine::{ReconciliationEngine, ReconciliationReport};
pub use error::{EngineError, Result};
pub use position::PositionReader;
pub use resolver::{select_entry_contract, ContractResolver, MAX_CANDIDATES};
pub use rollover::{next_rollover_wake, RolloverReport, RolloverScheduler};
pub use submit::{OrderSubmitter, SubmitContext, SubmitOutcome};
