//! 재조정 엔진.
//!
//! 한 신호의 전체 파이프라인을 순서대로 실행합니다:
//!
//! ```text
//! 신호 → 멱등성 게이트 → 계약 해석 → 포지션 조회 → 결정 → 제출 → 원장
//! ```
//!
//! 신호 간 락은 멱등성 게이트뿐입니다. 여러 신호가 동시에 재조정될 수
//! 있으며, 포지션은 결정마다 새로 조회합니다.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use relay_core::domain::{normalize_base_symbol, Instrument, Signal};
use relay_store::DuplicateGate;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    decide::{reconcile, Decision, SkipReason},
    error::{EngineError, Result},
    position::PositionReader,
    resolver::{select_entry_contract, ContractResolver},
    submit::{OrderSubmitter, SubmitContext, SubmitOutcome},
};

/// 한 신호의 재조정 결과.
#[derive(Debug)]
pub enum ReconciliationReport {
    /// 중복 신호로 차단됨 (원장 기록 없음)
    Duplicate,
    /// 포지션 상태상 주문 불필요
    Skipped(SkipReason),
    /// 주문 제출됨 (터미널 상태는 outcome 참고)
    Submitted(SubmitOutcome),
}

/// 재조정 엔진.
pub struct ReconciliationEngine {
    gate: Arc<dyn DuplicateGate>,
    resolver: ContractResolver,
    positions: PositionReader,
    submitter: OrderSubmitter,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        gate: Arc<dyn DuplicateGate>,
        resolver: ContractResolver,
        positions: PositionReader,
        submitter: OrderSubmitter,
        config: EngineConfig,
    ) -> Self {
        Self {
            gate,
            resolver,
            positions,
            submitter,
            config,
        }
    }

    /// 신호 하나 재조정.
    #[instrument(skip(self, signal), fields(symbol = %signal.symbol, action = %signal.action))]
    pub async fn handle_signal(&self, signal: &Signal) -> Result<ReconciliationReport> {
        let request_id = Uuid::new_v4();

        if !self.gate.admit(&signal.idempotency_key()).await {
            return Ok(ReconciliationReport::Duplicate);
        }

        // 요청 범위 캐시 초기화 (신호 간 누수 방지)
        self.resolver.begin_request().await;

        let base_symbol = normalize_base_symbol(&signal.symbol);
        let candidates = self
            .resolver
            .resolve_candidates(&signal.symbol, signal.segment)
            .await?;
        if candidates.is_empty() {
            return Err(EngineError::NoContract {
                base_symbol,
                segment: signal.segment.to_string(),
            });
        }

        // 후보별 포지션 병렬 조회, 만기 순서로 첫 비영(非零) 포지션 선택
        let Some((instrument, signed_quantity)) = self.locate_position(&candidates).await else {
            return Err(EngineError::NoContract {
                base_symbol,
                segment: signal.segment.to_string(),
            });
        };

        let decision = reconcile(signal.action, signed_quantity, signal.quantity, &instrument);
        match decision {
            Decision::Skip(reason) => {
                info!(
                    symbol = %instrument.tradingsymbol,
                    signed_quantity = signed_quantity,
                    reason = %reason,
                    "주문 불필요"
                );
                Ok(ReconciliationReport::Skipped(reason))
            }
            Decision::Submit(plan) => {
                let outcome = self
                    .submitter
                    .submit(
                        &plan,
                        &SubmitContext {
                            reference_price: Some(signal.price),
                            signal_time: signal.signal_time.clone(),
                            base_symbol,
                            request_id,
                        },
                    )
                    .await?;
                Ok(ReconciliationReport::Submitted(outcome))
            }
        }
    }

    /// 포지션을 실제로 들고 있는 계약 탐색.
    ///
    /// 모든 후보가 플랫이면 롤오버 규칙으로 진입 계약을 선택합니다.
    async fn locate_position(&self, candidates: &[Instrument]) -> Option<(Instrument, i64)> {
        let reads = join_all(candidates.iter().map(|c| self.positions.read(c))).await;
        for (candidate, quantity) in candidates.iter().zip(reads) {
            if quantity != 0 {
                return Some((candidate.clone(), quantity));
            }
        }

        let today = Utc::now().with_timezone(&self.config.timezone).date_naive();
        let entry = select_entry_contract(candidates, today, self.config.rollover_threshold_days)?;
        Some((entry.clone(), 0))
    }
}
