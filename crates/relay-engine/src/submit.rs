//! 주문 제출기.
//!
//! 기록 규약: 브로커 호출 전에 ATTEMPTING 행을 먼저 쓰고, 호출 결과에
//! 따라 정확히 한 번의 터미널 업데이트를 합니다. 재조정은 원장 행 없이
//! 성공을 보고하지 않습니다.
//!
//! # 제출 흐름
//!
//! ```text
//! OrderPlan
//!   │
//!   ▼ 원장 ATTEMPTING 기록
//!   ├─ 포워드 테스트? ──→ 합성 주문번호 FT_{uuid} → FORWARD_TEST_SUCCESS
//!   │
//!   ▼ 중복 미체결 검사 (실패 시 fail-open)
//!   ├─ 같은 방향 미체결 존재 ──→ DUPLICATE_PREVENTED (브로커 호출 없음)
//!   │
//!   ▼ 시장가 주문
//!   ├─ 접수 ──→ SUCCESS
//!   ├─ 유동성 부족 거부 ──→ 보호가 지정가로 1회 재시도
//!   │     ├─ 접수 ──→ SUCCESS
//!   │     └─ 거부 ──→ FAILED (두 에러 결합)
//!   └─ 기타 거부 ──→ FAILED (재시도 없음)
//! ```

use std::sync::Arc;

use relay_broker::wire::is_pending_status;
use relay_core::domain::{BrokerGateway, OrderRequest, TransactionType};
use relay_store::{NewOrderAttempt, OrderLog, OrderStatus};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{decide::OrderPlan, error::Result};

/// 제출 컨텍스트 (감사 열 + 보호가 기준 가격).
#[derive(Debug, Clone)]
pub struct SubmitContext {
    /// 신호 발생 시점의 참조 가격 (보호가 산출과 원장 기록에 사용).
    /// 롤오버 주문처럼 신호 없이 나가는 주문은 None.
    pub reference_price: Option<Decimal>,
    /// 신호 제공자 타임스탬프
    pub signal_time: String,
    /// 정규화된 기초자산 이름
    pub base_symbol: String,
    /// 재조정 추적 id
    pub request_id: Uuid,
}

/// 제출 결과.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub attempt_id: i64,
    pub status: OrderStatus,
    pub broker_order_id: Option<String>,
    pub error_message: Option<String>,
}

/// 주문 제출기.
pub struct OrderSubmitter {
    broker: Arc<dyn BrokerGateway>,
    ledger: Arc<dyn OrderLog>,
    forward_testing: bool,
    protection_buffer: Decimal,
}

impl OrderSubmitter {
    pub fn new(
        broker: Arc<dyn BrokerGateway>,
        ledger: Arc<dyn OrderLog>,
        forward_testing: bool,
        protection_buffer: Decimal,
    ) -> Self {
        Self {
            broker,
            ledger,
            forward_testing,
            protection_buffer,
        }
    }

    /// 보호가 산출: 매수는 +버퍼, 매도는 -버퍼 (소수점 2자리).
    fn protected_price(&self, reference: Decimal, transaction_type: TransactionType) -> Decimal {
        let factor = match transaction_type {
            TransactionType::Buy => Decimal::ONE + self.protection_buffer,
            TransactionType::Sell => Decimal::ONE - self.protection_buffer,
        };
        (reference * factor).round_dp(2)
    }

    /// 주문 제출.
    ///
    /// 브로커 거부는 에러가 아니라 터미널 상태로 기록되어
    /// `SubmitOutcome`으로 반환됩니다. 원장 쓰기 실패만 에러입니다.
    pub async fn submit(&self, plan: &OrderPlan, ctx: &SubmitContext) -> Result<SubmitOutcome> {
        let request = OrderRequest::market(
            plan.tradingsymbol.clone(),
            plan.exchange,
            plan.transaction_type,
            plan.quantity,
            plan.product,
        );

        // 브로커 호출 전 ATTEMPTING 기록
        let attempt_id = self
            .ledger
            .insert_attempt(&NewOrderAttempt {
                tradingsymbol: plan.tradingsymbol.clone(),
                exchange: plan.exchange,
                transaction_type: plan.transaction_type,
                quantity: plan.quantity,
                price: ctx.reference_price,
                order_type: request.order_type,
                product: plan.product,
                signal_time: ctx.signal_time.clone(),
                base_symbol: ctx.base_symbol.clone(),
                request_id: ctx.request_id,
            })
            .await?;

        // 포워드 테스트: 브로커 호출 없이 합성 주문번호 기록
        if self.forward_testing {
            let synthetic_id = format!("FT_{}", Uuid::new_v4());
            self.ledger
                .finalize(
                    attempt_id,
                    OrderStatus::ForwardTestSuccess,
                    Some(&synthetic_id),
                    None,
                )
                .await?;
            info!(
                symbol = %plan.tradingsymbol,
                order_id = %synthetic_id,
                "포워드 테스트 주문 기록"
            );
            return Ok(SubmitOutcome {
                attempt_id,
                status: OrderStatus::ForwardTestSuccess,
                broker_order_id: Some(synthetic_id),
                error_message: None,
            });
        }

        // 중복 미체결 검사 (조회 실패는 fail-open)
        if self.has_pending_duplicate(plan).await {
            self.ledger
                .finalize(
                    attempt_id,
                    OrderStatus::DuplicatePrevented,
                    None,
                    Some("같은 방향 미체결 주문 존재"),
                )
                .await?;
            return Ok(SubmitOutcome {
                attempt_id,
                status: OrderStatus::DuplicatePrevented,
                broker_order_id: None,
                error_message: Some("같은 방향 미체결 주문 존재".to_string()),
            });
        }

        // 1차: 시장가
        match self.broker.place_order(&request).await {
            Ok(order_id) => {
                self.ledger
                    .finalize(attempt_id, OrderStatus::Success, Some(&order_id), None)
                    .await?;
                info!(
                    symbol = %plan.tradingsymbol,
                    order_id = %order_id,
                    quantity = plan.quantity,
                    "시장가 주문 접수"
                );
                Ok(SubmitOutcome {
                    attempt_id,
                    status: OrderStatus::Success,
                    broker_order_id: Some(order_id),
                    error_message: None,
                })
            }
            Err(first_error) if first_error.is_illiquid_rejection() => {
                // 참조 가격 없이는 보호가를 산출할 수 없음
                let Some(reference) = ctx.reference_price else {
                    let message =
                        format!("유동성 부족 거부, 참조 가격 없어 재시도 불가: {}", first_error);
                    self.ledger
                        .finalize(attempt_id, OrderStatus::Failed, None, Some(&message))
                        .await?;
                    return Ok(SubmitOutcome {
                        attempt_id,
                        status: OrderStatus::Failed,
                        broker_order_id: None,
                        error_message: Some(message),
                    });
                };

                // 2차: 보호가 지정가 재시도 (정확히 1회)
                let limit_price = self.protected_price(reference, plan.transaction_type);
                warn!(
                    symbol = %plan.tradingsymbol,
                    limit_price = %limit_price,
                    error = %first_error,
                    "시장가 차단 종목, 보호가 지정가 재시도"
                );
                let retry = request.clone().with_protected_price(limit_price);
                match self.broker.place_order(&retry).await {
                    Ok(order_id) => {
                        self.ledger
                            .finalize(attempt_id, OrderStatus::Success, Some(&order_id), None)
                            .await?;
                        info!(
                            symbol = %plan.tradingsymbol,
                            order_id = %order_id,
                            limit_price = %limit_price,
                            "보호가 지정가 주문 접수"
                        );
                        Ok(SubmitOutcome {
                            attempt_id,
                            status: OrderStatus::Success,
                            broker_order_id: Some(order_id),
                            error_message: None,
                        })
                    }
                    Err(second_error) => {
                        let combined =
                            format!("시장가: {} / 보호가: {}", first_error, second_error);
                        self.ledger
                            .finalize(attempt_id, OrderStatus::Failed, None, Some(&combined))
                            .await?;
                        Ok(SubmitOutcome {
                            attempt_id,
                            status: OrderStatus::Failed,
                            broker_order_id: None,
                            error_message: Some(combined),
                        })
                    }
                }
            }
            Err(terminal) => {
                let message = terminal.to_string();
                self.ledger
                    .finalize(attempt_id, OrderStatus::Failed, None, Some(&message))
                    .await?;
                Ok(SubmitOutcome {
                    attempt_id,
                    status: OrderStatus::Failed,
                    broker_order_id: None,
                    error_message: Some(message),
                })
            }
        }
    }

    /// 같은 종목/거래소/방향의 미체결 주문 존재 여부.
    ///
    /// 조회 실패는 fail-open (주문 진행): 관측용 조회가 거래를 막는
    /// 것이 간헐적 중복 제출보다 나쁘고, 중복은 상류의 멱등성 게이트가
    /// 이미 완화하고 있습니다.
    async fn has_pending_duplicate(&self, plan: &OrderPlan) -> bool {
        match self.broker.open_orders().await {
            Ok(orders) => orders.iter().any(|o| {
                o.tradingsymbol == plan.tradingsymbol
                    && o.exchange == plan.exchange
                    && o.transaction_type == plan.transaction_type
                    && is_pending_status(&o.status)
            }),
            Err(e) => {
                warn!(
                    symbol = %plan.tradingsymbol,
                    error = %e,
                    "미체결 주문 조회 실패, fail-open으로 제출 진행"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_broker::{MockBroker, PlaceOutcome};
    use relay_core::domain::{OpenOrder, OrderType, ProductType, Segment};
    use relay_store::MemoryLedger;
    use rust_decimal_macros::dec;

    use super::*;

    fn plan(symbol: &str) -> OrderPlan {
        OrderPlan {
            tradingsymbol: symbol.to_string(),
            exchange: Segment::Nse,
            transaction_type: TransactionType::Buy,
            quantity: 10,
            product: ProductType::Cnc,
        }
    }

    fn ctx(price: Decimal) -> SubmitContext {
        SubmitContext {
            reference_price: Some(price),
            signal_time: "2026-08-25T09:20:00Z".to_string(),
            base_symbol: "RELIANCE".to_string(),
            request_id: Uuid::new_v4(),
        }
    }

    fn submitter(
        broker: Arc<MockBroker>,
        ledger: Arc<MemoryLedger>,
        forward_testing: bool,
    ) -> OrderSubmitter {
        OrderSubmitter::new(broker, ledger, forward_testing, dec!(0.005))
    }

    #[tokio::test]
    async fn market_success_finalizes_ledger_row() {
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("RELIANCE"), &ctx(dec!(2500)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Success);
        assert!(outcome.broker_order_id.is_some());
        let rows = ledger.snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "SUCCESS");
    }

    #[tokio::test]
    async fn illiquid_buy_retries_at_protected_limit() {
        let broker = Arc::new(MockBroker::new());
        broker.script_place(PlaceOutcome::RejectIlliquid).await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("GOLDBEES"), &ctx(dec!(100)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Success);
        let placed = broker.placed_orders().await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].order_type, OrderType::Limit);
        assert_eq!(placed[0].price, Some(dec!(100.5)));
        assert_eq!(placed[0].tag.as_deref(), Some("market_protection"));
    }

    #[tokio::test]
    async fn illiquid_sell_subtracts_protection_buffer() {
        let broker = Arc::new(MockBroker::new());
        broker.script_place(PlaceOutcome::RejectIlliquid).await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let mut sell_plan = plan("GOLDBEES");
        sell_plan.transaction_type = TransactionType::Sell;
        let outcome = submitter.submit(&sell_plan, &ctx(dec!(100))).await.unwrap();

        assert_eq!(outcome.status, OrderStatus::Success);
        let placed = broker.placed_orders().await;
        assert_eq!(placed[0].price, Some(dec!(99.5)));
    }

    #[tokio::test]
    async fn both_attempts_rejected_records_combined_failure() {
        let broker = Arc::new(MockBroker::new());
        broker.script_place(PlaceOutcome::RejectIlliquid).await;
        broker
            .script_place(PlaceOutcome::Reject("지정가도 거부".to_string()))
            .await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("GOLDBEES"), &ctx(dec!(100)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Failed);
        let message = outcome.error_message.unwrap();
        assert!(message.contains("시장가"));
        assert!(message.contains("보호가"));
        assert!(broker.placed_orders().await.is_empty());
    }

    #[tokio::test]
    async fn terminal_rejection_does_not_retry() {
        let broker = Arc::new(MockBroker::new());
        broker
            .script_place(PlaceOutcome::Reject("Insufficient funds".to_string()))
            .await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("RELIANCE"), &ctx(dec!(2500)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Failed);
        // 재시도 없음: 접수된 주문 0건
        assert!(broker.placed_orders().await.is_empty());
    }

    #[tokio::test]
    async fn pending_duplicate_refuses_without_broker_call() {
        let broker = Arc::new(MockBroker::new());
        broker
            .set_open_orders(vec![OpenOrder {
                order_id: "ORD1".to_string(),
                tradingsymbol: "RELIANCE".to_string(),
                exchange: Segment::Nse,
                transaction_type: TransactionType::Buy,
                status: "TRIGGER PENDING".to_string(),
                quantity: 10,
                price: None,
            }])
            .await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("RELIANCE"), &ctx(dec!(2500)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::DuplicatePrevented);
        assert!(broker.placed_orders().await.is_empty());
        assert_eq!(ledger.snapshot().await[0].status, "DUPLICATE_PREVENTED");
    }

    #[tokio::test]
    async fn forward_test_skips_broker_and_duplicate_check() {
        let broker = Arc::new(MockBroker::new());
        // 미체결이 있어도 포워드 테스트는 검사 자체를 건너뜀
        broker
            .set_open_orders(vec![OpenOrder {
                order_id: "ORD1".to_string(),
                tradingsymbol: "RELIANCE".to_string(),
                exchange: Segment::Nse,
                transaction_type: TransactionType::Buy,
                status: "OPEN".to_string(),
                quantity: 10,
                price: None,
            }])
            .await;
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), true);

        let outcome = submitter
            .submit(&plan("RELIANCE"), &ctx(dec!(2500)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::ForwardTestSuccess);
        assert!(outcome.broker_order_id.unwrap().starts_with("FT_"));
        assert!(broker.placed_orders().await.is_empty());
    }

    #[tokio::test]
    async fn pending_check_failure_fails_open() {
        // 조회는 실패하지만 제출은 성공하는 브로커
        let broker = Arc::new(MockBroker::failing_queries());
        let ledger = Arc::new(MemoryLedger::new());
        let submitter = submitter(broker.clone(), ledger.clone(), false);

        let outcome = submitter
            .submit(&plan("RELIANCE"), &ctx(dec!(2500)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Success);
    }
}
