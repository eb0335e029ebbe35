//! 주문 원장.
//!
//! 모든 주문 시도의 영구 기록을 관리합니다. 재조정의 유일한
//! 영속 엔티티이며, 실현 손익은 이 원장에서 매번 재계산됩니다.
//!
//! # 기록 규약
//!
//! - 브로커 호출 전에 반드시 ATTEMPTING 행을 먼저 기록
//! - 이후 정확히 한 번의 터미널 업데이트 (SUCCESS / FAILED /
//!   DUPLICATE_PREVENTED / FORWARD_TEST_SUCCESS)
//! - 행 삭제는 명시적 관리 작업(purge)에서만 허용

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::domain::{OrderType, ProductType, Segment, TransactionType};

use crate::error::{Result, StoreError};

/// 전체 삭제 확인 토큰. CLI에서 이 값을 그대로 입력해야 purge가 실행됩니다.
pub const PURGE_CONFIRMATION_TOKEN: &str = "CONFIRM_DELETE_ALL_DATA";

// ================================================================================================
// Enums
// ================================================================================================

/// 주문 시도 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 브로커 호출 직전 기록되는 초기 상태
    Attempting,
    /// 브로커 접수 완료
    Success,
    /// 모든 시도 실패
    Failed,
    /// 중복 미체결 주문 감지로 제출 거부
    DuplicatePrevented,
    /// 포워드 테스트 모드의 합성 체결
    ForwardTestSuccess,
}

impl OrderStatus {
    /// 터미널 상태 여부.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Attempting)
    }

    /// 실현 손익 계산에 포함되는 체결 상태 여부.
    pub fn is_fill(&self) -> bool {
        matches!(self, OrderStatus::Success | OrderStatus::ForwardTestSuccess)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Attempting => write!(f, "ATTEMPTING"),
            OrderStatus::Success => write!(f, "SUCCESS"),
            OrderStatus::Failed => write!(f, "FAILED"),
            OrderStatus::DuplicatePrevented => write!(f, "DUPLICATE_PREVENTED"),
            OrderStatus::ForwardTestSuccess => write!(f, "FORWARD_TEST_SUCCESS"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ATTEMPTING" => Ok(OrderStatus::Attempting),
            "SUCCESS" => Ok(OrderStatus::Success),
            "FAILED" => Ok(OrderStatus::Failed),
            "DUPLICATE_PREVENTED" => Ok(OrderStatus::DuplicatePrevented),
            "FORWARD_TEST_SUCCESS" => Ok(OrderStatus::ForwardTestSuccess),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

// ================================================================================================
// Entities
// ================================================================================================

/// 주문 시도 엔티티.
///
/// enum 필드는 와이어 값 문자열로 저장되며, 필요 시 `FromStr`로
/// 내부 enum으로 복원합니다.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderAttempt {
    pub id: i64,
    pub tradingsymbol: String,
    pub exchange: String,
    pub transaction_type: String,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub order_type: String,
    pub product: String,
    pub status: String,
    pub broker_order_id: Option<String>,
    pub error_message: Option<String>,
    /// 신호 제공자 타임스탬프 (감사용, 멱등성 키의 일부)
    pub signal_time: String,
    /// 정규화된 기초자산 이름 (감사용)
    pub base_symbol: String,
    /// 재조정 단위 추적 id
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderAttempt {
    /// 저장된 상태 문자열을 enum으로 복원.
    pub fn parsed_status(&self) -> Result<OrderStatus> {
        self.status
            .parse()
            .map_err(|reason| StoreError::CorruptRecord {
                id: self.id,
                reason,
            })
    }
}

/// 주문 시도 생성 요청.
#[derive(Debug, Clone)]
pub struct NewOrderAttempt {
    pub tradingsymbol: String,
    pub exchange: Segment,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub order_type: OrderType,
    pub product: ProductType,
    pub signal_time: String,
    pub base_symbol: String,
    pub request_id: Uuid,
}

/// 원장 통계.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerStats {
    pub total_count: i64,
    pub attempting_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub duplicate_prevented_count: i64,
    pub forward_test_count: i64,
}

// ================================================================================================
// OrderLog Trait
// ================================================================================================

/// 주문 원장 trait.
#[async_trait]
pub trait OrderLog: Send + Sync {
    /// ATTEMPTING 행 삽입. 자동 생성된 id를 반환합니다.
    async fn insert_attempt(&self, attempt: &NewOrderAttempt) -> Result<i64>;

    /// 터미널 상태로 업데이트.
    ///
    /// # Errors
    ///
    /// - `StoreError::AttemptNotFound`: 해당 id의 행이 없음
    async fn finalize(
        &self,
        id: i64,
        status: OrderStatus,
        broker_order_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// 한 종목의 체결 행 조회 (생성 시간 오름차순).
    ///
    /// SUCCESS / FORWARD_TEST_SUCCESS 상태이면서 브로커 주문번호가 있는
    /// 행만 반환합니다. FIFO 매칭의 입력입니다.
    async fn fills_by_symbol(
        &self,
        tradingsymbol: &str,
        exchange: Segment,
    ) -> Result<Vec<OrderAttempt>>;

    /// 최근 주문 시도 조회 (생성 시간 내림차순).
    async fn recent_attempts(&self, limit: i64) -> Result<Vec<OrderAttempt>>;

    /// 체결이 있는 (종목, 거래소) 쌍 목록.
    async fn symbols_with_fills(&self) -> Result<Vec<(String, String)>>;

    /// 원장 통계 조회.
    async fn stats(&self) -> Result<LedgerStats>;

    /// 포워드 테스트 행 삭제. 삭제된 행 수를 반환합니다.
    async fn clear_forward_test(&self) -> Result<u64>;

    /// 전체 삭제. 확인 토큰이 일치해야 실행됩니다.
    ///
    /// # Errors
    ///
    /// - `StoreError::PurgeRefused`: 토큰 불일치
    async fn purge_all(&self, confirmation: &str) -> Result<u64>;
}

// ================================================================================================
// PostgreSQL 구현
// ================================================================================================

/// PostgreSQL 주문 원장.
#[derive(Debug, Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 원장 테이블/인덱스 생성.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_attempts (
                id              BIGSERIAL PRIMARY KEY,
                tradingsymbol   TEXT NOT NULL,
                exchange        TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                quantity        BIGINT NOT NULL,
                price           NUMERIC,
                order_type      TEXT NOT NULL,
                product         TEXT NOT NULL,
                status          TEXT NOT NULL,
                broker_order_id TEXT,
                error_message   TEXT,
                signal_time     TEXT NOT NULL,
                base_symbol     TEXT NOT NULL,
                request_id      UUID NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_order_attempts_symbol
                ON order_attempts (tradingsymbol, exchange, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_order_attempts_status
                ON order_attempts (status, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("주문 원장 마이그레이션 완료");
        Ok(())
    }
}

#[async_trait]
impl OrderLog for PgOrderLedger {
    async fn insert_attempt(&self, attempt: &NewOrderAttempt) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO order_attempts (
                tradingsymbol, exchange, transaction_type, quantity, price,
                order_type, product, status, signal_time, base_symbol, request_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'ATTEMPTING', $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&attempt.tradingsymbol)
        .bind(attempt.exchange.to_string())
        .bind(attempt.transaction_type.to_string())
        .bind(attempt.quantity)
        .bind(attempt.price)
        .bind(attempt.order_type.to_string())
        .bind(attempt.product.to_string())
        .bind(&attempt.signal_time)
        .bind(&attempt.base_symbol)
        .bind(attempt.request_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(attempt_id = id, symbol = %attempt.tradingsymbol, "주문 시도 기록");
        Ok(id)
    }

    async fn finalize(
        &self,
        id: i64,
        status: OrderStatus,
        broker_order_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE order_attempts
            SET status = $2, broker_order_id = $3, error_message = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(broker_order_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AttemptNotFound(id));
        }
        debug!(attempt_id = id, status = %status, "주문 시도 터미널 업데이트");
        Ok(())
    }

    async fn fills_by_symbol(
        &self,
        tradingsymbol: &str,
        exchange: Segment,
    ) -> Result<Vec<OrderAttempt>> {
        let rows = sqlx::query_as::<_, OrderAttempt>(
            r#"
            SELECT * FROM order_attempts
            WHERE tradingsymbol = $1
              AND exchange = $2
              AND status IN ('SUCCESS', 'FORWARD_TEST_SUCCESS')
              AND broker_order_id IS NOT NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(tradingsymbol)
        .bind(exchange.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_attempts(&self, limit: i64) -> Result<Vec<OrderAttempt>> {
        let rows = sqlx::query_as::<_, OrderAttempt>(
            r#"
            SELECT * FROM order_attempts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn symbols_with_fills(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tradingsymbol, exchange FROM order_attempts
            WHERE status IN ('SUCCESS', 'FORWARD_TEST_SUCCESS')
              AND broker_order_id IS NOT NULL
            ORDER BY tradingsymbol, exchange
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn stats(&self) -> Result<LedgerStats> {
        let stats = sqlx::query_as::<_, LedgerStats>(
            r#"
            SELECT
                COUNT(*) as total_count,
                COUNT(*) FILTER (WHERE status = 'ATTEMPTING') as attempting_count,
                COUNT(*) FILTER (WHERE status = 'SUCCESS') as success_count,
                COUNT(*) FILTER (WHERE status = 'FAILED') as failed_count,
                COUNT(*) FILTER (WHERE status = 'DUPLICATE_PREVENTED') as duplicate_prevented_count,
                COUNT(*) FILTER (WHERE status = 'FORWARD_TEST_SUCCESS') as forward_test_count
            FROM order_attempts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn clear_forward_test(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM order_attempts WHERE status = 'FORWARD_TEST_SUCCESS'"#,
        )
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted = deleted, "포워드 테스트 기록 삭제 완료");
        }
        Ok(deleted)
    }

    async fn purge_all(&self, confirmation: &str) -> Result<u64> {
        if confirmation != PURGE_CONFIRMATION_TOKEN {
            warn!("전체 삭제 거부: 확인 토큰 불일치");
            return Err(StoreError::PurgeRefused);
        }

        let result = sqlx::query(r#"DELETE FROM order_attempts"#)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        warn!(deleted = deleted, "주문 원장 전체 삭제 실행");
        Ok(deleted)
    }
}

// ================================================================================================
// 인메모리 구현 (테스트용)
// ================================================================================================

/// 인메모리 주문 원장.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<OrderAttempt>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전체 행 스냅샷 (테스트 검증용).
    pub async fn snapshot(&self) -> Vec<OrderAttempt> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl OrderLog for MemoryLedger {
    async fn insert_attempt(&self, attempt: &NewOrderAttempt) -> Result<i64> {
        let mut rows = self.rows.lock().await;
        let id = rows.len() as i64 + 1;
        let now = Utc::now();
        rows.push(OrderAttempt {
            id,
            tradingsymbol: attempt.tradingsymbol.clone(),
            exchange: attempt.exchange.to_string(),
            transaction_type: attempt.transaction_type.to_string(),
            quantity: attempt.quantity,
            price: attempt.price,
            order_type: attempt.order_type.to_string(),
            product: attempt.product.to_string(),
            status: OrderStatus::Attempting.to_string(),
            broker_order_id: None,
            error_message: None,
            signal_time: attempt.signal_time.clone(),
            base_symbol: attempt.base_symbol.clone(),
            request_id: attempt.request_id,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn finalize(
        &self,
        id: i64,
        status: OrderStatus,
        broker_order_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::AttemptNotFound(id))?;
        row.status = status.to_string();
        row.broker_order_id = broker_order_id.map(str::to_string);
        row.error_message = error_message.map(str::to_string);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn fills_by_symbol(
        &self,
        tradingsymbol: &str,
        exchange: Segment,
    ) -> Result<Vec<OrderAttempt>> {
        let rows = self.rows.lock().await;
        let mut fills: Vec<OrderAttempt> = rows
            .iter()
            .filter(|r| {
                r.tradingsymbol == tradingsymbol
                    && r.exchange == exchange.to_string()
                    && r.broker_order_id.is_some()
                    && r.parsed_status().map(|s| s.is_fill()).unwrap_or(false)
            })
            .cloned()
            .collect();
        fills.sort_by_key(|r| (r.created_at, r.id));
        Ok(fills)
    }

    async fn recent_attempts(&self, limit: i64) -> Result<Vec<OrderAttempt>> {
        let rows = self.rows.lock().await;
        let mut all: Vec<OrderAttempt> = rows.clone();
        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }

    async fn symbols_with_fills(&self) -> Result<Vec<(String, String)>> {
        let rows = self.rows.lock().await;
        let mut pairs: Vec<(String, String)> = rows
            .iter()
            .filter(|r| {
                r.broker_order_id.is_some()
                    && r.parsed_status().map(|s| s.is_fill()).unwrap_or(false)
            })
            .map(|r| (r.tradingsymbol.clone(), r.exchange.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }

    async fn stats(&self) -> Result<LedgerStats> {
        let rows = self.rows.lock().await;
        let count = |status: OrderStatus| {
            rows.iter().filter(|r| r.status == status.to_string()).count() as i64
        };
        Ok(LedgerStats {
            total_count: rows.len() as i64,
            attempting_count: count(OrderStatus::Attempting),
            success_count: count(OrderStatus::Success),
            failed_count: count(OrderStatus::Failed),
            duplicate_prevented_count: count(OrderStatus::DuplicatePrevented),
            forward_test_count: count(OrderStatus::ForwardTestSuccess),
        })
    }

    async fn clear_forward_test(&self) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| r.status != OrderStatus::ForwardTestSuccess.to_string());
        Ok((before - rows.len()) as u64)
    }

    async fn purge_all(&self, confirmation: &str) -> Result<u64> {
        if confirmation != PURGE_CONFIRMATION_TOKEN {
            return Err(StoreError::PurgeRefused);
        }
        let mut rows = self.rows.lock().await;
        let deleted = rows.len() as u64;
        rows.clear();
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn new_attempt(symbol: &str, tx: TransactionType) -> NewOrderAttempt {
        NewOrderAttempt {
            tradingsymbol: symbol.to_string(),
            exchange: Segment::Nse,
            transaction_type: tx,
            quantity: 10,
            price: Some(dec!(2500)),
            order_type: OrderType::Market,
            product: ProductType::Cnc,
            signal_time: "2026-08-25T09:20:00Z".to_string(),
            base_symbol: symbol.to_string(),
            request_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn insert_then_finalize() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .insert_attempt(&new_attempt("RELIANCE", TransactionType::Buy))
            .await
            .unwrap();

        let rows = ledger.snapshot().await;
        assert_eq!(rows[0].status, "ATTEMPTING");

        ledger
            .finalize(id, OrderStatus::Success, Some("ORD123"), None)
            .await
            .unwrap();

        let rows = ledger.snapshot().await;
        assert_eq!(rows[0].status, "SUCCESS");
        assert_eq!(rows[0].broker_order_id.as_deref(), Some("ORD123"));
    }

    #[tokio::test]
    async fn finalize_unknown_id_fails() {
        let ledger = MemoryLedger::new();
        let result = ledger.finalize(99, OrderStatus::Failed, None, None).await;
        assert!(matches!(result, Err(StoreError::AttemptNotFound(99))));
    }

    #[tokio::test]
    async fn fills_exclude_failed_and_unfilled_rows() {
        let ledger = MemoryLedger::new();

        let a = ledger
            .insert_attempt(&new_attempt("RELIANCE", TransactionType::Buy))
            .await
            .unwrap();
        ledger
            .finalize(a, OrderStatus::Success, Some("ORD1"), None)
            .await
            .unwrap();

        let b = ledger
            .insert_attempt(&new_attempt("RELIANCE", TransactionType::Sell))
            .await
            .unwrap();
        ledger
            .finalize(b, OrderStatus::Failed, None, Some("거부"))
            .await
            .unwrap();

        // 터미널 업데이트 없는 행은 체결이 아님
        ledger
            .insert_attempt(&new_attempt("RELIANCE", TransactionType::Buy))
            .await
            .unwrap();

        let fills = ledger.fills_by_symbol("RELIANCE", Segment::Nse).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].id, a);
    }

    #[tokio::test]
    async fn forward_test_rows_count_as_fills_until_cleared() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .insert_attempt(&new_attempt("GOLDBEES", TransactionType::Buy))
            .await
            .unwrap();
        ledger
            .finalize(id, OrderStatus::ForwardTestSuccess, Some("FT_abc"), None)
            .await
            .unwrap();

        assert_eq!(
            ledger.fills_by_symbol("GOLDBEES", Segment::Nse).await.unwrap().len(),
            1
        );
        assert_eq!(ledger.clear_forward_test().await.unwrap(), 1);
        assert!(ledger
            .fills_by_symbol("GOLDBEES", Segment::Nse)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn purge_requires_exact_token() {
        let ledger = MemoryLedger::new();
        ledger
            .insert_attempt(&new_attempt("TCS", TransactionType::Buy))
            .await
            .unwrap();

        assert!(matches!(
            ledger.purge_all("yes").await,
            Err(StoreError::PurgeRefused)
        ));
        assert_eq!(ledger.purge_all(PURGE_CONFIRMATION_TOKEN).await.unwrap(), 1);
        assert_eq!(ledger.stats().await.unwrap().total_count, 0);
    }

    #[test]
    fn status_round_trip() {
        for status in [
            OrderStatus::Attempting,
            OrderStatus::Success,
            OrderStatus::Failed,
            OrderStatus::DuplicatePrevented,
            OrderStatus::ForwardTestSuccess,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!(OrderStatus::Success.is_fill());
        assert!(OrderStatus::ForwardTestSuccess.is_fill());
        assert!(!OrderStatus::Failed.is_fill());
        assert!(!OrderStatus::Attempting.is_terminal());
    }
}
