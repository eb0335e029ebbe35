//! 실현 손익 (FIFO) 계산.
//!
//! 원장의 체결 행을 매수/매도 두 줄로 나눠 생성 시간 오름차순으로
//! 정렬한 뒤, 가장 오래된 매수 잔량과 가장 오래된 매도 잔량을
//! 반복적으로 매칭합니다. 매칭 수량마다 `(매도가 - 매수가) × 수량`을
//! 실현 손익에 누적하고, 매칭되지 않은 잔량이 현재 포지션이 됩니다.
//!
//! 손익은 저장되지 않습니다. 요청할 때마다 원장에서 재계산하는
//! 파생 뷰이며, 원장이 유일한 기준 기록입니다.

use rust_decimal::Decimal;
use serde::Serialize;

use relay_core::domain::Segment;

use crate::{
    error::{Result, StoreError},
    ledger::{OrderAttempt, OrderLog},
};

/// 체결 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

/// FIFO 매칭 입력 단위.
///
/// 입력 순서가 곧 시간 순서입니다. 원장 조회가 생성 시간 오름차순으로
/// 반환하므로 호출자가 재정렬할 필요는 없습니다.
#[derive(Debug, Clone)]
pub struct Fill {
    pub side: FillSide,
    pub quantity: i64,
    pub price: Decimal,
}

impl Fill {
    /// 원장 행을 체결로 변환.
    ///
    /// # Errors
    ///
    /// 거래 방향을 파싱할 수 없거나 가격이 없는 행은
    /// `StoreError::CorruptRecord`.
    pub fn try_from_attempt(attempt: &OrderAttempt) -> Result<Self> {
        let side = match attempt.transaction_type.to_uppercase().as_str() {
            "BUY" => FillSide::Buy,
            "SELL" => FillSide::Sell,
            other => {
                return Err(StoreError::CorruptRecord {
                    id: attempt.id,
                    reason: format!("알 수 없는 거래 방향: {}", other),
                })
            }
        };
        let price = attempt.price.ok_or_else(|| StoreError::CorruptRecord {
            id: attempt.id,
            reason: "체결 행에 가격 없음".to_string(),
        })?;
        Ok(Self {
            side,
            quantity: attempt.quantity,
            price,
        })
    }
}

/// 한 종목의 실현 손익 리포트.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolPnl {
    pub tradingsymbol: String,
    pub exchange: String,
    pub total_buy_qty: i64,
    pub total_sell_qty: i64,
    /// 매칭되지 않은 잔량 (양수=롱, 음수=숏)
    pub current_position: i64,
    /// 수량 가중 평균 매수가 (매수 없으면 None)
    pub avg_buy_price: Option<Decimal>,
    /// 수량 가중 평균 매도가 (매도 없으면 None)
    pub avg_sell_price: Option<Decimal>,
    pub realized_pnl: Decimal,
}

/// 전체 포트폴리오 요약.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub symbols: Vec<SymbolPnl>,
    pub total_realized_pnl: Decimal,
}

/// FIFO 실현 손익 계산.
///
/// 입력은 시간 오름차순 체결 목록입니다. 저장 순서에는 불변이지만
/// 시간 순서에는 불변이 아닙니다 (FIFO의 정의상 먼저 산 것부터 매칭).
pub fn realized_pnl(tradingsymbol: &str, exchange: Segment, fills: &[Fill]) -> SymbolPnl {
    // (잔량, 가격) 줄 두 개로 분리
    let mut buys: Vec<(i64, Decimal)> = Vec::new();
    let mut sells: Vec<(i64, Decimal)> = Vec::new();
    for fill in fills {
        match fill.side {
            FillSide::Buy => buys.push((fill.quantity, fill.price)),
            FillSide::Sell => sells.push((fill.quantity, fill.price)),
        }
    }

    let total_buy_qty: i64 = buys.iter().map(|(q, _)| q).sum();
    let total_sell_qty: i64 = sells.iter().map(|(q, _)| q).sum();

    let weighted_avg = |rows: &[(i64, Decimal)], total: i64| -> Option<Decimal> {
        if total == 0 {
            return None;
        }
        let notional: Decimal = rows
            .iter()
            .map(|(q, p)| Decimal::from(*q) * p)
            .sum();
        Some(notional / Decimal::from(total))
    };
    let avg_buy_price = weighted_avg(&buys, total_buy_qty);
    let avg_sell_price = weighted_avg(&sells, total_sell_qty);

    // 가장 오래된 매수 잔량 × 가장 오래된 매도 잔량 매칭
    let mut pnl = Decimal::ZERO;
    let (mut bi, mut si) = (0usize, 0usize);
    while bi < buys.len() && si < sells.len() {
        let matched = buys[bi].0.min(sells[si].0);
        pnl += (sells[si].1 - buys[bi].1) * Decimal::from(matched);
        buys[bi].0 -= matched;
        sells[si].0 -= matched;
        if buys[bi].0 == 0 {
            bi += 1;
        }
        if sells[si].0 == 0 {
            si += 1;
        }
    }

    // 매칭되지 않은 잔량이 현재 포지션 (한쪽 줄만 잔량이 남을 수 있음)
    let open_long: i64 = buys[bi..].iter().map(|(q, _)| q).sum();
    let open_short: i64 = sells[si..].iter().map(|(q, _)| q).sum();

    SymbolPnl {
        tradingsymbol: tradingsymbol.to_string(),
        exchange: exchange.to_string(),
        total_buy_qty,
        total_sell_qty,
        current_position: open_long - open_short,
        avg_buy_price,
        avg_sell_price,
        realized_pnl: pnl,
    }
}

/// 원장에서 한 종목의 실현 손익 리포트 계산.
pub async fn symbol_report(
    log: &dyn OrderLog,
    tradingsymbol: &str,
    exchange: Segment,
) -> Result<SymbolPnl> {
    let attempts = log.fills_by_symbol(tradingsymbol, exchange).await?;
    // 가격 없는 행(예: 롤오버 시장가)은 손익 계산에서 제외
    let mut fills = Vec::with_capacity(attempts.len());
    for attempt in &attempts {
        match Fill::try_from_attempt(attempt) {
            Ok(fill) => fills.push(fill),
            Err(e) => {
                tracing::warn!(attempt_id = attempt.id, error = %e, "손익 계산에서 체결 행 제외");
            }
        }
    }
    Ok(realized_pnl(tradingsymbol, exchange, &fills))
}

/// 원장 전체의 포트폴리오 요약 계산.
pub async fn portfolio_summary(log: &dyn OrderLog) -> Result<PortfolioSummary> {
    let mut symbols = Vec::new();
    let mut total = Decimal::ZERO;
    for (tradingsymbol, exchange) in log.symbols_with_fills().await? {
        let segment: Segment = exchange
            .parse()
            .map_err(|e: relay_core::domain::SignalError| StoreError::CorruptRecord {
                id: 0,
                reason: e.to_string(),
            })?;
        let report = symbol_report(log, &tradingsymbol, segment).await?;
        total += report.realized_pnl;
        symbols.push(report);
    }
    Ok(PortfolioSummary {
        symbols,
        total_realized_pnl: total,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn buy(qty: i64, price: Decimal) -> Fill {
        Fill {
            side: FillSide::Buy,
            quantity: qty,
            price,
        }
    }

    fn sell(qty: i64, price: Decimal) -> Fill {
        Fill {
            side: FillSide::Sell,
            quantity: qty,
            price,
        }
    }

    #[test]
    fn fifo_matches_oldest_buys_first() {
        // 매수 10@2500, 5@2520 / 매도 8@2580, 7@2590
        // = 8×80 + 2×90 + 5×70 = 640 + 180 + 350
        let fills = vec![
            buy(10, dec!(2500)),
            buy(5, dec!(2520)),
            sell(8, dec!(2580)),
            sell(7, dec!(2590)),
        ];
        let report = realized_pnl("RELIANCE", Segment::Nse, &fills);
        assert_eq!(report.realized_pnl, dec!(1170));
        assert_eq!(report.current_position, 0);
        assert_eq!(report.total_buy_qty, 15);
        assert_eq!(report.total_sell_qty, 15);
    }

    #[test]
    fn unmatched_buy_surplus_is_open_long() {
        let fills = vec![buy(10, dec!(100)), sell(4, dec!(110))];
        let report = realized_pnl("TCS", Segment::Nse, &fills);
        assert_eq!(report.realized_pnl, dec!(40));
        assert_eq!(report.current_position, 6);
    }

    #[test]
    fn sell_surplus_is_open_short_with_no_pnl_contribution() {
        let fills = vec![sell(5, dec!(200))];
        let report = realized_pnl("NIFTY26SEPFUT", Segment::Nfo, &fills);
        assert_eq!(report.realized_pnl, Decimal::ZERO);
        assert_eq!(report.current_position, -5);
        assert!(report.avg_buy_price.is_none());
        assert_eq!(report.avg_sell_price, Some(dec!(200)));
    }

    #[test]
    fn avg_prices_are_quantity_weighted() {
        let fills = vec![buy(10, dec!(100)), buy(30, dec!(120))];
        let report = realized_pnl("GOLDBEES", Segment::Nse, &fills);
        assert_eq!(report.avg_buy_price, Some(dec!(115)));
        assert_eq!(report.current_position, 40);
    }

    #[test]
    fn empty_ledger_yields_flat_report() {
        let report = realized_pnl("RELIANCE", Segment::Nse, &[]);
        assert_eq!(report.realized_pnl, Decimal::ZERO);
        assert_eq!(report.current_position, 0);
        assert!(report.avg_buy_price.is_none());
        assert!(report.avg_sell_price.is_none());
    }

    #[tokio::test]
    async fn portfolio_summary_aggregates_over_symbols() {
        use relay_core::domain::{OrderType, ProductType, TransactionType};
        use uuid::Uuid;

        use crate::ledger::{MemoryLedger, NewOrderAttempt, OrderStatus};

        let ledger = MemoryLedger::new();
        let order = |symbol: &str, tx, qty, price| {
            let attempt = NewOrderAttempt {
                tradingsymbol: symbol.to_string(),
                exchange: Segment::Nse,
                transaction_type: tx,
                quantity: qty,
                price: Some(price),
                order_type: OrderType::Market,
                product: ProductType::Cnc,
                signal_time: "2026-08-25T09:20:00Z".to_string(),
                base_symbol: symbol.to_string(),
                request_id: Uuid::new_v4(),
            };
            (attempt, OrderStatus::Success)
        };

        for (attempt, status) in [
            order("RELIANCE", TransactionType::Buy, 10, dec!(2500)),
            order("RELIANCE", TransactionType::Sell, 10, dec!(2600)),
            order("TCS", TransactionType::Buy, 5, dec!(4000)),
            order("TCS", TransactionType::Sell, 5, dec!(3900)),
        ] {
            let id = ledger.insert_attempt(&attempt).await.unwrap();
            ledger
                .finalize(id, status, Some(&format!("ORD{}", id)), None)
                .await
                .unwrap();
        }

        let summary = portfolio_summary(&ledger).await.unwrap();
        assert_eq!(summary.symbols.len(), 2);
        // 1000 - 500
        assert_eq!(summary.total_realized_pnl, dec!(500));
    }
}
