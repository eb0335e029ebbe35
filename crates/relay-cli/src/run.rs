//! 재조정 데몬.
//!
//! 파이프라인 전체를 한 프로세스에 조립해 장기 실행합니다:
//!
//! - 멱등성 게이트: `REDIS_URL`이 있으면 Redis, 없으면 인메모리
//! - 종목 목록 공유 캐시: Redis가 있을 때만 활성화
//! - 주문 원장: PostgreSQL (시작 시 마이그레이션)
//! - 롤오버 스케줄러: 백그라운드 태스크로 기동
//!
//! 신호는 stdin에서 한 줄당 JSON 하나로 받습니다:
//!
//! ```text
//! {"action":"buy","symbol":"NIFTY1!","exchange":"NFO","price":24000,"time":"2026-08-25T09:20:00Z"}
//! ```
//!
//! 실주문 브로커 연동은 이 저장소 범위 밖이므로 데몬은 포워드 테스트
//! 전용입니다 (`FORWARD_TESTING=true` 필수). 실거래 게이트웨이는
//! `BrokerGateway` 구현을 같은 자리에 주입하면 됩니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use relay_broker::MockBroker;
use relay_core::domain::{Segment, Signal, SignalAction};
use relay_engine::{
    ContractResolver, EngineConfig, OrderSubmitter, PositionReader, ReconciliationEngine,
    ReconciliationReport, RolloverScheduler,
};
use relay_store::{DuplicateGate, MemoryGate, PgOrderLedger, RedisGate, SharedCache};

/// 신호 제공자가 보내는 원본 알림.
#[derive(Debug, Deserialize)]
struct RawAlert {
    action: String,
    symbol: String,
    exchange: String,
    price: Decimal,
    #[serde(default = "default_quantity")]
    quantity: i64,
    time: String,
}

fn default_quantity() -> i64 {
    1
}

/// 알림 한 줄을 검증된 신호로 변환.
fn parse_alert(line: &str) -> Result<Signal, Box<dyn std::error::Error>> {
    let raw: RawAlert = serde_json::from_str(line)?;
    let action: SignalAction = raw.action.parse()?;
    let segment: Segment = raw.exchange.parse()?;
    let signal = Signal::new(action, raw.symbol, segment, raw.price, raw.quantity, raw.time)?;
    Ok(signal)
}

/// 데몬 기동. stdin이 닫힐 때까지 신호를 처리합니다.
pub async fn run(ledger: PgOrderLedger) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env();
    if !config.forward_testing {
        return Err("실주문 게이트웨이가 구성되지 않음: FORWARD_TESTING=true 로 실행하세요".into());
    }

    ledger.migrate().await?;
    let ledger = Arc::new(ledger);
    let broker = Arc::new(MockBroker::new());

    let shared = match &config.redis_url {
        Some(url) => Some(Arc::new(SharedCache::connect(url).await?)),
        None => None,
    };
    let gate: Arc<dyn DuplicateGate> = match &shared {
        Some(cache) => Arc::new(RedisGate::new(cache.as_ref().clone())),
        None => {
            warn!("REDIS_URL 없음: 멱등성 게이트가 프로세스 내부로 제한됨");
            Arc::new(MemoryGate::new())
        }
    };
    let with_shared = |mut resolver: ContractResolver| {
        if let Some(cache) = &shared {
            resolver = resolver.with_shared_cache(cache.clone());
        }
        resolver
    };

    let scheduler = RolloverScheduler::new(
        broker.clone(),
        with_shared(ContractResolver::new(broker.clone())),
        OrderSubmitter::new(
            broker.clone(),
            ledger.clone(),
            config.forward_testing,
            config.protection_buffer,
        ),
        config.clone(),
    );
    tokio::spawn(async move { scheduler.run().await });

    let engine = ReconciliationEngine::new(
        gate,
        with_shared(ContractResolver::new(broker.clone())),
        PositionReader::new(broker.clone(), config.position_timeout),
        OrderSubmitter::new(
            broker.clone(),
            ledger.clone(),
            config.forward_testing,
            config.protection_buffer,
        ),
        config,
    );

    info!("재조정 데몬 기동, 신호 수신 대기 (stdin, 한 줄당 JSON 하나)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let signal = match parse_alert(line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "알림 파싱 실패, 무시");
                continue;
            }
        };
        match engine.handle_signal(&signal).await {
            Ok(ReconciliationReport::Duplicate) => {
                info!(symbol = %signal.symbol, "중복 신호 차단");
            }
            Ok(ReconciliationReport::Skipped(reason)) => {
                info!(symbol = %signal.symbol, reason = %reason, "주문 불필요");
            }
            Ok(ReconciliationReport::Submitted(outcome)) => {
                info!(
                    symbol = %signal.symbol,
                    status = %outcome.status,
                    order_id = ?outcome.broker_order_id,
                    "주문 기록"
                );
            }
            Err(e) => {
                error!(symbol = %signal.symbol, error = %e, "신호 처리 실패");
            }
        }
    }
    info!("stdin 종료, 데몬 중단");
    Ok(())
}
