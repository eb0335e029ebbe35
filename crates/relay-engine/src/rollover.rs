//! 롤오버 스케줄러.
//!
//! 평일 장 시작 직전(현지 09:25)에 깨어나 만기 임박 선물 롱 포지션을
//! 차월물로 이월하는 장기 실행 백그라운드 루프입니다.
//!
//! # 실행 단계
//!
//! 1. 추적 중인 파생 세그먼트의 종목 캐시를 무효화하고 최신 목록 로드
//! 2. NRML 롱 포지션을 기초자산으로 매핑
//! 3. 보유 계약의 남은 일수가 임계값(7일) 이하이고 차월물이 있으면:
//!    보유 계약 전량 시장가 매도 → 차월물 같은 수량 시장가 매수
//!
//! 청산은 성공했는데 재진입이 실패하면 **부분 롤오버 실패**로 기록하고
//! 포지션을 플랫 상태로 둡니다. 무인 봇이 움직이는 시장에 재시도를
//! 퍼붓는 것보다 수동 개입을 요구하는 편이 안전합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use relay_core::domain::{BrokerGateway, Instrument, ProductType, Segment, TransactionType};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::{EngineConfig, ROLLOVER_WAKE_HOUR, ROLLOVER_WAKE_MINUTE},
    decide::OrderPlan,
    error::Result,
    resolver::{is_weekday, ContractResolver},
    submit::{OrderSubmitter, SubmitContext},
};

/// 해당 날짜의 기상 시각.
fn wake_at(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
    date.and_hms_opt(ROLLOVER_WAKE_HOUR, ROLLOVER_WAKE_MINUTE, 0)?
        .and_local_timezone(tz)
        .single()
}

/// 다음 기상 시각: 다음 평일 09:25 (주말 건너뜀).
pub fn next_rollover_wake(now: DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    if is_weekday(date) {
        if let Some(wake) = wake_at(date, tz) {
            if now < wake {
                return wake;
            }
        }
    }
    loop {
        date += chrono::Duration::days(1);
        if !is_weekday(date) {
            continue;
        }
        if let Some(wake) = wake_at(date, tz) {
            return wake;
        }
    }
}

/// 한 번의 롤오버 실행 결과.
#[derive(Debug, Default)]
pub struct RolloverReport {
    /// 검사한 롱 포지션 수
    pub examined: usize,
    /// 양쪽 레그 모두 성공한 롤오버 수
    pub rolled: usize,
    /// 청산은 성공했으나 재진입이 실패한 수 (수동 개입 필요)
    pub partial_failures: usize,
}

/// 롤오버 스케줄러.
pub struct RolloverScheduler {
    broker: Arc<dyn BrokerGateway>,
    resolver: ContractResolver,
    submitter: OrderSubmitter,
    config: EngineConfig,
}

impl RolloverScheduler {
    pub fn new(
        broker: Arc<dyn BrokerGateway>,
        resolver: ContractResolver,
        submitter: OrderSubmitter,
        config: EngineConfig,
    ) -> Self {
        Self {
            broker,
            resolver,
            submitter,
            config,
        }
    }

    /// 백그라운드 루프. 에러가 나도 종료하지 않고 대기 후 계속합니다.
    pub async fn run(&self) {
        loop {
            let now = Utc::now().with_timezone(&self.config.timezone);
            let wake = next_rollover_wake(now);
            let wait = (wake - now).to_std().unwrap_or(Duration::ZERO);
            info!(wake = %wake, wait_secs = wait.as_secs(), "다음 롤오버 실행 대기");
            tokio::time::sleep(wait).await;

            let today = Utc::now().with_timezone(&self.config.timezone).date_naive();
            match self.run_once(today).await {
                Ok(report) => {
                    info!(
                        examined = report.examined,
                        rolled = report.rolled,
                        partial_failures = report.partial_failures,
                        "롤오버 실행 완료"
                    );
                }
                Err(e) => {
                    error!(error = %e, sleep_secs = self.config.error_sleep.as_secs(), "롤오버 실행 실패, 대기 후 계속");
                    tokio::time::sleep(self.config.error_sleep).await;
                }
            }
        }
    }

    /// 롤오버 1회 실행.
    ///
    /// 루프와 분리되어 있어 날짜를 주입해 테스트할 수 있습니다.
    pub async fn run_once(&self, today: NaiveDate) -> Result<RolloverReport> {
        let mut report = RolloverReport::default();

        // 요청 범위 캐시 초기화: 전일 실행의 후보 목록이 남아 있으면
        // 만기 소멸/신규 상장이 반영되지 않음
        self.resolver.begin_request().await;

        for &segment in Segment::derivative_segments() {
            // 기상 직후 최신 목록 강제 (만기 지난 계약 제거 반영)
            let instruments = self.resolver.refresh_instruments(segment).await?;
            let by_symbol: HashMap<&str, &Instrument> = instruments
                .iter()
                .map(|i| (i.tradingsymbol.as_str(), i))
                .collect();

            let positions = self.broker.net_positions().await?;
            for position in positions.iter().filter(|p| {
                p.exchange == segment && p.product == ProductType::Nrml && p.quantity > 0
            }) {
                report.examined += 1;
                let Some(held) = by_symbol.get(position.tradingsymbol.as_str()) else {
                    warn!(
                        symbol = %position.tradingsymbol,
                        segment = %segment,
                        "보유 계약이 종목 목록에 없음, 롤오버 건너뜀"
                    );
                    continue;
                };

                if let Some(rolled) = self.roll_if_due(held, position.quantity, today).await? {
                    if rolled {
                        report.rolled += 1;
                    } else {
                        report.partial_failures += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// 만기 임박 포지션 이월. 대상이 아니면 `None`,
    /// 완전 성공이면 `Some(true)`, 부분 실패면 `Some(false)`.
    async fn roll_if_due(
        &self,
        held: &Instrument,
        quantity: i64,
        today: NaiveDate,
    ) -> Result<Option<bool>> {
        let Some(days_left) = held.days_to_expiry(today) else {
            return Ok(None);
        };
        if days_left > self.config.rollover_threshold_days || !is_weekday(today) {
            return Ok(None);
        }

        let candidates = self
            .resolver
            .resolve_candidates(&held.underlying_name, held.exchange)
            .await?;
        let Some(next) = candidates.iter().find(|c| c.expiry > held.expiry) else {
            warn!(
                held = %held.tradingsymbol,
                days_left = days_left,
                "차월물 없음, 롤오버 불가"
            );
            return Ok(None);
        };

        info!(
            held = %held.tradingsymbol,
            next = %next.tradingsymbol,
            quantity = quantity,
            days_left = days_left,
            "롤오버 시작"
        );

        let request_id = Uuid::new_v4();
        let ctx = |base_symbol: &str| SubmitContext {
            reference_price: None,
            signal_time: format!("rollover:{}", today),
            base_symbol: base_symbol.to_string(),
            request_id,
        };

        // 1레그: 보유 계약 청산
        let close = self
            .submitter
            .submit(
                &OrderPlan {
                    tradingsymbol: held.tradingsymbol.clone(),
                    exchange: held.exchange,
                    transaction_type: TransactionType::Sell,
                    quantity,
                    product: ProductType::Nrml,
                },
                &ctx(&held.underlying_name),
            )
            .await?;
        if !close.status.is_fill() {
            warn!(
                held = %held.tradingsymbol,
                error = ?close.error_message,
                "롤오버 청산 실패, 포지션 유지"
            );
            return Ok(None);
        }

        // 2레그: 차월물 재진입
        let open = self
            .submitter
            .submit(
                &OrderPlan {
                    tradingsymbol: next.tradingsymbol.clone(),
                    exchange: next.exchange,
                    transaction_type: TransactionType::Buy,
                    quantity,
                    product: ProductType::Nrml,
                },
                &ctx(&next.underlying_name),
            )
            .await?;
        if open.status.is_fill() {
            info!(
                held = %held.tradingsymbol,
                next = %next.tradingsymbol,
                "롤오버 완료"
            );
            Ok(Some(true))
        } else {
            // 청산만 성공: 자동 재진입하지 않고 수동 개입을 기다림
            error!(
                held = %held.tradingsymbol,
                next = %next.tradingsymbol,
                error = ?open.error_message,
                "부분 롤오버 실패: 포지션이 플랫 상태로 남음, 수동 개입 필요"
            );
            Ok(Some(false))
        }
    }
}
