//! 주문 원장 운영 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 재조정 데몬 기동 (stdin으로 신호 수신)
//! FORWARD_TESTING=true relay run
//!
//! # 원장 테이블/인덱스 생성
//! relay migrate
//!
//! # 원장 통계
//! relay stats
//!
//! # 최근 주문 시도 20건
//! relay recent --limit 20
//!
//! # 한 종목의 FIFO 실현 손익
//! relay pnl --symbol RELIANCE --exchange NSE
//!
//! # 전체 포트폴리오 요약 (JSON)
//! relay portfolio --format json
//!
//! # 포워드 테스트 기록 삭제
//! relay clear-test
//!
//! # 전체 삭제 (확인 토큰 필수)
//! relay purge --confirm CONFIRM_DELETE_ALL_DATA
//! ```

mod run;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use relay_core::domain::Segment;
use relay_store::{
    portfolio_summary, symbol_report, OrderLog, PgOrderLedger, PURGE_CONFIRMATION_TOKEN,
};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "신호-주문 재조정 원장 운영 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 데이터베이스 URL (기본: DATABASE_URL 환경변수)
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 재조정 데몬 기동 (stdin으로 신호 수신, 포워드 테스트 전용)
    Run,

    /// 원장 테이블/인덱스 생성
    Migrate,

    /// 원장 통계 (상태별 건수)
    Stats,

    /// 최근 주문 시도 조회
    Recent {
        /// 최대 건수
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// 한 종목의 FIFO 실현 손익 리포트
    Pnl {
        /// 종목 심볼 (예: RELIANCE, NIFTY26SEPFUT)
        #[arg(short, long)]
        symbol: String,

        /// 거래소 세그먼트 (NSE, NFO, MCX)
        #[arg(short, long)]
        exchange: String,

        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// 전체 포트폴리오 실현 손익 요약
    Portfolio {
        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// 포워드 테스트 기록 삭제
    ClearTest,

    /// 원장 전체 삭제 (되돌릴 수 없음)
    Purge {
        /// 확인 토큰 (CONFIRM_DELETE_ALL_DATA를 그대로 입력)
        #[arg(long)]
        confirm: String,
    },
}

async fn connect(db_url: Option<String>) -> Result<PgOrderLedger, Box<dyn std::error::Error>> {
    let url = db_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or("DATABASE_URL이 설정되지 않았습니다. --db-url 옵션 사용")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(PgOrderLedger::new(pool))
}

fn print_pnl_table(report: &relay_store::SymbolPnl) {
    println!("\n종목: {} ({})", report.tradingsymbol, report.exchange);
    println!("───────────────────────────────────────────────");
    println!("  총 매수 수량: {}", report.total_buy_qty);
    println!("  총 매도 수량: {}", report.total_sell_qty);
    println!("  현재 포지션: {}", report.current_position);
    if let Some(avg) = report.avg_buy_price {
        println!("  평균 매수가: {}", avg.round_dp(2));
    }
    if let Some(avg) = report.avg_sell_price {
        println!("  평균 매도가: {}", avg.round_dp(2));
    }
    println!("  실현 손익: {}", report.realized_pnl);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (없어도 에러 안남)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let ledger = connect(cli.db_url).await?;

    match cli.command {
        Commands::Run => {
            run::run(ledger).await?;
        }

        Commands::Migrate => {
            ledger.migrate().await?;
            println!("✅ 원장 마이그레이션 완료");
        }

        Commands::Stats => {
            let stats = ledger.stats().await?;
            println!("\n주문 원장 통계");
            println!("───────────────────────────────────────────────");
            println!("  전체: {}", stats.total_count);
            println!("  ATTEMPTING: {}", stats.attempting_count);
            println!("  SUCCESS: {}", stats.success_count);
            println!("  FAILED: {}", stats.failed_count);
            println!("  DUPLICATE_PREVENTED: {}", stats.duplicate_prevented_count);
            println!("  FORWARD_TEST_SUCCESS: {}", stats.forward_test_count);
        }

        Commands::Recent { limit } => {
            let attempts = ledger.recent_attempts(limit).await?;
            if attempts.is_empty() {
                println!("원장이 비어 있습니다.");
                return Ok(());
            }
            println!(
                "\n{:>6}  {:<20} {:<4} {:>8}  {:<22} {}",
                "ID", "종목", "방향", "수량", "상태", "시각"
            );
            println!("───────────────────────────────────────────────────────────────────────");
            for a in &attempts {
                println!(
                    "{:>6}  {:<20} {:<4} {:>8}  {:<22} {}",
                    a.id,
                    a.tradingsymbol,
                    a.transaction_type,
                    a.quantity,
                    a.status,
                    a.created_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }

        Commands::Pnl {
            symbol,
            exchange,
            format,
        } => {
            let segment: Segment = exchange
                .parse()
                .map_err(|_| format!("알 수 없는 세그먼트: {}. 지원: NSE, NFO, MCX", exchange))?;

            let report = symbol_report(&ledger, &symbol.to_uppercase(), segment).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => print_pnl_table(&report),
            }
        }

        Commands::Portfolio { format } => {
            let summary = portfolio_summary(&ledger).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => {
                    if summary.symbols.is_empty() {
                        println!("체결 기록이 없습니다.");
                        return Ok(());
                    }
                    for report in &summary.symbols {
                        print_pnl_table(report);
                    }
                    println!("\n═══════════════════════════════════════════════");
                    println!("  총 실현 손익: {}", summary.total_realized_pnl);
                }
            }
        }

        Commands::ClearTest => {
            let deleted = ledger.clear_forward_test().await?;
            info!(deleted = deleted, "포워드 테스트 기록 삭제");
            println!("✅ 포워드 테스트 기록 {} 건 삭제", deleted);
        }

        Commands::Purge { confirm } => {
            match ledger.purge_all(&confirm).await {
                Ok(deleted) => {
                    println!("✅ 원장 전체 삭제 완료: {} 건", deleted);
                }
                Err(e) => {
                    error!("전체 삭제 거부: {}", e);
                    println!(
                        "\n⚠️  삭제가 거부되었습니다. --confirm {} 를 정확히 입력하세요.",
                        PURGE_CONFIRMATION_TOKEN
                    );
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
