//! 거래 가능 종목 타입.
//!
//! 브로커의 전체 종목 목록에서 조회되는 현물/선물 종목을 표현합니다.
//! 종목 목록은 세그먼트별로 공유 캐시에 24시간 TTL로 저장됩니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Segment;

/// 종목 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentType {
    /// 선물 계약
    Fut,
    /// 현물 주식
    Eq,
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentType::Fut => write!(f, "FUT"),
            InstrumentType::Eq => write!(f, "EQ"),
        }
    }
}

/// 거래 가능 종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// 거래 심볼 (예: "NIFTY26SEPFUT")
    pub tradingsymbol: String,
    /// 거래소 세그먼트
    pub exchange: Segment,
    /// 종목 유형
    pub instrument_type: InstrumentType,
    /// 기초자산 이름 (예: "NIFTY")
    pub underlying_name: String,
    /// 만기일 (현물은 None)
    pub expiry: Option<NaiveDate>,
    /// 랏 사이즈 (1 이상)
    pub lot_size: u32,
}

impl Instrument {
    /// 현물 종목 생성 (랏 사이즈 1, 만기 없음).
    pub fn spot(tradingsymbol: impl Into<String>, exchange: Segment) -> Self {
        let tradingsymbol = tradingsymbol.into();
        Self {
            underlying_name: tradingsymbol.clone(),
            tradingsymbol,
            exchange,
            instrument_type: InstrumentType::Eq,
            expiry: None,
            lot_size: 1,
        }
    }

    /// 만기까지 남은 일수. 만기가 없으면 None.
    pub fn days_to_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry.map(|e| (e - today).num_days())
    }
}

/// 신호 제공자 심볼을 기초자산 이름으로 정규화.
///
/// 연속 계약 마커(`!`)와 뒤따르는 계약 세대 숫자(1/2/3)를 제거하고
/// 대문자로 변환합니다. 예: `"NIFTY1!"` → `"NIFTY"`, `"crudeoil2"` → `"CRUDEOIL"`.
pub fn normalize_base_symbol(tv_symbol: &str) -> String {
    let mut symbol = tv_symbol.trim();
    if let Some(stripped) = symbol.strip_suffix('!') {
        symbol = stripped;
    }
    let symbol = match symbol.strip_suffix(['1', '2', '3']) {
        // 숫자 하나만 제거하되, 전부 숫자인 심볼은 건드리지 않음
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => symbol,
    };
    symbol.to_uppercase()
}
