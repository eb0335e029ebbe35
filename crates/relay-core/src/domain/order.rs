//! 주문 요청 타입과 내부 주문 enum.
//!
//! 브로커 SDK 상수 대신 내부 닫힌 enum을 사용하며, 와이어 값 변환은
//! 게이트웨이 경계(`Display` 구현)에서만 수행합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Segment;

/// 거래 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    /// 반대 방향.
    pub fn opposite(&self) -> Self {
        match self {
            TransactionType::Buy => TransactionType::Sell,
            TransactionType::Sell => TransactionType::Buy,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "BUY"),
            TransactionType::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            other => Err(format!("Invalid transaction type: {}", other)),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// 시장가
    Market,
    /// 지정가 (유동성 부족 종목의 보호가 폴백에 사용)
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            other => Err(format!("Invalid order type: {}", other)),
        }
    }
}

/// 상품 유형.
///
/// 세그먼트와 포지션 방향에 따라 결정됩니다:
/// 파생은 NRML, 현물 매수/청산은 CNC, 현물 공매도 진입/커버는 MIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductType {
    /// 파생 일반 (오버나이트 보유 가능)
    Nrml,
    /// 현물 실물 인수도
    Cnc,
    /// 당일 청산 (현물 공매도는 MIS로만 가능)
    Mis,
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::Nrml => write!(f, "NRML"),
            ProductType::Cnc => write!(f, "CNC"),
            ProductType::Mis => write!(f, "MIS"),
        }
    }
}

impl std::str::FromStr for ProductType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NRML" => Ok(ProductType::Nrml),
            "CNC" => Ok(ProductType::Cnc),
            "MIS" => Ok(ProductType::Mis),
            other => Err(format!("Invalid product type: {}", other)),
        }
    }
}

/// 주문 유효 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    Day,
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validity::Day => write!(f, "DAY"),
        }
    }
}

/// 브로커 중립 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래 심볼
    pub tradingsymbol: String,
    /// 거래소 세그먼트
    pub exchange: Segment,
    /// 매수/매도
    pub transaction_type: TransactionType,
    /// 수량 (파생은 랏 배수)
    pub quantity: i64,
    /// 주문 유형
    pub order_type: OrderType,
    /// 상품 유형
    pub product: ProductType,
    /// 지정가 (MARKET이면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// 유효 기간
    pub validity: Validity,
    /// 주문 태그 (보호가 폴백 식별용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl OrderRequest {
    /// 시장가 주문 생성.
    pub fn market(
        tradingsymbol: impl Into<String>,
        exchange: Segment,
        transaction_type: TransactionType,
        quantity: i64,
        product: ProductType,
    ) -> Self {
        Self {
            tradingsymbol: tradingsymbol.into(),
            exchange,
            transaction_type,
            quantity,
            order_type: OrderType::Market,
            product,
            price: None,
            validity: Validity::Day,
            tag: None,
        }
    }

    /// 보호가 지정가 주문으로 변환 (빌더 패턴).
    pub fn with_protected_price(mut self, price: Decimal) -> Self {
        self.order_type = OrderType::Limit;
        self.price = Some(price);
        self.tag = Some("market_protection".to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn wire_values_match_broker_constants() {
        assert_eq!(TransactionType::Buy.to_string(), "BUY");
        assert_eq!(TransactionType::Sell.to_string(), "SELL");
        assert_eq!(OrderType::Market.to_string(), "MARKET");
        assert_eq!(OrderType::Limit.to_string(), "LIMIT");
        assert_eq!(ProductType::Nrml.to_string(), "NRML");
        assert_eq!(ProductType::Cnc.to_string(), "CNC");
        assert_eq!(ProductType::Mis.to_string(), "MIS");
        assert_eq!(Validity::Day.to_string(), "DAY");
    }

    #[test]
    fn market_order_has_no_price() {
        let req = OrderRequest::market(
            "RELIANCE",
            Segment::Nse,
            TransactionType::Buy,
            10,
            ProductType::Cnc,
        );
        assert_eq!(req.order_type, OrderType::Market);
        assert!(req.price.is_none());
        assert!(req.tag.is_none());
    }

    #[test]
    fn protected_price_converts_to_tagged_limit() {
        let req = OrderRequest::market(
            "GOLDBEES",
            Segment::Nse,
            TransactionType::Buy,
            100,
            ProductType::Cnc,
        )
        .with_protected_price(dec!(100.5));
        assert_eq!(req.order_type, OrderType::Limit);
        assert_eq!(req.price, Some(dec!(100.5)));
        assert_eq!(req.tag.as_deref(), Some("market_protection"));
    }

    #[test]
    fn opposite_direction() {
        assert_eq!(TransactionType::Buy.opposite(), TransactionType::Sell);
        assert_eq!(TransactionType::Sell.opposite(), TransactionType::Buy);
    }
}
