//! 도메인 타입 모듈.

mod broker;
mod instrument;
mod order;
mod signal;

pub use broker::{BrokerError, BrokerGateway, BrokerHolding, BrokerPosition, OpenOrder};
pub use instrument::{normalize_base_symbol, Instrument, InstrumentType};
pub use order::{OrderRequest, OrderType, ProductType, TransactionType, Validity};
pub use signal::{Segment, Signal, SignalAction, SignalError};
