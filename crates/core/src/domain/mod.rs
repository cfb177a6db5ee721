pub mod request;
pub mod sentiment;
pub mod stock;
pub mod wire;

pub use request::{Field, FieldErrors, NewStockRequest, ResearchRequest, ValidNewStock};
pub use sentiment::{classify, Sentiment};
pub use stock::{ResearchRecord, Stock};
