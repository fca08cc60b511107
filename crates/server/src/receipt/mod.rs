//! The receipt pipeline: CSV validation, document assembly, PDF
//! rendering, and bulk dispatch.

pub mod csv;
pub mod dispatch;
pub mod document;
pub mod render;
pub mod store;

pub use csv::{CsvError, parse_recipients};
pub use dispatch::{DispatchOutcome, Dispatcher, MAX_CONCURRENT_DISPATCHES};
pub use document::{AssembleError, ReceiptDocument, ReceiptStore, build_receipt};
pub use render::{ChromiumRenderer, ReceiptRenderer, RenderError};
pub use store::PgReceiptStore;
