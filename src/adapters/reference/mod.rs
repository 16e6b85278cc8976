//! Reference-data client adapters.

mod http_client;
mod mock;

pub use http_client::HttpReferenceClient;
pub use mock::{MockReferenceApi, RecordedCall};
