//! Client for the external suggestion service that pre-populates setup
//! wizard steps (products, competitors, ICPs, personas).

mod client;
mod error;
mod types;

pub use client::EnrichClient;
pub use error::EnrichError;
pub use types::{Suggestion, SuggestionKind};
