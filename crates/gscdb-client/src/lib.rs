//! Client for the search analytics API: source discovery and paginated
//! per-day row fetching.

pub mod auth;
pub mod client;
pub mod error;
mod retry;
pub mod types;

pub use auth::TokenProvider;
pub use client::{ClientSettings, SearchConsoleClient};
pub use error::ClientError;
pub use types::{Dimension, SearchRow, SiteEntry, DEFAULT_DIMENSIONS};
