pub mod client;
pub mod fetcher;
pub mod status_report;

pub use client::{FetchError, HerokuClient};
pub use fetcher::HealthFetcher;
