//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::blocking::Client;

/// Identifies us to YouTube and the Bluesky PDS.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Every remote call carries a bounded timeout so a hung server cannot stall
/// the poll loop.
pub fn client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}
