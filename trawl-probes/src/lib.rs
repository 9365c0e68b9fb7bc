pub mod error;
pub mod intel;
pub mod result;
pub mod ssl;

pub use error::ProbeError;
pub use intel::IntelClient;
pub use result::{IntelReport, SslReport};
pub use ssl::SslProber;

use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("Trawl/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client settings for every probe.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> error::Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    Ok(client)
}
