use std::time::Duration;

use reqwest::Client;

/// Shared client for the checkpoint, proof-generation and webhook endpoints
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent("rebalancer")
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
}
