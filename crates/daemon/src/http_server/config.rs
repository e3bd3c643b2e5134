use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // Prefix every route is nested under; empty or `/segment[/segment..]`
    pub path_prefix: String,
    // log level for http tracing
    pub log_level: tracing::Level,
}

/// `gfhs/` and `/gfhs` both become `/gfhs`; `/` and `` become empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

impl Config {
    pub fn new(listen_addr: SocketAddr, path_prefix: String) -> Self {
        let path_prefix = normalize_prefix(&path_prefix);
        tracing::info!(
            listen_addr = %listen_addr,
            path_prefix = %path_prefix,
            "creating HTTP server config"
        );
        Self {
            listen_addr,
            path_prefix,
            log_level: tracing::Level::INFO,
        }
    }
}
