// Runtime configuration
//
// Configuration is environment-driven: there are no CLI arguments. Only
// WEBSOCKET_LISTEN and CUSTOM_LOG_LIST are recognized.

use std::time::Duration;

/// Google's v3 all-logs catalog
pub const DEFAULT_LOG_LIST_URL: &str =
    "https://www.gstatic.com/ct/log_list/v3/all_logs_list.json";

/// Default WebSocket listen address
pub const DEFAULT_WEBSOCKET_LISTEN: &str = "0.0.0.0:8080";

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Default interval between liveness pings on subscriber connections
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for a certstream run
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the CT log catalog (Google v3 schema)
    pub log_list_url: String,
    /// WebSocket listen address; a bare `:port` binds all interfaces
    pub websocket_listen: String,
    /// Capacity of each subscriber queue
    pub subscriber_buffer: usize,
    /// Interval between pings on idle subscriber connections
    pub ping_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_list_url: DEFAULT_LOG_LIST_URL.to_string(),
            websocket_listen: DEFAULT_WEBSOCKET_LISTEN.to_string(),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(listen) = std::env::var("WEBSOCKET_LISTEN") {
            config.websocket_listen = listen;
        }
        if let Ok(url) = std::env::var("CUSTOM_LOG_LIST") {
            config.log_list_url = url;
        }
        config
    }

    /// Listen address in bindable `host:port` form.
    pub fn listen_addr(&self) -> String {
        if self.websocket_listen.starts_with(':') {
            format!("0.0.0.0{}", self.websocket_listen)
        } else {
            self.websocket_listen.clone()
        }
    }
}
