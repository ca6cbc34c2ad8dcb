//! TES endpoint configuration

use std::time::Duration;

use tracing::{info, warn};

/// Default TES service URL
pub const DEFAULT_TES_URL: &str = "http://localhost:8000";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the TES service lives and how long a request may take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for TesConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TES_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TesConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `FARCALL_TES_URL` and `FARCALL_TES_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let url = var("FARCALL_TES_URL").unwrap_or_else(|| {
            info!("FARCALL_TES_URL not set, using default: {}", DEFAULT_TES_URL);
            DEFAULT_TES_URL.to_string()
        });

        let timeout = match var("FARCALL_TES_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %raw, "Ignoring invalid FARCALL_TES_TIMEOUT_SECS");
                    DEFAULT_TIMEOUT
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        Self { url, timeout }
    }
}
