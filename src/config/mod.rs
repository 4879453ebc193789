// Configuration management from environment variables

use dotenv::dotenv;
use std::env;
use std::str::FromStr;

use bitcoin::Network;

/// Configuration settings for the watch API server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // Server configuration
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub secure_cookies: bool,

    // Block explorer configuration
    pub explorer_base_url: String,
    pub explorer_timeout_secs: u64,
    pub network: Network,

    // Sign-in configuration
    pub allowed_emails: Vec<String>,
    pub magic_link_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub resend_cooldown_secs: u64,

    // Dashboard configuration
    pub page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
            secure_cookies: false,
            explorer_base_url: "https://mempool.space/api".to_string(),
            explorer_timeout_secs: 30,
            network: Network::Bitcoin,
            allowed_emails: Vec::new(),
            magic_link_ttl_secs: 24 * 60 * 60,
            session_ttl_secs: 30 * 24 * 60 * 60,
            resend_cooldown_secs: 30,
            page_size: 9,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated email list, dropping empty entries
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

impl ApiConfig {
    /// Creates configuration instance from environment variables with defaults
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        let network = match env::var("BITCOIN_NETWORK") {
            Ok(name) => Network::from_str(&name).unwrap_or_else(|_| {
                tracing::warn!("Unknown BITCOIN_NETWORK '{}', using {}", name, defaults.network);
                defaults.network
            }),
            Err(_) => defaults.network,
        };

        let allowed_emails = env::var("ALLOWED_EMAILS")
            .map(|raw| parse_email_list(&raw))
            .unwrap_or_default();
        if allowed_emails.is_empty() {
            tracing::warn!("ALLOWED_EMAILS is empty; nobody will be able to sign in");
        }

        let page_size = match env_or("PAGE_SIZE", defaults.page_size) {
            0 => defaults.page_size,
            size => size,
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            secure_cookies: env_or("SECURE_COOKIES", defaults.secure_cookies),
            explorer_base_url: env::var("EXPLORER_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.explorer_base_url),
            explorer_timeout_secs: env_or("EXPLORER_TIMEOUT_SECS", defaults.explorer_timeout_secs),
            network,
            allowed_emails,
            magic_link_ttl_secs: env_or("MAGIC_LINK_TTL_SECS", defaults.magic_link_ttl_secs),
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            resend_cooldown_secs: env_or("RESEND_COOLDOWN_SECS", defaults.resend_cooldown_secs),
            page_size,
        }
    }

    /// Returns formatted server address string (host:port)
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
