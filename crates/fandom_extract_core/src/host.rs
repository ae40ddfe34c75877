//! Contracts for everything the extraction pipeline borrows from its host:
//! HTTP, the editor cursor, transient notices and the search prompt.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;

pub const DEFAULT_USER_AGENT: &str = "fandom-extract/0.2";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Issues a GET and returns the body text. Non-2xx responses are errors.
pub trait HttpTransport: Sync {
    fn get_text(&self, url: &str) -> Result<String>;
}

/// Receives transient, user-facing messages.
pub trait Notifier: Sync {
    fn notify(&self, message: &str);
}

/// Inserts text at the host editor's cursor.
pub trait EditorSink {
    fn insert_at_cursor(&mut self, text: &str) -> Result<()>;
}

/// Asks the user for a search term. `None` means the prompt was dismissed.
pub trait SearchPrompt {
    fn prompt(&mut self, message: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: env::var("FANDOM_USER_AGENT")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_ms: env::var("FANDOM_HTTP_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn from_env() -> Result<Self> {
        Self::new(TransportConfig::from_env())
    }

    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Fandom HTTP client")?;
        Ok(Self {
            client,
            user_agent: config.user_agent,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} while fetching {}", status.as_u16(), url);
        }
        response.text().context("failed to read response body")
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_USER_AGENT, ReqwestTransport, TransportConfig};

    #[test]
    fn default_transport_config_uses_thirty_second_timeout() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn transport_builds_from_explicit_config() {
        let transport = ReqwestTransport::new(TransportConfig {
            user_agent: "test-agent/1.0".to_string(),
            timeout_ms: 500,
        })
        .expect("transport");
        assert_eq!(transport.user_agent, "test-agent/1.0");
    }
}
