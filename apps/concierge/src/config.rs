use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::poll::PollPolicy;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Application configuration loaded from environment variables.
///
/// The API key is optional here: offline subcommands never need it, and
/// `LlmClient::from_config` refuses to start without it.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub rust_log: String,
    /// Fixed pause between consecutive calls in batch loops.
    pub request_delay: Duration,
    pub fine_tune_poll: PollPolicy,
    pub eval_poll: PollPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_api_base: optional_env("OPENAI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            request_delay: Duration::from_millis(parse_env("CONCIERGE_REQUEST_DELAY_MS", 1000)?),
            fine_tune_poll: PollPolicy {
                interval: Duration::from_secs(parse_env("CONCIERGE_FT_POLL_SECS", 60)?),
                max_attempts: parse_env("CONCIERGE_FT_MAX_CHECKS", 30)?,
            },
            eval_poll: PollPolicy {
                interval: Duration::from_secs(parse_env("CONCIERGE_EVAL_POLL_SECS", 10)?),
                max_attempts: parse_env("CONCIERGE_EVAL_MAX_CHECKS", 90)?,
            },
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("CONCIERGE_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("CONCIERGE_TEST_BAD_NUMBER", "sixty");
        let result: Result<u64> = parse_env("CONCIERGE_TEST_BAD_NUMBER", 60);
        assert!(result.is_err());
        std::env::remove_var("CONCIERGE_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_parse_env_reads_value() {
        std::env::set_var("CONCIERGE_TEST_GOOD_NUMBER", " 15 ");
        let value: u32 = parse_env("CONCIERGE_TEST_GOOD_NUMBER", 1).unwrap();
        assert_eq!(value, 15);
        std::env::remove_var("CONCIERGE_TEST_GOOD_NUMBER");
    }
}
