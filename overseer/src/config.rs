//! Service configuration, read from the environment

use std::time::Duration;

use crate::workflow::controller::WorkflowPolicy;

/// Overseer service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP API listens on
    pub port: u16,
    /// Path to the libsql session journal
    pub database_path: String,
    /// Endpoint the launcher POSTs new agent runs to
    pub agent_endpoint: String,
    /// Time between journal polls while a session is pending
    pub poll_interval: Duration,
    /// Overall wall-clock deadline per session
    pub session_deadline: Duration,
    /// Terminal events fetched per completion check
    pub terminal_query_limit: i64,
    /// Hard cap on polls per session
    pub max_poll_attempts: u32,
    /// Registry re-check interval while waiting for an outcome
    pub await_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_parse("OVERSEER_PORT", 8080)?,
            database_path: env_str("OVERSEER_DATABASE_PATH", "./data/session_events.db"),
            agent_endpoint: env_str(
                "OVERSEER_AGENT_ENDPOINT",
                "http://127.0.0.1:9797/agent/launch",
            ),
            poll_interval: Duration::from_millis(env_parse("OVERSEER_POLL_INTERVAL_MS", 5_000)?),
            session_deadline: Duration::from_secs(env_parse(
                "OVERSEER_SESSION_DEADLINE_SECS",
                1_800,
            )?),
            terminal_query_limit: env_parse("OVERSEER_TERMINAL_QUERY_LIMIT", 20)?,
            max_poll_attempts: env_parse("OVERSEER_MAX_POLL_ATTEMPTS", 360)?,
            await_poll_interval: Duration::from_millis(env_parse("OVERSEER_AWAIT_POLL_MS", 250)?),
        })
    }

    /// Workflow timing and budget view of this configuration
    pub fn workflow_policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            poll_interval: self.poll_interval,
            session_deadline: self.session_deadline,
            terminal_query_limit: self.terminal_query_limit,
            max_poll_attempts: self.max_poll_attempts,
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
