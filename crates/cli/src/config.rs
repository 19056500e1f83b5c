use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use relaycall_client::{CallSettings, IceTransportPolicy};

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub room: String,
    pub display_name: String,
    pub ice_policy: IceTransportPolicy,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("RELAYCALL_ENDPOINT")
            .filter(|value| !value.trim().is_empty())
            .context("RELAYCALL_ENDPOINT must point at the SFU's JSON-RPC endpoint")?;

        let ice_policy = match lookup("RELAYCALL_ICE_POLICY") {
            Some(value) => value.parse::<IceTransportPolicy>().context("invalid RELAYCALL_ICE_POLICY")?,
            None => IceTransportPolicy::Relay,
        };

        Ok(Self {
            endpoint,
            room: lookup("RELAYCALL_ROOM").unwrap_or_else(|| "test".to_owned()),
            display_name: lookup("RELAYCALL_NAME").unwrap_or_else(|| "native".to_owned()),
            ice_policy,
            poll_interval: millis(&lookup, "RELAYCALL_POLL_INTERVAL_MS", 3000)?,
            rpc_timeout: millis(&lookup, "RELAYCALL_RPC_TIMEOUT_MS", 10_000)?,
        })
    }

    pub fn call_settings(&self) -> CallSettings {
        CallSettings {
            room: self.room.clone(),
            ice_policy: self.ice_policy,
            poll_interval: self.poll_interval,
        }
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_millis(default));
    };
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a number of milliseconds, got {raw:?}"))?;
    anyhow::ensure!(value > 0, "{key} must be greater than zero");
    Ok(Duration::from_millis(value))
}
