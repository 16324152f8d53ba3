use anyhow::{Context, Result};
use codefuse_libs::{
    reminder::DEFAULT_POLL_INTERVAL,
    sources::{retry::MAX_RETRIES, AggregatorConfig, Platform, RetryPolicy, DEFAULT_TIMEOUT},
};
use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};
use url::Url;

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REMINDER_STORE_PATH: &str = ".codefuse/reminders.json";

/// Build the aggregator configuration from the environment.
///
/// Every source setting is looked up as `{PLATFORM}_{NAME}` first (e.g. `LEETCODE_TIMEOUT_SECS`),
/// then as `SOURCE_{NAME}`, then falls back to the default.
pub fn load_aggregator_config() -> Result<AggregatorConfig> {
    let mut config = AggregatorConfig::default();
    if let Ok(user_agent) = env::var("SOURCE_USER_AGENT") {
        config.user_agent = user_agent;
    }

    for platform in Platform::ALL {
        let prefix = platform.key().to_uppercase();
        let source = config.source_mut(platform);

        let url_key = format!("{}_API_URL", prefix);
        if let Ok(url) = env::var(&url_key) {
            source.url = Url::parse(&url).with_context(|| {
                let message = format!("{} is not a valid url: {}", url_key, url);
                tracing::error!(message);
                message
            })?;
        }

        let timeout: u64 = lookup(&prefix, "TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT.as_secs());
        source.timeout = Duration::from_secs(clamp_timeout(timeout));

        let strategy: String =
            lookup(&prefix, "RETRY_STRATEGY")?.unwrap_or(String::from("none"));
        let retries: u32 = lookup(&prefix, "RETRY_ATTEMPTS")?.unwrap_or(0);
        let delay: u64 = lookup(&prefix, "RETRY_DELAY_MS")?.unwrap_or(DEFAULT_RETRY_DELAY_MS);
        source.retry = retry_policy(&strategy, retries, delay)?;
    }

    Ok(config)
}

fn lookup<T>(prefix: &str, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    for key in [format!("{}_{}", prefix, name), format!("SOURCE_{}", name)] {
        if let Ok(value) = env::var(&key) {
            let parsed = value.trim().parse::<T>().map_err(|e| {
                let message = format!("invalid value `{}` for {}: {}", value, key, e);
                tracing::error!(message);
                anyhow::anyhow!(message)
            })?;
            return Ok(Some(parsed));
        }
    }

    Ok(None)
}

fn clamp_timeout(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    if clamped != secs {
        tracing::warn!(
            "source timeout {}s is out of range, {}s will be used",
            secs,
            clamped
        );
    }
    clamped
}

pub fn retry_policy(strategy: &str, retries: u32, delay_ms: u64) -> Result<RetryPolicy> {
    if retries > MAX_RETRIES {
        tracing::warn!(
            "{} retries requested but at most {} are allowed",
            retries,
            MAX_RETRIES
        );
    }
    let retries = retries.min(MAX_RETRIES);
    let delay = Duration::from_millis(delay_ms);

    let policy = match strategy.trim().to_lowercase().as_str() {
        "none" => RetryPolicy::None,
        "fixed" => RetryPolicy::Fixed { retries, delay },
        "exponential" => RetryPolicy::Exponential {
            retries,
            base_delay: delay,
        },
        other => {
            let message = format!("unknown retry strategy `{}`", other);
            tracing::error!(message);
            anyhow::bail!(message)
        }
    };

    if retries == 0 {
        Ok(RetryPolicy::None)
    } else {
        Ok(policy)
    }
}

pub fn port() -> u16 {
    match env::var("PORT").map(|port| port.parse::<u16>()) {
        Ok(Ok(port)) => port,
        Ok(Err(e)) => {
            tracing::warn!("PORT is invalid ({}), default port {} will be used", e, DEFAULT_PORT);
            DEFAULT_PORT
        }
        Err(_) => {
            tracing::warn!("API server will be launched at default port number {}", DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}

pub fn reminder_store_path() -> PathBuf {
    env::var("REMINDER_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            tracing::info!(
                "REMINDER_STORE_PATH environment variable is not set. Default value `{}` will be used.",
                DEFAULT_REMINDER_STORE_PATH
            );
            PathBuf::from(DEFAULT_REMINDER_STORE_PATH)
        })
}

pub fn reminder_poll_interval() -> Duration {
    match env::var("REMINDER_POLL_SECS").map(|secs| secs.parse::<u64>()) {
        Ok(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
        Ok(_) => {
            tracing::warn!(
                "REMINDER_POLL_SECS is invalid, {}s will be used",
                DEFAULT_POLL_INTERVAL.as_secs()
            );
            DEFAULT_POLL_INTERVAL
        }
        Err(_) => DEFAULT_POLL_INTERVAL,
    }
}
