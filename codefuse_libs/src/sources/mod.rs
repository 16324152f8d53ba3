pub mod core;
pub mod model;
pub mod retry;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

pub use self::core::{ContestSource, HttpContestSource, SourceError};
pub use self::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Contest listing platforms served by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    Codeforces,
    CodeChef,
    LeetCode,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Codeforces, Platform::CodeChef, Platform::LeetCode];

    /// Key used in the envelope's `data` object and in query strings.
    pub fn key(&self) -> &'static str {
        match self {
            Platform::Codeforces => "codeforces",
            Platform::CodeChef => "codechef",
            Platform::LeetCode => "leetcode",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            Platform::Codeforces => "https://codeforces.com/api/contest.list",
            Platform::CodeChef => "https://www.codechef.com/api/list/contests/all?mode=all",
            Platform::LeetCode => "https://leetcode.com/contest/api/list/",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Platform::Codeforces => write!(f, "Codeforces"),
            Platform::CodeChef => write!(f, "CodeChef"),
            Platform::LeetCode => write!(f, "LeetCode"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown platform `{0}`")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "codeforces" => Ok(Platform::Codeforces),
            "codechef" => Ok(Platform::CodeChef),
            "leetcode" => Ok(Platform::LeetCode),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

/// Endpoint, request timeout and retry policy of one source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: Url,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl SourceConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            url: Url::parse(platform.default_url()).expect("default platform url is valid"),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub codeforces: SourceConfig,
    pub codechef: SourceConfig,
    pub leetcode: SourceConfig,
    pub user_agent: String,
}

impl AggregatorConfig {
    pub fn source(&self, platform: Platform) -> &SourceConfig {
        match platform {
            Platform::Codeforces => &self.codeforces,
            Platform::CodeChef => &self.codechef,
            Platform::LeetCode => &self.leetcode,
        }
    }

    pub fn source_mut(&mut self, platform: Platform) -> &mut SourceConfig {
        match platform {
            Platform::Codeforces => &mut self.codeforces,
            Platform::CodeChef => &mut self.codechef,
            Platform::LeetCode => &mut self.leetcode,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            codeforces: SourceConfig::new(Platform::Codeforces),
            codechef: SourceConfig::new(Platform::CodeChef),
            leetcode: SourceConfig::new(Platform::LeetCode),
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}
