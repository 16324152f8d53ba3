//! Response shapes of the external contest listing APIs.
//!
//! The schemas are owned by the platforms and drift without notice, so every field is optional
//! and decoding never fails: a field of an unexpected type becomes `None`, and a list element that
//! can't be decoded is skipped.

use super::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, VecSkipError};

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeforcesResponse {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub status: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError<Option<VecSkipError<_>>>")]
    pub result: Option<Vec<CodeforcesContest>>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeforcesContest {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub id: Option<i64>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub name: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub phase: Option<String>,
    #[serde(default, rename = "startTimeSeconds")]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub start_time_seconds: Option<i64>,
    #[serde(default, rename = "durationSeconds")]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub duration_seconds: Option<i64>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeChefResponse {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError<Option<VecSkipError<_>>>")]
    pub future_contests: Option<Vec<CodeChefContest>>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError<Option<VecSkipError<_>>>")]
    pub present_contests: Option<Vec<CodeChefContest>>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeChefContest {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_code: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_name: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_start_date: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_end_date: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_start_date_iso: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_end_date_iso: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub contest_status: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeetCodeResponse {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError<Option<VecSkipError<_>>>")]
    pub contests: Option<Vec<LeetCodeContest>>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeetCodeContest {
    #[serde(default, rename = "titleSlug")]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub title_slug: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub title: Option<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub start_time: Option<i64>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub duration: Option<i64>,
}

/// Raw contest list of one platform.
#[derive(Debug, Clone, PartialEq)]
pub enum RawContestList {
    Codeforces(CodeforcesResponse),
    CodeChef(CodeChefResponse),
    LeetCode(LeetCodeResponse),
}

impl RawContestList {
    /// Decode a platform payload. Anything that isn't a JSON object decodes to an empty list.
    pub fn decode(platform: Platform, value: &Value) -> Self {
        match platform {
            Platform::Codeforces => {
                RawContestList::Codeforces(decode_or_default(platform, value))
            }
            Platform::CodeChef => RawContestList::CodeChef(decode_or_default(platform, value)),
            Platform::LeetCode => RawContestList::LeetCode(decode_or_default(platform, value)),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            RawContestList::Codeforces(_) => Platform::Codeforces,
            RawContestList::CodeChef(_) => Platform::CodeChef,
            RawContestList::LeetCode(_) => Platform::LeetCode,
        }
    }
}

fn decode_or_default<T>(platform: Platform, value: &Value) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    if value.is_null() {
        return T::default();
    }

    match T::deserialize(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!("couldn't decode {} payload cause [{}]", platform, e);
            T::default()
        }
    }
}
