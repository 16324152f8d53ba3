use crate::sources::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

/// Outcome of one source after its timeout and retry policy were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Raw payload of every platform. A key is `null` when its source failed, never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformData {
    #[serde(default)]
    pub codeforces: Option<Value>,
    #[serde(default)]
    pub codechef: Option<Value>,
    #[serde(default)]
    pub leetcode: Option<Value>,
}

impl PlatformData {
    pub fn get(&self, platform: Platform) -> Option<&Value> {
        match platform {
            Platform::Codeforces => self.codeforces.as_ref(),
            Platform::CodeChef => self.codechef.as_ref(),
            Platform::LeetCode => self.leetcode.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub platform: Platform,
    pub message: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEnvelope {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub data: PlatformData,
    pub errors: Option<Vec<SourceFailure>>,
}

impl AggregateEnvelope {
    /// Build the envelope from the three per-source results.
    ///
    /// The envelope only reports failure when no source succeeded.
    pub fn from_results(
        codeforces: FetchResult,
        codechef: FetchResult,
        leetcode: FetchResult,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let results = [
            (Platform::Codeforces, codeforces),
            (Platform::CodeChef, codechef),
            (Platform::LeetCode, leetcode),
        ];

        let success = results.iter().any(|(_, result)| result.success);
        let errors: Vec<SourceFailure> = results
            .iter()
            .filter(|(_, result)| !result.success)
            .map(|(platform, result)| SourceFailure {
                platform: *platform,
                message: result
                    .error
                    .clone()
                    .unwrap_or(String::from("unknown error")),
            })
            .collect();

        let [(_, codeforces), (_, codechef), (_, leetcode)] = results;
        let data = PlatformData {
            codeforces: codeforces.success.then_some(codeforces.data).flatten(),
            codechef: codechef.success.then_some(codechef.data).flatten(),
            leetcode: leetcode.success.then_some(leetcode.data).flatten(),
        };

        Self {
            success,
            timestamp,
            data,
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }

    pub fn failures(&self) -> &[SourceFailure] {
        self.errors.as_deref().unwrap_or_default()
    }

    /// One line summary of the failed sources, e.g. `Codeforces: timed out after 8000ms`.
    pub fn failure_summary(&self) -> String {
        self.failures()
            .iter()
            .map(|failure| format!("{}: {}", failure.platform, failure.message))
            .collect::<Vec<String>>()
            .join("; ")
    }
}

/// Body returned when the aggregate call failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl ToString, error: impl ToString) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn ok(timestamp: DateTime<Utc>) -> Self {
        Self {
            status: String::from("ok"),
            timestamp,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn timestamp() -> DateTime<Utc> {
        Utc.timestamp_opt(1700000000, 0).unwrap()
    }

    #[test]
    fn partial_failure_keeps_other_sources() {
        let envelope = AggregateEnvelope::from_results(
            FetchResult::ok(json!({"status": "OK", "result": []})),
            FetchResult::failed("unexpected status 500"),
            FetchResult::ok(json!({"contests": []})),
            timestamp(),
        );

        assert!(envelope.success);
        assert_eq!(envelope.data.codechef, None);
        assert_eq!(envelope.data.leetcode, Some(json!({"contests": []})));
        assert_eq!(
            envelope.errors,
            Some(vec![SourceFailure {
                platform: Platform::CodeChef,
                message: String::from("unexpected status 500"),
            }])
        );
    }

    #[test]
    fn every_source_failed() {
        let envelope = AggregateEnvelope::from_results(
            FetchResult::failed("timed out"),
            FetchResult::failed("timed out"),
            FetchResult::failed("timed out"),
            timestamp(),
        );

        assert!(!envelope.success);
        assert_eq!(envelope.failures().len(), 3);
        assert_eq!(
            envelope.failure_summary(),
            "Codeforces: timed out; CodeChef: timed out; LeetCode: timed out"
        );
    }

    #[test]
    fn serialized_data_has_every_key() {
        let envelope = AggregateEnvelope::from_results(
            FetchResult::failed("boom"),
            FetchResult::ok(json!({})),
            FetchResult::failed("boom"),
            timestamp(),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        let data = value["data"].as_object().unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data["codeforces"], Value::Null);
        assert_eq!(data["codechef"], json!({}));
        assert_eq!(data["leetcode"], Value::Null);
    }

    #[test]
    fn errors_omitted_when_all_succeeded() {
        let envelope = AggregateEnvelope::from_results(
            FetchResult::ok(json!({})),
            FetchResult::ok(json!({})),
            FetchResult::ok(json!({})),
            timestamp(),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("errors").is_none());
        assert_eq!(value["success"], json!(true));
    }
}
