use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::Json;
use codefuse_libs::{
    api::ErrorResponse,
    normalizer::{ContestFilter, PlatformFilter, StatusFilter},
};
use http::request::Parts;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

static VALID_PLATFORMS: Lazy<HashSet<&str>> =
    Lazy::new(|| HashSet::from(["all", "codeforces", "codechef", "leetcode"]));

static VALID_STATUSES: Lazy<HashSet<&str>> =
    Lazy::new(|| HashSet::from(["all", "upcoming", "active", "past"]));

fn validate_platform(value: &str) -> Result<(), ValidationError> {
    if VALID_PLATFORMS.contains(value.trim().to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid platform"))
    }
}

fn validate_status(value: &str) -> Result<(), ValidationError> {
    if VALID_STATUSES.contains(value.trim().to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid status"))
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ContestQueryParameters {
    #[validate(custom = "validate_platform")]
    pub platform: Option<String>,
    #[validate(custom = "validate_status")]
    pub status: Option<String>,
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<u32>,
}

impl ContestQueryParameters {
    pub fn to_filter(&self) -> ContestFilter {
        let platform = self
            .platform
            .as_deref()
            .and_then(|platform| platform.parse::<PlatformFilter>().ok())
            .unwrap_or_default();
        let status = self
            .status
            .as_deref()
            .and_then(|status| status.parse::<StatusFilter>().ok())
            .unwrap_or_default();

        ContestFilter::new(platform, status)
    }
}

pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let value: T = serde_urlencoded::from_str(query).map_err(|rejection| {
            tracing::error!("Parsing error: {}", rejection);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "invalid format query string",
                    rejection.to_string(),
                )),
            )
        })?;

        value.validate().map_err(|rejection| {
            tracing::error!("Validation error: {}", rejection);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "invalid query parameters",
                    format!("Validation error: [{}]", rejection).replace('\n', ", "),
                )),
            )
        })?;

        Ok(ValidatedQuery(value))
    }
}
