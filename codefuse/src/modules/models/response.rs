use chrono::{DateTime, Utc};
use codefuse_libs::{api::SourceFailure, ContestRecord};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize)]
pub struct NormalizedContestsResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<ContestRecord>,
    pub errors: Option<Vec<SourceFailure>>,
}
