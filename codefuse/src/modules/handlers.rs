use crate::modules::models::{
    request::{ContestQueryParameters, ValidatedQuery},
    response::NormalizedContestsResponse,
};
use axum::{
    extract::Extension,
    http::{Method, StatusCode},
    Json,
};
use chrono::Utc;
use codefuse_libs::{
    api::{AggregateEnvelope, ErrorResponse, HealthResponse},
    normalize_all, Aggregator,
};
use std::sync::Arc;
use tokio::time::Instant;

const FAILURE_MESSAGE: &str = "Failed to fetch contest data";

type Failure = (StatusCode, Json<ErrorResponse>);

fn total_failure(envelope: &AggregateEnvelope) -> Failure {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new(
            FAILURE_MESSAGE,
            envelope.failure_summary(),
        )),
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(Utc::now()))
}

pub async fn contests(
    Extension(aggregator): Extension<Arc<Aggregator>>,
) -> Result<Json<AggregateEnvelope>, Failure> {
    let start_process = Instant::now();
    let envelope = aggregator.aggregate().await;
    let time = Instant::now().duration_since(start_process).as_millis();

    tracing::info!(
        target: "querylog",
        "elapsed_time={} success={} failed_sources={}",
        time,
        envelope.success,
        envelope.failures().len()
    );

    if !envelope.success {
        return Err(total_failure(&envelope));
    }
    Ok(Json(envelope))
}

pub async fn normalized_contests(
    ValidatedQuery(params): ValidatedQuery<ContestQueryParameters>,
    Extension(aggregator): Extension<Arc<Aggregator>>,
) -> Result<Json<NormalizedContestsResponse>, Failure> {
    let envelope = aggregator.aggregate().await;
    if !envelope.success {
        return Err(total_failure(&envelope));
    }

    let now = Utc::now();
    let mut items = params.to_filter().apply(normalize_all(&envelope.data, now), now);
    if let Some(limit) = params.limit {
        items.truncate(limit as usize);
    }

    tracing::info!(
        target: "querylog",
        "hits={} params={}",
        items.len(),
        serde_json::to_string(&params).unwrap_or(String::from(""))
    );

    Ok(Json(NormalizedContestsResponse {
        success: true,
        timestamp: envelope.timestamp,
        count: items.len(),
        items,
        errors: envelope.errors,
    }))
}

/// CORS preflight on known routes.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn fallback(method: Method) -> StatusCode {
    if method == Method::OPTIONS {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
