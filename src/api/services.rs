use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};

use super::{
    error::ApiError,
    models::{EnqueueResponse, JobsRequest},
    state::AppState,
    utils::{MAX_BODY_SIZE, parse_content_type, validate_body_size},
};
use crate::jobs::{Job, envelope};
use crate::observability::MetricsSnapshot;

/// Job intake (POST /jobs)
///
/// Every envelope is decoded against the registry before anything is
/// published, so one bad envelope rejects the whole request. A single
/// envelope is published with `publish`, several with one `publish_many`.
pub async fn enqueue_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;
    validate_body_size(&body, MAX_BODY_SIZE)?;

    let request: JobsRequest = serde_json::from_slice(&body)?;
    let envelopes = request.into_envelopes();
    if envelopes.is_empty() {
        return Err(ApiError::InvalidPayload("no envelopes in request".into()));
    }

    let jobs = envelopes
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            envelope::decode_value(&state.registry, value)
                .map_err(|source| ApiError::InvalidEnvelope { index, source })
        })
        .collect::<Result<Vec<Job>, ApiError>>()?;

    // Re-encode so the queue only ever carries canonical envelopes
    let mut bodies =
        envelope::encode_all(&jobs).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let enqueued = bodies.len();
    if enqueued == 1 {
        if let Some(body) = bodies.pop() {
            state.producer.publish(&state.topic, body).await?;
        }
    } else {
        state.producer.publish_many(&state.topic, bodies).await?;
    }

    info!(enqueued, topic = %state.topic, "Jobs enqueued");
    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { enqueued })))
}

/// Counters (GET /metrics)
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Liveness (GET /health); fails when the queue keyspace cannot be read
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(queue) = &state.queue {
        if let Err(e) = queue.health_check() {
            error!(error = %e, "Queue health check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "queue unavailable");
        }
    }
    (StatusCode::OK, "ok")
}
