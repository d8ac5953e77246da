use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use crawlbox::api::{self, models::EnqueueResponse, state::AppState};
use crawlbox::jobs::{FetchCharacterJob, FetchCharacterRangeJob, Job, JobRegistry, envelope};
use crawlbox::messaging::RecordingProducer;
use crawlbox::observability::Metrics;
use crawlbox::queue::FjallQueue;
use tempfile::TempDir;

const TOPIC: &str = "fetch";

/// Builds the router over an in-memory producer
fn build_test_app() -> (Router, Arc<RecordingProducer>, Arc<Metrics>) {
    let producer = Arc::new(RecordingProducer::new());
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(
        Arc::new(JobRegistry::with_defaults()),
        producer.clone(),
        metrics.clone(),
        TOPIC,
    );
    (api::router(state), producer, metrics)
}

fn post_jobs(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn published_jobs(producer: &RecordingProducer) -> Vec<Job> {
    let registry = JobRegistry::with_defaults();
    producer
        .published()
        .into_iter()
        .map(|(topic, body)| {
            assert_eq!(topic, TOPIC);
            envelope::decode(&registry, &body).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = build_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_health_checks_queue_when_attached() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(FjallQueue::open(temp_dir.path().join("queue")).unwrap());
    let state = AppState::new(
        Arc::new(JobRegistry::with_defaults()),
        Arc::new(RecordingProducer::new()),
        Arc::new(Metrics::new()),
        TOPIC,
    )
    .with_queue(queue);

    let response = api::router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_single_envelope_is_enqueued() {
    let (app, producer, _) = build_test_app();

    let response = app
        .oneshot(post_jobs(json!({"t": "character", "d": {"id": 7248246}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: EnqueueResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(body, EnqueueResponse { enqueued: 1 });

    assert_eq!(
        published_jobs(&producer),
        vec![Job::from(FetchCharacterJob::new(7248246))]
    );
    assert_eq!(producer.batches(), 0);
}

#[tokio::test]
async fn test_batch_is_published_together() {
    let (app, producer, _) = build_test_app();

    let response = app
        .oneshot(post_jobs(json!([
            {"t": "character", "d": {"id": 1, "force": true}},
            {"t": "character_range", "d": {"start": 1000, "count": 2500}}
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await, json!({"enqueued": 2}));

    assert_eq!(
        published_jobs(&producer),
        vec![
            Job::from(FetchCharacterJob::forced(1)),
            Job::from(FetchCharacterRangeJob {
                start: 1000,
                count: 2500
            }),
        ]
    );
    assert_eq!(producer.batches(), 1);
}

#[tokio::test]
async fn test_unknown_tag_rejects_whole_batch() {
    let (app, producer, _) = build_test_app();

    let response = app
        .oneshot(post_jobs(json!([
            {"t": "character", "d": {"id": 1}},
            {"t": "guild", "d": {"id": 2}}
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNKNOWN_JOB_TYPE");
    assert!(body["message"].as_str().unwrap().contains("envelope 1"));

    assert!(producer.published().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let (app, producer, _) = build_test_app();

    let response = app
        .oneshot(post_jobs(json!({"t": "character", "d": {"id": "not a number"}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ENVELOPE");
    assert!(producer.published().is_empty());
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let (app, _, _) = build_test_app();

    let response = app.oneshot(post_jobs(json!([]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected() {
    let (app, producer, _) = build_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"t":"character","d":{"id":1}}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_PAYLOAD");
    assert!(producer.published().is_empty());
}

#[tokio::test]
async fn test_producer_failure_is_unavailable() {
    let (app, producer, _) = build_test_app();
    producer.set_failing(true);

    let response = app
        .oneshot(post_jobs(json!({"t": "character", "d": {"id": 5}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "ENQUEUE_FAILED");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_counters() {
    let (app, _, metrics) = build_test_app();
    metrics.delivery_received();
    metrics.job_succeeded();
    metrics.cache_hit();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deliveries_received"], 1);
    assert_eq!(body["jobs_succeeded"], 1);
    assert_eq!(body["cache_hits"], 1);
    assert_eq!(body["jobs_failed"], 0);
}
