use std::time::Duration;

use common::error::AppError;
use reqwest::StatusCode;
use serde::Serialize;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, warn};

/// Retry delays double from 100 ms and never exceed this cap.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    text: &'a str,
}

/// HTTP client for the remote content-analysis service.
#[derive(Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    retry_attempts: usize,
}

impl AnalysisClient {
    pub fn new(endpoint: impl Into<String>, retry_attempts: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            retry_attempts,
        }
    }

    /// Posts the formatted text and returns the raw response body.
    ///
    /// Any status other than 200 is an [`AppError::AnalysisService`] carrying
    /// the body for diagnostics. Transport errors, 429 and 5xx are retried up
    /// to `retry_attempts` times with jittered exponential backoff.
    pub async fn analyze(&self, text: &str) -> Result<String, AppError> {
        let retry_strategy = backoff().map(jitter).take(self.retry_attempts);

        RetryIf::spawn(retry_strategy, || self.post_once(text), is_retryable).await
    }

    async fn post_once(&self, text: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&AnalysisRequest { text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "analysis service returned a non-success status"
            );
            return Err(AppError::AnalysisService {
                status: status.as_u16(),
                body,
            });
        }

        debug!(body_len = body.len(), "analysis service responded");
        Ok(body)
    }
}

/// 100 ms, 200 ms, 400 ms, ... capped at [`RETRY_MAX_DELAY`]. The base is the
/// growth rate, so it stays at 2 and `factor` scales it to milliseconds.
fn backoff() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor(50)
        .max_delay(RETRY_MAX_DELAY)
}

fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::Reqwest(_) => true,
        AppError::AnalysisService { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::Value;

    /// Serves `responses` in order, repeating the last one, and counts calls.
    async fn spawn_analyzer(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = (Arc::new(responses), Arc::clone(&calls));

        let app = Router::new()
            .route(
                "/ml/service/analysis",
                post(
                    |State((responses, calls)): State<(
                        Arc<Vec<(u16, &'static str)>>,
                        Arc<AtomicUsize>,
                    )>,
                     Json(body): Json<Value>| async move {
                        assert!(body.get("text").is_some(), "request carries text");
                        let idx = calls.fetch_add(1, Ordering::SeqCst);
                        let (status, body) = responses
                            .get(idx)
                            .or_else(|| responses.last())
                            .copied()
                            .expect("at least one response");
                        (
                            AxumStatus::from_u16(status).expect("valid status"),
                            body.to_string(),
                        )
                    },
                ),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind analyzer");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve analyzer");
        });

        (format!("http://{addr}/ml/service/analysis"), calls)
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let body = r#"{"time":"1.0 seconds","percentage":90,"overall":"Low"}"#;
        let (url, calls) = spawn_analyzer(vec![(200, body)]).await;

        let client = AnalysisClient::new(url, 0);
        let response = client.analyze("1. Hello.\n").await.expect("analysis");

        assert_eq!(response, body);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let (url, calls) = spawn_analyzer(vec![(400, "bad input")]).await;

        let client = AnalysisClient::new(url, 3);
        let result = client.analyze("1. Hello.\n").await;

        match result {
            Err(AppError::AnalysisService { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad input");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "4xx is not retried");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let body = r#"{"time":"1.0 seconds","percentage":90,"overall":"Low"}"#;
        let (url, calls) = spawn_analyzer(vec![(503, "busy"), (200, body)]).await;

        let client = AnalysisClient::new(url, 2);
        let response = client.analyze("1. Hello.\n").await.expect("analysis");

        assert_eq!(response, body);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let (url, calls) = spawn_analyzer(vec![(500, "boom")]).await;

        let client = AnalysisClient::new(url, 0);
        let result = client.analyze("1. Hello.\n").await;

        assert!(matches!(
            result,
            Err(AppError::AnalysisService { status: 500, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let delays: Vec<Duration> = backoff().take(8).collect();

        assert_eq!(
            delays.get(..3),
            Some(
                &[
                    Duration::from_millis(100),
                    Duration::from_millis(200),
                    Duration::from_millis(400),
                ][..]
            )
        );
        assert!(delays.iter().all(|delay| *delay <= RETRY_MAX_DELAY));
        assert_eq!(delays.last(), Some(&RETRY_MAX_DELAY));
    }

    #[tokio::test]
    async fn three_retries_finish_well_inside_the_analysis_timeout() {
        let body = r#"{"time":"1.0 seconds","percentage":90,"overall":"Low"}"#;
        let (url, calls) =
            spawn_analyzer(vec![(503, "busy"), (503, "busy"), (503, "busy"), (200, body)]).await;

        let client = AnalysisClient::new(url, 3);
        let response = tokio::time::timeout(Duration::from_secs(5), client.analyze("1. Hello.\n"))
            .await
            .expect("retries complete before the timeout")
            .expect("analysis");

        assert_eq!(response, body);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
