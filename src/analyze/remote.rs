//! Client for the external content-understanding service: fragment text in,
//! semantic label + confidence out. Bounded by a per-fragment timeout and a
//! per-job concurrency cap so a slow service degrades imports instead of
//! stalling them.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::ImportError;

const TIMEOUT: Duration = Duration::from_secs(5);
const MAX_IN_FLIGHT: usize = 4;

pub struct RemoteClassifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    semaphore: Arc<Semaphore>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
    #[serde(default)]
    confidence: f32,
}

impl RemoteClassifier {
    /// Build from environment; None when no service is configured, which
    /// means every fragment takes the local path.
    pub fn from_env() -> Option<RemoteClassifier> {
        let url = std::env::var("STOREPORT_CLASSIFIER_URL").ok()?;
        let api_key = std::env::var("STOREPORT_CLASSIFIER_KEY").ok();
        Some(RemoteClassifier::new(url, api_key))
    }

    pub fn new(url: String, api_key: Option<String>) -> RemoteClassifier {
        RemoteClassifier {
            client: reqwest::Client::new(),
            url,
            api_key,
            semaphore: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    /// Classify one fragment. Every failure mode (permit starvation, timeout,
    /// transport, bad payload) maps to `ClassificationUnavailable` so the
    /// caller can fall back locally.
    pub async fn classify(&self, fragment: &str) -> Result<(String, f32), ImportError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ImportError::ClassificationUnavailable(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "fragment": fragment }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        // The timeout covers the full exchange: a service that accepts the
        // request and then trickles the body must not stall the fragment.
        let parsed: ClassifyResponse = tokio::time::timeout(TIMEOUT, async {
            let response = request
                .send()
                .await
                .map_err(|e| ImportError::ClassificationUnavailable(e.to_string()))?;
            response
                .error_for_status()
                .map_err(|e| ImportError::ClassificationUnavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| ImportError::ClassificationUnavailable(e.to_string()))
        })
        .await
        .map_err(|_| {
            warn!("classifier timed out after {:?}", TIMEOUT);
            ImportError::ClassificationUnavailable("timeout".into())
        })??;

        Ok((parsed.label, parsed.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Reserved TEST-NET address; connection fails fast or times out.
        let classifier = RemoteClassifier::new("http://192.0.2.1:9/classify".into(), None);
        let err = classifier.classify("some fragment").await.unwrap_err();
        assert!(matches!(err, ImportError::ClassificationUnavailable(_)));
    }

    #[tokio::test]
    async fn stalled_response_body_hits_the_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Accepts the request, sends headers, then never finishes the body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{",
                )
                .await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let classifier = RemoteClassifier::new(format!("http://{}/classify", addr), None);
        let started = std::time::Instant::now();
        let err = classifier.classify("some fragment").await.unwrap_err();
        assert!(matches!(err, ImportError::ClassificationUnavailable(_)));
        assert!(started.elapsed() < TIMEOUT + Duration::from_secs(2));
    }
}
