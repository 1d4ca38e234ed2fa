//! HTTP destination: POST batches as a JSON array.

use super::{Destination, DestinationError};
use crate::events::Event;
use async_trait::async_trait;
use std::time::Duration;

/// Sends event batches to an HTTP endpoint as a JSON array.
///
/// The client is built once and pooled across ticks. Any non-2xx status
/// fails the whole batch.
pub struct HttpDestination {
    url: String,
    client: reqwest::Client,
}

impl HttpDestination {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT: f64 = 5.0;

    pub fn new(url: &str, timeout_seconds: f64) -> Result<Self, DestinationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(timeout_seconds.max(0.1)))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Destination for HttpDestination {
    async fn send(&self, batch: &[Event]) -> Result<(), DestinationError> {
        let resp = self.client.post(&self.url).json(&batch).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DestinationError::ServerStatus(status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_sink(status: axum::http::StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let app = Router::new().route(
            "/sink",
            post(move |body: axum::Json<Vec<Event>>| {
                let hits = Arc::clone(&hits_in);
                async move {
                    hits.fetch_add(body.0.len(), Ordering::SeqCst);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/sink"), hits)
    }

    #[tokio::test]
    async fn test_send_success() {
        let (url, hits) = spawn_sink(axum::http::StatusCode::OK).await;
        let dest = HttpDestination::new(&url, 2.0).unwrap();

        dest.send(&[Event::from_raw("a"), Event::from_raw("b")])
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure() {
        let (url, _hits) = spawn_sink(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let dest = HttpDestination::new(&url, 2.0).unwrap();

        let err = dest.send(&[Event::from_raw("a")]).await.unwrap_err();
        assert!(matches!(err, DestinationError::ServerStatus(s) if s.as_u16() == 500));
        assert_eq!(err.kind(), "ServerStatus");
    }
}
