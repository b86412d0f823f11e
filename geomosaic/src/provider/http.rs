//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use super::types::{HttpResponse, ProviderError};

/// User agent sent with every tile request.
pub const DEFAULT_USER_AGENT: &str = concat!("geomosaic/", env!("CARGO_PKG_VERSION"));

/// Connection establishment timeout. Per-attempt deadlines are enforced by
/// the fetcher.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Trait for asynchronous HTTP GET requests.
///
/// Implementations report every status code as a response; deciding whether
/// a status means "absent", "retry" or "fail" is left to the caller. Only
/// transport failures are errors.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;
}

/// HTTP client backed by a single pooled `reqwest::Client`.
///
/// The pool is shared read-only by all concurrent fetches.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default user agent.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Creates a client that identifies itself with `user_agent`.
    ///
    /// Public tile servers (OpenStreetMap in particular) reject requests
    /// without a meaningful user agent.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ProviderError::ClientBuild(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/png,image/jpeg,image/*;q=0.9,*/*;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::HttpError(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    type Responder = Box<dyn Fn(&str) -> Result<HttpResponse, ProviderError> + Send + Sync>;
    type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

    /// Mock HTTP client for testing.
    ///
    /// Records every requested URL and the peak number of concurrently
    /// running requests.
    pub struct MockHttpClient {
        responder: Responder,
        delay: DelayFn,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new<F>(responder: F) -> Self
        where
            F: Fn(&str) -> Result<HttpResponse, ProviderError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                delay: Box::new(|_| Duration::ZERO),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Always answers with the same response.
        pub fn fixed(response: Result<HttpResponse, ProviderError>) -> Self {
            Self::new(move |_| response.clone())
        }

        /// Delays each request by a per-URL duration before responding.
        pub fn with_delay<D>(mut self, delay: D) -> Self
        where
            D: Fn(&str) -> Duration + Send + Sync + 'static,
        {
            self.delay = Box::new(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn calls_for(&self, url: &str) -> usize {
            self.requests.lock().iter().filter(|u| *u == url).count()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    /// Decrements the in-flight counter even when the request is dropped.
    struct InFlightGuard<'a>(&'a AtomicUsize);

    impl Drop for InFlightGuard<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
            self.requests.lock().push(url.to_string());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlightGuard(&self.in_flight);

            let delay = (self.delay)(url);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            (self.responder)(url)
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::fixed(Ok(HttpResponse::ok(vec![1, 2, 3, 4])));

        let result = mock.get("http://example.com").await;
        assert_eq!(result.unwrap().body, vec![1, 2, 3, 4]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let mock = MockHttpClient::fixed(Err(ProviderError::HttpError("Test error".to_string())));

        let result = mock.get("http://example.com").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_counts_per_url() {
        let mock = MockHttpClient::fixed(Ok(HttpResponse::new(404, vec![])));
        mock.get("http://a").await.unwrap();
        mock.get("http://a").await.unwrap();
        mock.get("http://b").await.unwrap();
        assert_eq!(mock.calls_for("http://a"), 2);
        assert_eq!(mock.calls_for("http://b"), 1);
        assert_eq!(mock.max_in_flight(), 1);
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::new().is_ok());
    }

    #[test]
    fn test_reqwest_client_rejects_bad_user_agent() {
        let result = ReqwestClient::with_user_agent("bad\nagent");
        assert!(matches!(result, Err(ProviderError::ClientBuild(_))));
    }
}
