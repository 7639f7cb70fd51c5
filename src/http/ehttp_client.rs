use super::{HttpClient, HttpConfig, HttpError, HttpResponse, HttpResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

/// HTTP client built on ehttp, usable in WASM and native builds without tokio.
///
/// ehttp applies no client-side timeout; `HttpConfig::timeout` is only used
/// when reporting timeouts raised by the platform.
pub struct EhttpClient {
    config: HttpConfig,
}

#[derive(Default)]
struct RequestState {
    result: Option<HttpResult<HttpResponse>>,
    waker: Option<Waker>,
}

/// Resolves once ehttp invokes its completion callback
struct PendingRequest {
    state: Arc<Mutex<RequestState>>,
}

impl Future for PendingRequest {
    type Output = HttpResult<HttpResponse>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl EhttpClient {
    /// Create a new ehttp client with default configuration
    pub fn new() -> Self {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new ehttp client with custom configuration
    pub fn with_config(config: HttpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// ehttp reports failures as plain strings
    fn convert_error(error: String, timeout_seconds: u64) -> HttpError {
        let lowered = error.to_lowercase();
        if lowered.contains("timeout") || lowered.contains("timed out") {
            HttpError::Timeout {
                seconds: timeout_seconds,
            }
        } else if lowered.contains("connection") {
            HttpError::Network { message: error }
        } else {
            HttpError::RequestFailed { message: error }
        }
    }

    fn convert_response(response: ehttp::Response) -> HttpResult<HttpResponse> {
        let status = response.status as u16;

        let mut headers = HashMap::new();
        for (key, value) in response.headers {
            headers.insert(key, value);
        }

        let body = String::from_utf8(response.bytes).map_err(|e| HttpError::RequestFailed {
            message: format!("Failed to decode response body as UTF-8: {}", e),
        })?;

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }

    fn build_headers(&self, content_type: Option<&str>) -> ehttp::Headers {
        let mut headers = ehttp::Headers::default();

        for (key, value) in &self.config.default_headers {
            headers.insert(key.clone(), value.clone());
        }
        headers.insert("User-Agent".to_string(), self.config.user_agent.clone());

        if let Some(content_type) = content_type {
            headers.insert("Content-Type".to_string(), content_type.to_string());
        }

        headers
    }

    async fn execute_request(
        &self,
        method: &str,
        url: &str,
        headers: ehttp::Headers,
        body: Vec<u8>,
    ) -> HttpResult<HttpResponse> {
        let mut request = ehttp::Request::get(url);
        request.method = method.to_string();
        request.headers = headers;
        request.body = body;

        tracing::debug!("{} {} ({} bytes)", method, url, request.body.len());

        let timeout_seconds = self.config.timeout.as_secs();
        let state = Arc::new(Mutex::new(RequestState::default()));
        let callback_state = state.clone();

        ehttp::fetch(request, move |response| {
            let result = match response {
                Ok(response) => Self::convert_response(response),
                Err(error) => Err(Self::convert_error(error, timeout_seconds)),
            };

            let mut guard = callback_state.lock().unwrap_or_else(PoisonError::into_inner);
            guard.result = Some(result);
            if let Some(waker) = guard.waker.take() {
                waker.wake();
            }
        });

        PendingRequest { state }.await
    }
}

/// `application/x-www-form-urlencoded` body
fn encode_form(form_data: &[(&str, &str)]) -> String {
    form_data
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl HttpClient for EhttpClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        let headers = self.build_headers(None);
        self.execute_request("GET", url, headers, Vec::new()).await
    }

    async fn post_form(&self, url: &str, form_data: &[(&str, &str)]) -> HttpResult<HttpResponse> {
        let body = encode_form(form_data).into_bytes();
        let headers = self.build_headers(Some("application/x-www-form-urlencoded"));
        self.execute_request("POST", url, headers, body).await
    }

    async fn post_json(&self, url: &str, json: &str) -> HttpResult<HttpResponse> {
        let headers = self.build_headers(Some("application/json"));
        self.execute_request("POST", url, headers, json.as_bytes().to_vec())
            .await
    }

    async fn test_connectivity(&self, url: &str) -> HttpResult<()> {
        let headers = self.build_headers(None);
        let response = self
            .execute_request("HEAD", url, headers, Vec::new())
            .await?;

        if response.status >= 200 && response.status < 400 {
            Ok(())
        } else {
            Err(HttpError::HttpStatus {
                status: response.status,
            })
        }
    }
}

impl Default for EhttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ehttp_client_creation() {
        let client = EhttpClient::new();
        assert_eq!(
            client.config().user_agent,
            format!("osm-map-broker/{}", env!("CARGO_PKG_VERSION"))
        );
        assert_eq!(client.config().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_ehttp_client_with_config() {
        let config = HttpConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_user_agent("test-agent")
            .with_header("X-Test", "value");

        let client = EhttpClient::with_config(config);
        assert_eq!(client.config().timeout, Duration::from_secs(30));
        assert_eq!(client.config().user_agent, "test-agent");
        assert_eq!(
            client.config().default_headers.get("X-Test"),
            Some(&"value".to_string())
        );
    }

    #[test]
    fn test_encode_form() {
        let body = encode_form(&[("data", "[out:json];node(1,2,3,4);out;"), ("x", "a b")]);
        assert_eq!(
            body,
            "data=%5Bout%3Ajson%5D%3Bnode%281%2C2%2C3%2C4%29%3Bout%3B&x=a%20b"
        );
    }

    #[test]
    fn test_convert_error() {
        let timeout_error = EhttpClient::convert_error("Request timeout".to_string(), 60);
        assert_eq!(timeout_error, HttpError::Timeout { seconds: 60 });

        let connection_error = EhttpClient::convert_error("Connection refused".to_string(), 60);
        assert!(matches!(connection_error, HttpError::Network { .. }));

        let generic_error = EhttpClient::convert_error("Something went wrong".to_string(), 60);
        assert!(matches!(generic_error, HttpError::RequestFailed { .. }));
    }

    #[test]
    fn test_convert_response() {
        let mut headers = ehttp::Headers::default();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let ehttp_response = ehttp::Response {
            url: "https://example.com".to_string(),
            ok: true,
            status: 200,
            status_text: "OK".to_string(),
            headers,
            bytes: b"{\"elements\": []}".to_vec(),
        };

        let response = EhttpClient::convert_response(ehttp_response).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"elements\": []}");
        assert_eq!(
            response.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
    }
}
