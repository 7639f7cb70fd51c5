use super::{HttpClient, HttpConfig, HttpError, HttpResponse, HttpResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// reqwest-based HTTP client for native builds
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout_seconds: u64,
}

impl ReqwestClient {
    /// Create a new reqwest client with default configuration
    pub fn new() -> HttpResult<Self> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new reqwest client with custom configuration
    pub fn with_config(config: HttpConfig) -> HttpResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);

        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(config.timeout);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.default_headers {
            let header_name =
                reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    HttpError::RequestFailed {
                        message: format!("Invalid header name '{}': {}", key, e),
                    }
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                HttpError::RequestFailed {
                    message: format!("Invalid header value '{}': {}", value, e),
                }
            })?;
            headers.insert(header_name, header_value);
        }

        if !headers.is_empty() {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|e| HttpError::RequestFailed {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            timeout_seconds: config.timeout.as_secs(),
        })
    }

    fn convert_error(&self, err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if err.is_connect() {
            HttpError::Network {
                message: format!("Connection failed: {}", err),
            }
        } else if let Some(status) = err.status() {
            HttpError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            HttpError::RequestFailed {
                message: err.to_string(),
            }
        }
    }

    async fn convert_response(&self, response: reqwest::Response) -> HttpResult<HttpResponse> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.to_string(), value_str.to_string());
            }
        }

        let body = response.text().await.map_err(|e| self.convert_error(e))?;

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        self.convert_response(response).await
    }

    async fn post_form(&self, url: &str, form_data: &[(&str, &str)]) -> HttpResult<HttpResponse> {
        tracing::debug!("POST {} (form data with {} fields)", url, form_data.len());

        let response = self
            .client
            .post(url)
            .form(form_data)
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        self.convert_response(response).await
    }

    async fn post_json(&self, url: &str, json: &str) -> HttpResult<HttpResponse> {
        tracing::debug!("POST {} (JSON, {} bytes)", url, json.len());

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(json.to_string())
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        self.convert_response(response).await
    }

    async fn test_connectivity(&self, url: &str) -> HttpResult<()> {
        tracing::debug!("Testing connectivity to {}", url);

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(HttpError::HttpStatus {
                status: response.status().as_u16(),
            })
        }
    }
}
