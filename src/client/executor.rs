use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::auth::SharedTokenProvider;
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::notify::{Notification, SharedNotifier};

/// Internal envelope around a decoded success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Authenticated request executor.
///
/// Fetches a bearer token before every call, sends JSON, and normalizes
/// every failure into a [`ClientError`] plus exactly one error
/// notification. It never retries.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: SharedTokenProvider,
    notifier: SharedNotifier,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        tokens: SharedTokenProvider,
        notifier: SharedNotifier,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.normalized_base_url().to_string(),
            tokens,
            notifier,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn notifier(&self) -> &SharedNotifier {
        &self.notifier
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ClientError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ClientError> {
        self.request::<T, ()>(Method::DELETE, path, None).await
    }

    /// Issue one request. On failure the error is reported once through the
    /// notifier and then returned.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match self.execute(method.clone(), path, body).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(method = %method, path, error = ?e, "API request failed");
                self.notifier.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.tokens.token().await
            .map_err(|e| ClientError::Authentication(e.to_string()))?;

        let mut request = self.http
            .request(method.clone(), self.build_url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await
            .map_err(|e| ClientError::Network(format!("{} {} failed: {}", method, path, e)))?;
        let status = resp.status();
        let bytes = resp.bytes().await
            .map_err(|e| ClientError::Network(format!("Failed to read response body: {}", e)))?;

        debug!(method = %method, path, status = status.as_u16(), bytes = bytes.len(), "API response");

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(status, &bytes),
            });
        }

        // An empty success body (e.g. 204) decodes as JSON null.
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        let data = serde_json::from_slice(payload)
            .map_err(|e| ClientError::Decode(format!("{} {}: {}", method, path, e)))?;
        Ok(ApiResponse { data })
    }
}

/// Human-readable message for a failed response: the server's `message`
/// field when there is one, `HTTP <status>` otherwise.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
