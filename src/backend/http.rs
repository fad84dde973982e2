//! HTTP implementation of the backend client boundary.

use crate::backend::{BackendClient, ClassDescriptor, MethodDescriptor, PackageDescriptor};
use crate::change::ChangeRecord;
use crate::config::{EnvironmentConfig, HttpConfig};
use crate::error::{CompilationError, GraftError, ReadError, WriteError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn build_http_client(connect_timeout: Duration, request_timeout: Duration) -> Result<Client, GraftError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| GraftError::Config(format!("Failed to create HTTP client: {}", e)))
}

// Helper function to map transport-level errors to ReadError
fn map_read_error(error: reqwest::Error) -> ReadError {
    if error.is_timeout() {
        ReadError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ReadError::Transport(format!("Connection error: {}", error))
    } else {
        ReadError::Transport(format!("HTTP error: {}", error))
    }
}

// Helper function to map transport-level errors to WriteError
fn map_write_error(error: reqwest::Error) -> WriteError {
    if error.is_timeout() {
        WriteError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        WriteError::Transport(format!("Connection error: {}", error))
    } else {
        WriteError::Transport(format!("HTTP error: {}", error))
    }
}

/// Parses a failed change submission body into the structured
/// compilation payload, when the backend returned one. Both the
/// enveloped shape `{ description, data: { suggestions, interval } }`
/// and the flat shape are accepted.
fn parse_compilation_error(body: &str) -> Option<CompilationError> {
    #[derive(serde::Deserialize)]
    struct ErrorEnvelope {
        #[serde(default)]
        description: String,
        #[serde(default)]
        data: Option<CompilationError>,
    }

    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = match envelope.data {
        Some(mut inner) => {
            if inner.description.is_empty() {
                inner.description = envelope.description;
            }
            inner
        }
        None => serde_json::from_str(body).ok()?,
    };
    // Every field is defaulted, so an unrelated JSON object also parses;
    // only treat it as a compilation payload when it says something.
    if error.description.is_empty() && !error.has_suggestions() && error.interval.is_none() {
        return None;
    }
    Some(error)
}

/// Client for an environment exposing the standard HTTP API
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, GraftError> {
        Self::with_timeouts(base_url, HTTP_CONNECT_TIMEOUT, HTTP_REQUEST_TIMEOUT)
    }

    /// Builds a client for a configured environment entry.
    pub fn from_environment(
        environment: &EnvironmentConfig,
        http: &HttpConfig,
    ) -> Result<Self, GraftError> {
        let mut backend = Self::with_timeouts(
            &environment.url,
            Duration::from_secs(http.connect_timeout_secs),
            Duration::from_secs(http.request_timeout_secs),
        )?;
        if let Some(username) = &environment.username {
            backend.credentials = Some((
                username.clone(),
                environment.password.clone().unwrap_or_default(),
            ));
        }
        Ok(backend)
    }

    fn with_timeouts(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, GraftError> {
        let url = Url::parse(base_url)
            .map_err(|e| GraftError::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(GraftError::Config(format!(
                "Backend URL cannot hold paths: {}",
                base_url
            )));
        }
        Ok(Self {
            client: build_http_client(connect_timeout, request_timeout)?,
            base_url: url,
            credentials: None,
        })
    }

    /// Joins percent-encoded path segments onto the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        not_found: impl FnOnce() -> ReadError,
    ) -> Result<T, ReadError> {
        debug!(url = %url, "Backend read");
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(map_read_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReadError::Transport(format!(
                "Request failed with status {}: {}",
                status, text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ReadError::Protocol(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn get_package(&self, name: &str) -> Result<PackageDescriptor, ReadError> {
        self.get_json(self.endpoint(&["packages", name]), || {
            ReadError::PackageNotFound(name.to_string())
        })
        .await
    }

    async fn get_class(&self, name: &str) -> Result<ClassDescriptor, ReadError> {
        self.get_json(self.endpoint(&["classes", name]), || {
            ReadError::ClassNotFound(name.to_string())
        })
        .await
    }

    async fn get_methods(
        &self,
        class: &str,
        include_metaclass: bool,
    ) -> Result<Vec<MethodDescriptor>, ReadError> {
        let mut url = self.endpoint(&["classes", class, "methods"]);
        if include_metaclass {
            url.query_pairs_mut().append_pair("all", "true");
        }
        self.get_json(url, || ReadError::ClassNotFound(class.to_string()))
            .await
    }

    async fn get_method(
        &self,
        class: &str,
        selector: &str,
    ) -> Result<MethodDescriptor, ReadError> {
        self.get_json(self.endpoint(&["classes", class, "methods", selector]), || {
            ReadError::MethodNotFound(format!("{}>>{}", class, selector))
        })
        .await
    }

    async fn apply_change(&self, record: &ChangeRecord) -> Result<ChangeRecord, WriteError> {
        let url = self.endpoint(&["changes"]);
        debug!(url = %url, change_type = %record.change_type, "Submitting change");
        let response = self
            .authorized(self.client.post(url))
            .json(record)
            .send()
            .await
            .map_err(map_write_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WriteError::TargetMissing(record.label.clone()));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match parse_compilation_error(&text) {
                Some(compilation) => WriteError::Compilation(compilation),
                None => WriteError::Transport(format!(
                    "Change rejected with status {}: {}",
                    status, text
                )),
            });
        }
        // Some backends answer with an empty body; the submitted record
        // then stands in for the echo.
        match response.json::<ChangeRecord>().await {
            Ok(echo) => Ok(echo),
            Err(_) => Ok(record.clone()),
        }
    }

    async fn export_changeset(&self, records: &[ChangeRecord]) -> Result<Vec<u8>, ReadError> {
        let url = self.endpoint(&["changesets", "download"]);
        let response = self
            .authorized(self.client.post(url))
            .json(records)
            .send()
            .await
            .map_err(map_read_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReadError::Transport(format!(
                "Export failed with status {}: {}",
                status, text
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReadError::Protocol(format!("Failed to read export payload: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
