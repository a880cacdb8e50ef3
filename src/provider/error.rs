//! Error types for the enrichment provider client.

use std::time::Duration;
use thiserror::Error;

/// Additional context from provider errors for diagnosis.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Endpoint the failing request was sent to.
    pub endpoint: Option<String>,
    /// Request ID from the provider (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that can occur when fetching enrichment data.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success status from the provider. 5xx responses are retryable,
    /// auth/rate-limit rejections are not.
    #[error("provider rejected request: {message}")]
    Rejected {
        message: String,
        retryable: bool,
        context: ErrorContext,
    },

    /// Response arrived but did not have the expected shape for the query.
    #[error("unexpected response shape: {message}")]
    InvalidResponse {
        message: String,
        context: ErrorContext,
    },

    /// Request timed out - retryable.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    /// HTTP/network error (unreachable host, TLS handshake failure).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (missing credentials, bad certificate, etc.).
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache layer failure surfaced through the client.
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),

    /// Address failed required-field validation at the client boundary.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl ProviderError {
    /// Create a rejection error from an HTTP status.
    pub fn rejected(message: impl Into<String>, retryable: bool, context: ErrorContext) -> Self {
        Self::Rejected {
            message: message.into(),
            retryable,
            context,
        }
    }

    /// Create an invalid-response error.
    pub fn invalid_response(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            context,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the failed request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected { retryable, .. } => *retryable,
            Self::InvalidResponse { .. } => false,
            Self::Timeout(_, _) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Config(_) => false,
            Self::Cache(_) => false,
            Self::InvalidAddress(_) => false,
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Timeout(_, _) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
            Self::Cache(_) => "cache_error",
            Self::InvalidAddress(_) => "invalid_address",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Rejected { context, .. } => Some(context),
            Self::InvalidResponse { context, .. } => Some(context),
            Self::Timeout(_, context) => context.as_ref(),
            Self::Http(_) => None,
            Self::Config(_) => None,
            Self::Cache(_) => None,
            Self::InvalidAddress(_) => None,
        }
    }

    /// HTTP status from the context, if one was recorded.
    pub fn http_status(&self) -> Option<u16> {
        self.context().and_then(|c| c.http_status)
    }
}
