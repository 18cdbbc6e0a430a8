use thiserror::Error;

use crate::provider::ProviderId;

pub type FetchResult<T> = Result<T, AggregationError>;

/// Failure of a provider call or of a whole aggregation cycle.
///
/// None of these are retried here; retry policy belongs to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregationError {
    #[error("invalid request to {provider}: {reason}")]
    InvalidRequest { provider: ProviderId, reason: String },

    #[error("{provider} is unreachable: {reason}")]
    ProviderUnreachable { provider: ProviderId, reason: String },

    #[error("{provider} rejected the request (HTTP {status}): {body}")]
    ProviderRejected {
        provider: ProviderId,
        /// HTTP status of the response. A provider that reports errors inside
        /// a 200 body keeps its own status text in `body`.
        status: u16,
        body: String,
    },

    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: ProviderId, reason: String },

    #[error("location '{query}' not found")]
    LocationNotFound { query: String },

    #[error("aggregation cycle was cancelled")]
    Cancelled,
}

impl AggregationError {
    pub fn invalid_request(provider: ProviderId, reason: impl ToString) -> Self {
        Self::InvalidRequest {
            provider,
            reason: reason.to_string(),
        }
    }

    pub fn unreachable(provider: ProviderId, reason: impl ToString) -> Self {
        Self::ProviderUnreachable {
            provider,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(provider: ProviderId, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Provider the failure came from, if any.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::InvalidRequest { provider, .. }
            | Self::ProviderUnreachable { provider, .. }
            | Self::ProviderRejected { provider, .. }
            | Self::MalformedResponse { provider, .. } => Some(*provider),
            Self::LocationNotFound { .. } | Self::Cancelled => None,
        }
    }
}

/// Failure of a generative-text completion.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompletionError {
    #[error("invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("completion service is unreachable: {0}")]
    Unreachable(String),

    #[error("completion service rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("completion response carried no candidate text")]
    DecodingFailed,
}
