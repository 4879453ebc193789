use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Upstream resource fetched for an address submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Transactions,
    Utxos,
    Prices,
}

impl Resource {
    /// Message shown to the user when this resource cannot be fetched
    pub fn failure_message(&self) -> &'static str {
        match self {
            Resource::Transactions => {
                "Failed to fetch transaction data. Please check the address and try again."
            }
            Resource::Utxos => {
                "Failed to fetch UTXO data. The address may be invalid or have no unspent outputs."
            }
            Resource::Prices => "Failed to fetch pricing data. Please try again later.",
        }
    }
}

/// Errors from the block explorer client
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("{resource:?} request returned HTTP {status}")]
    Status { resource: Resource, status: u16 },
    #[error("{resource:?} request failed: {message}")]
    Network { resource: Resource, message: String },
    #[error("{resource:?} response parse failed: {message}")]
    Parse { resource: Resource, message: String },
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("{}", .0.failure_message())]
    UpstreamFetch(Resource),
    #[error("An unexpected error occurred.")]
    Unexpected(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Email address is required.")]
    EmailRequired,
    #[error("Incorrect Email Address")]
    EmailNotAllowed,
    #[error("Please wait {seconds} seconds before requesting another link.")]
    ResendCooldown { seconds: u64 },
    #[error("Sign-in link is invalid or has expired.")]
    InvalidToken,
    #[error("Not signed in")]
    Unauthorized,
    #[error("Superseded by a newer address submission.")]
    Superseded,
}

pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WatchError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            WatchError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WatchError::InvalidRequest(_) | WatchError::EmailRequired => StatusCode::BAD_REQUEST,
            WatchError::EmailNotAllowed => StatusCode::FORBIDDEN,
            WatchError::ResendCooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
            WatchError::InvalidToken | WatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            WatchError::Superseded => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for WatchError {
    fn into_response(self) -> Response {
        if let WatchError::Unexpected(detail) = &self {
            tracing::error!("Unexpected error: {}", detail);
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (self.status_code(), body).into_response()
    }
}

// ExplorerError to WatchError conversion implementation.
// Only a non-success HTTP status carries the resource-specific message.
impl From<ExplorerError> for WatchError {
    fn from(err: ExplorerError) -> Self {
        match err {
            ExplorerError::Status { resource, .. } => WatchError::UpstreamFetch(resource),
            _ => WatchError::Unexpected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_failures_map_to_resource_message() {
        let err: WatchError = ExplorerError::Status {
            resource: Resource::Utxos,
            status: 400,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Failed to fetch UTXO data. The address may be invalid or have no unspent outputs."
        );
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_transport_failures_are_generic() {
        let err: WatchError = ExplorerError::Network {
            resource: Resource::Transactions,
            message: "connection reset".into(),
        }
        .into();
        assert_eq!(err.to_string(), "An unexpected error occurred.");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: WatchError = ExplorerError::Client("no TLS backend".into()).into();
        assert!(matches!(err, WatchError::Unexpected(ref detail) if detail.contains("no TLS backend")));
    }

    #[test]
    fn test_parse_failures_are_generic() {
        let err: WatchError = ExplorerError::Parse {
            resource: Resource::Prices,
            message: "missing field `USD`".into(),
        }
        .into();
        assert_eq!(err.to_string(), "An unexpected error occurred.");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
