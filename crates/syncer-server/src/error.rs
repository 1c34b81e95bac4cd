//! HTTP mapping of syncer errors

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use syncer_common::SyncerError;

/// A `SyncerError` rendered as a plain-text HTTP response
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub SyncerError);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            SyncerError::ClientNotFound(_) => StatusCode::NOT_FOUND,
            SyncerError::ConfigInvalid(_) | SyncerError::InvalidPattern { .. } => {
                StatusCode::BAD_REQUEST
            }
            e if e.is_backend_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: SyncerError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(SyncerError::ClientNotFound("discovery x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(SyncerError::ConfigInvalid("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(SyncerError::DiscoveryUnavailable("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(SyncerError::SyncFailed("rejected".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(SyncerError::BackendUnsupported("consul".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_is_error_text() {
        let err = ApiError::from(SyncerError::ClientNotFound("discovery x".into()));
        assert_eq!(err.to_string(), "discovery x not found");
    }
}
