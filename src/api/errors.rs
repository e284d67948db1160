use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::powermetrics::{
    decode::DecodeError, service::IngestError, validation::ValidationError,
};

/// Every way a request can fail. This is the only place that decides the
/// HTTP status for an error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(DecodeError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(DecodeError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Decode(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Ingest(IngestError::DuplicateSubmission { .. }) => StatusCode::BAD_REQUEST,
            Self::Ingest(IngestError::StoreUnavailable(_) | IngestError::StoreWriteFailed(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server faults are logged in full; the client only sees the status text.
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, detail = ?self, "Request failed");
            let reason = status.canonical_reason().unwrap_or("Internal Server Error");
            return (status, reason).into_response();
        }

        debug!(status = status.as_u16(), error = %self, "Request rejected");
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;

    #[test]
    fn client_errors_are_4xx() {
        let cases = [
            AppError::from(DecodeError::EmptyBody),
            AppError::from(DecodeError::UnknownField("extra".into())),
            AppError::from(DecodeError::MissingField("tasks".into())),
            AppError::from(DecodeError::DuplicateField("pc_id".into())),
            AppError::from(DecodeError::MalformedSyntax(3)),
            AppError::from(DecodeError::TrailingData),
            AppError::from(DecodeError::TypeMismatch {
                field: "combined_power".into(),
                offset: 7,
            }),
            AppError::from(ValidationError::NoTasks),
        ];
        for err in cases {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{err}");
        }
        assert_eq!(
            AppError::from(DecodeError::PayloadTooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn duplicate_is_a_bad_request() {
        let err = AppError::from(IngestError::DuplicateSubmission {
            pc_id: "pc-1".into(),
            start_time: crate::powermetrics::timestamp::Timestamp::decode("2024-01-01 00:00:00")
                .unwrap(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_and_internal_errors_are_500() {
        let cases = [
            AppError::from(DecodeError::Internal("boom".into())),
            AppError::from(IngestError::StoreUnavailable(StoreError::Backend("down".into()))),
            AppError::from(IngestError::StoreWriteFailed(StoreError::Backend("disk".into()))),
        ];
        for err in cases {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR, "{err}");
        }
    }
}
