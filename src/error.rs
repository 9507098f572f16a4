use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::media::ObjectStoreError;
use crate::store::StoreError;

/// Errors surfaced by the attendance core to the HTTP layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The probe photo has no detectable face (or could not be read in time).
    #[error("No face detected in the submitted photo, please take another one")]
    NoFaceDetected,

    #[error("Feature extractor unavailable: {0}")]
    ExtractorUnavailable(String),

    #[error("Session {0} not found")]
    SessionNotFound(u64),

    #[error("Course {0} not found")]
    CourseNotFound(u64),

    #[error("Absence {0} not found")]
    AbsenceNotFound(u64),

    #[error("Student {0} not found")]
    StudentNotFound(u64),

    #[error("Session {0} is closed")]
    SessionClosed(u64),

    #[error("Student {student_id} is already marked absent for session {session_id}")]
    AlreadyAbsent { session_id: u64, student_id: u64 },

    /// Approval needs submitted evidence or an explicit reviewer comment.
    #[error("Absence {0} has no evidence; a comment is required to approve it")]
    NotEligible(u64),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::ExtractorUnavailable(_) | CoreError::ObjectStore(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CoreError::SessionNotFound(_)
            | CoreError::CourseNotFound(_)
            | CoreError::AbsenceNotFound(_)
            | CoreError::StudentNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::SessionClosed(_) | CoreError::AlreadyAbsent { .. } => StatusCode::CONFLICT,
            CoreError::NotEligible(_) | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            CoreError::Store(e) => {
                tracing::error!(error = %e, "Storage failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            CoreError::NoFaceDetected.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            CoreError::SessionNotFound(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CoreError::AbsenceNotFound(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CoreError::Validation("comment required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(CoreError::SessionClosed(3).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = CoreError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
