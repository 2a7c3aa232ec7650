use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, status::Custom};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;

use crate::guard::VoteRejection;

/// Failures reported by an [`ElectionStore`](crate::store::ElectionStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate value violates a unique constraint: {0}")]
    UniqueViolation(String),

    #[error("referenced row does not exist: {0}")]
    ForeignKeyViolation(String),

    #[error("record not found")]
    NotFound,

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Backend(String),
}

impl From<DieselError> for StoreError {
    fn from(error: DieselError) -> Self {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::ForeignKeyViolation(info.message().to_string())
            }
            DieselError::NotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::PreconditionFailed(_) => Status::PreconditionFailed,
            ApiError::Unprocessable(_) => Status::UnprocessableEntity,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ApiError::NotFound(error.to_string()),
            StoreError::UniqueViolation(_) => ApiError::Conflict(error.to_string()),
            StoreError::ForeignKeyViolation(_) => ApiError::Unprocessable(error.to_string()),
            StoreError::Unavailable(_) | StoreError::Backend(_) => {
                ApiError::Internal(error.to_string())
            }
        }
    }
}

impl From<VoteRejection> for ApiError {
    fn from(rejection: VoteRejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            VoteRejection::AlreadyVoted => ApiError::Conflict(message),
            VoteRejection::SchoolNotFound => ApiError::NotFound(message),
            VoteRejection::VotingClosed => ApiError::PreconditionFailed(message),
            VoteRejection::ReferenceNotFound => ApiError::Unprocessable(message),
            VoteRejection::Store(_) => ApiError::Internal(message),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        Custom(self.status(), Json(ErrorBody { error: self.to_string() })).respond_to(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_constraint_violations() {
        let unique = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("Duplicate entry 'abc' for key 'uq_votes_fingerprint'".to_string()),
        );
        assert!(matches!(StoreError::from(unique), StoreError::UniqueViolation(m) if m.contains("uq_votes_fingerprint")));

        let foreign = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new("Cannot add or update a child row".to_string()),
        );
        assert!(matches!(StoreError::from(foreign), StoreError::ForeignKeyViolation(_)));

        assert_eq!(StoreError::from(DieselError::NotFound), StoreError::NotFound);
        assert!(matches!(
            StoreError::from(DieselError::RollbackTransaction),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn vote_rejections_map_to_distinct_statuses() {
        assert_eq!(ApiError::from(VoteRejection::AlreadyVoted).status(), Status::Conflict);
        assert_eq!(ApiError::from(VoteRejection::SchoolNotFound).status(), Status::NotFound);
        assert_eq!(
            ApiError::from(VoteRejection::VotingClosed).status(),
            Status::PreconditionFailed
        );
        assert_eq!(
            ApiError::from(VoteRejection::ReferenceNotFound).status(),
            Status::UnprocessableEntity
        );
        let other = ApiError::from(VoteRejection::Store("disk full".into()));
        assert_eq!(other.status(), Status::InternalServerError);
        assert_eq!(other.to_string(), "disk full");
    }
}
