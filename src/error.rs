//! Typed engine errors.

use thiserror::Error;

/// Every failure the engine surfaces to a caller. Storage-layer failures
/// pass through as [`EngineError::Db`]; the engine never retries them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("name already taken: {0}")]
    NameConflict(String),
    #[error("template is already published: {0}")]
    AlreadyPublished(String),
    #[error("template is not published: {0}")]
    NotPublished(String),
    #[error("template has no parameters: {0}")]
    NoParameters(String),
    #[error("invalid validation pattern: {0}")]
    InvalidPattern(String),
    #[error("related record does not exist: {0}")]
    InvalidRelation(String),
    #[error("template is referenced by a relation parameter: {0}")]
    InUseByRelation(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("file storage: {0}")]
    FileStorage(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
