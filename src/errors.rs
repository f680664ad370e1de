use chrono::{DateTime, Utc};
use failure::{Context, Error as FailureError, Fail};
use tokio_postgres::error::SqlState;
use validator::ValidationErrors;

/// Business-level error kinds. Services attach one of these as context to
/// whatever went wrong, the controller maps it to an HTTP status.
#[derive(Clone, Debug, Fail, PartialEq)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error")]
    Validate(ValidationErrors),
    #[fail(display = "Authentication required")]
    Unauthorized,
    #[fail(display = "Forbidden")]
    Forbidden,
    #[fail(display = "Invalid email or password")]
    InvalidCredentials,
    #[fail(display = "Account locked until {}", _0)]
    AccountLocked(DateTime<Utc>),
    #[fail(display = "Conflict")]
    Conflict,
    #[fail(display = "Status transition is not allowed")]
    InvalidTransition,
    #[fail(display = "Time slot is fully booked")]
    SlotFull,
    #[fail(display = "Delivery address is outside of the service area")]
    OutOfServiceArea,
    #[fail(display = "Missing price information")]
    MissingPrice,
    #[fail(display = "{}", _0)]
    Payment(String),
    #[fail(display = "Server is refusing to fullfil the request")]
    Connection,
    #[fail(display = "Http client error")]
    HttpClient,
}

/// Finds the first business error kind in the chain of causes.
pub fn error_kind(e: &FailureError) -> Option<Error> {
    e.iter_chain().find_map(|cause| {
        cause
            .downcast_ref::<Error>()
            .cloned()
            .or_else(|| cause.downcast_ref::<Context<Error>>().map(|ctx| ctx.get_context().clone()))
            .or_else(|| {
                cause.downcast_ref::<RepoError>().and_then(|e| match e {
                    RepoError::NotFound => Some(Error::NotFound),
                    RepoError::Conflict { .. } => Some(Error::Conflict),
                    _ => None,
                })
            })
    })
}

#[derive(Debug, Fail)]
pub enum RepoError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Conflict: {}", reason)]
    Conflict { reason: String },
    #[fail(display = "Parse: {}", reason)]
    Parse { reason: String },
    #[fail(display = "Connection: {}", reason)]
    Connection { reason: String },
}

impl From<tokio_postgres::Error> for RepoError {
    fn from(v: tokio_postgres::Error) -> Self {
        match v.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION || *code == SqlState::CHECK_VIOLATION => RepoError::Conflict {
                reason: format!("{}", v),
            },
            _ => RepoError::Connection {
                reason: format!("{}", v),
            },
        }
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for RepoError {
    fn from(v: bb8::RunError<tokio_postgres::Error>) -> Self {
        match v {
            bb8::RunError::User(e) => RepoError::from(e),
            bb8::RunError::TimedOut => RepoError::Connection {
                reason: "Timed out waiting for a database connection".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_kind_behind_context() {
        let e: FailureError = format_err!("slot 4 is full").context(Error::SlotFull).into();
        assert_eq!(error_kind(&e), Some(Error::SlotFull));
    }

    #[test]
    fn maps_repo_not_found() {
        let e: FailureError = RepoError::NotFound.into();
        assert_eq!(error_kind(&e), Some(Error::NotFound));
    }

    #[test]
    fn unknown_errors_have_no_kind() {
        let e: FailureError = format_err!("boom");
        assert_eq!(error_kind(&e), None);
    }
}
