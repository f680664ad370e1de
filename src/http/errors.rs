use std::fmt;

use failure::Error as FailureError;
use hyper::StatusCode;
use serde_json::Value;

use crate::errors::{error_kind, Error};

#[derive(Debug)]
pub enum ControllerError {
    NotFound,
    BadRequest(FailureError),
    Unauthorized(FailureError),
    Forbidden(FailureError),
    Conflict(FailureError),
    UnprocessableEntity(FailureError),
    PaymentRequired(FailureError),
    BadGateway(FailureError),
    InternalServerError(FailureError),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ControllerError {
    pub fn code(&self) -> StatusCode {
        use self::ControllerError::*;

        match self {
            NotFound => StatusCode::NOT_FOUND,
            BadRequest(_) => StatusCode::BAD_REQUEST,
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Forbidden(_) => StatusCode::FORBIDDEN,
            Conflict(_) => StatusCode::CONFLICT,
            UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            BadGateway(_) => StatusCode::BAD_GATEWAY,
            InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn inner(&self) -> Option<&FailureError> {
        use self::ControllerError::*;

        match self {
            NotFound => None,
            BadRequest(e) | Unauthorized(e) | Forbidden(e) | Conflict(e) | UnprocessableEntity(e) | PaymentRequired(e) | BadGateway(e)
            | InternalServerError(e) => Some(e),
        }
    }

    pub fn to_message(&self) -> ErrorMessage {
        let kind = self.inner().and_then(error_kind);
        let description = match (self, &kind) {
            (ControllerError::NotFound, _) => "Not found".to_string(),
            (ControllerError::InternalServerError(_), _) => "Internal server error".to_string(),
            (_, Some(kind)) => kind.to_string(),
            (_, None) => self.inner().map(|e| e.to_string()).unwrap_or_default(),
        };
        let payload = match kind {
            Some(Error::Validate(errors)) => serde_json::to_value(errors).ok(),
            _ => None,
        };

        ErrorMessage {
            code: self.code().as_u16(),
            description,
            payload,
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner() {
            Some(e) => write!(f, "{}: {}", self.code(), e),
            None => write!(f, "{}", self.code()),
        }
    }
}

impl From<FailureError> for ControllerError {
    fn from(e: FailureError) -> Self {
        use crate::errors::Error::*;

        match error_kind(&e) {
            Some(NotFound) => ControllerError::NotFound,
            Some(Parse) => ControllerError::BadRequest(e),
            Some(Validate(_)) | Some(OutOfServiceArea) | Some(MissingPrice) => ControllerError::UnprocessableEntity(e),
            Some(Unauthorized) | Some(InvalidCredentials) | Some(AccountLocked(_)) => ControllerError::Unauthorized(e),
            Some(Forbidden) => ControllerError::Forbidden(e),
            Some(Conflict) | Some(InvalidTransition) | Some(SlotFull) => ControllerError::Conflict(e),
            Some(Payment(_)) => ControllerError::PaymentRequired(e),
            Some(HttpClient) => ControllerError::BadGateway(e),
            Some(Connection) | None => ControllerError::InternalServerError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    #[test]
    fn validation_errors_carry_field_payload() {
        let mut errors = ValidationErrors::new();
        errors.add("email", ValidationError::new("email"));
        let e = ControllerError::from(FailureError::from(Error::Validate(errors)));

        assert_eq!(e.code(), StatusCode::UNPROCESSABLE_ENTITY);
        let message = e.to_message();
        assert_eq!(message.code, 422);
        assert!(message.payload.unwrap().get("email").is_some());
    }

    #[test]
    fn payment_errors_are_verbatim() {
        let e = ControllerError::from(FailureError::from(Error::Payment("Your card was declined.".to_string())));

        assert_eq!(e.code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(e.to_message().description, "Your card was declined.");
    }

    #[test]
    fn internal_errors_hide_details() {
        let cause: FailureError = format_err!("password=hunter2").context(Error::Connection).into();
        let e = ControllerError::from(cause);

        assert_eq!(e.code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_message().description, "Internal server error");
    }
}
