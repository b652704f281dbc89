//! Error handler for identa.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
///
/// Every domain rule violation carries its own variant so callers
/// always receive a distinct, stable code.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SqlxError),

    #[error("login is already in use")]
    LoginInUse,

    #[error("email is already in use")]
    EmailInUse,

    #[error("email has already been confirmed")]
    AlreadyConfirmed,

    #[error("confirmation code is invalid")]
    InvalidConfirmationCode,

    #[error("wrong credentials")]
    WrongCredentials,

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("access denied")]
    AccessDenied,

    #[error("user not found")]
    NotFound,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Internal failure with an attributable cause.
    pub fn internal<E>(details: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Internal failure with no underlying error value, used when an
    /// invariant the rest of the system relies on turns out broken.
    pub fn inconsistency(details: impl Into<String>) -> Self {
        Self::Internal {
            details: details.into(),
            source: None,
        }
    }

    /// Stable machine-readable code exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Axum(_) => "INVALID_BODY",
            Self::LoginInUse => "LOGIN_IN_USE",
            Self::EmailInUse => "EMAIL_IN_USE",
            Self::AlreadyConfirmed => "ALREADY_CONFIRMED",
            Self::InvalidConfirmationCode => "CONFIRMATION_CODE_IS_INVALID",
            Self::WrongCredentials => "WRONG_CREDENTIALS",
            Self::Unauthorized => "UNAUTHENTICATED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Sql(_) | Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    code: &'static str,
    title: String,
    status: u16,
    detail: String,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update stable error code.
    pub fn code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .code(self.code())
            .details(&self.to_string());

        let response = match &self {
            ServerError::Validation(validation_errors) => response
                .title("There were validation errors with your request.")
                .status(StatusCode::BAD_REQUEST)
                .errors(validation_errors),

            ServerError::Axum(_) => response
                .title("Request body could not be parsed.")
                .status(StatusCode::BAD_REQUEST),

            ServerError::LoginInUse => response
                .title("Login is already in use.")
                .status(StatusCode::CONFLICT),

            ServerError::EmailInUse => response
                .title("Email is already in use.")
                .status(StatusCode::CONFLICT),

            ServerError::AlreadyConfirmed => response
                .title("Email has already been confirmed.")
                .status(StatusCode::CONFLICT),

            ServerError::InvalidConfirmationCode => response
                .title("Confirmation code is invalid.")
                .status(StatusCode::BAD_REQUEST),

            ServerError::WrongCredentials => response
                .title("Wrong credentials.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::AccessDenied => response
                .title("Insufficient role for this operation.")
                .status(StatusCode::FORBIDDEN),

            ServerError::NotFound => response
                .title("User not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "sql request failed");

                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "code": "INTERNAL_SERVER_ERROR",
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ServerError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn conflict_kinds_map_to_conflict_status() {
        assert_eq!(status_of(ServerError::LoginInUse), StatusCode::CONFLICT);
        assert_eq!(status_of(ServerError::EmailInUse), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ServerError::AlreadyConfirmed),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn authorization_kinds_use_failure_statuses() {
        assert_eq!(
            status_of(ServerError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ServerError::WrongCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(ServerError::AccessDenied), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_user_is_not_a_server_error() {
        assert_eq!(status_of(ServerError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::NotFound.code(), "NOT_FOUND");
    }

    #[test]
    fn every_kind_has_a_non_empty_code() {
        let kinds = [
            ServerError::LoginInUse,
            ServerError::EmailInUse,
            ServerError::AlreadyConfirmed,
            ServerError::InvalidConfirmationCode,
            ServerError::WrongCredentials,
            ServerError::Unauthorized,
            ServerError::AccessDenied,
            ServerError::NotFound,
            ServerError::inconsistency("broken"),
        ];
        for kind in kinds {
            assert!(!kind.code().is_empty());
        }
    }
}
