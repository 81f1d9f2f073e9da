//! Error handler for micromarket.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, ServerError>;

pub const PRODUCT_NOT_FOUND: &str = "Product not found";
pub const USER_NOT_FOUND: &str = "User not found";
pub const ALREADY_FAVORITED: &str = "Product already favorited";
pub const USER_EXISTS: &str = "User already exists";
pub const NO_TOKEN: &str = "Not authorized, no token";
pub const TOKEN_FAILED: &str = "Not authorized, token failed";
pub const NOT_ADMIN: &str = "Not authorized as an admin";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error("{0}")]
    NotFound(&'static str),

    /// Acting user is not the owner of the resource.
    #[error("User not authorized")]
    Forbidden,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("cannot sign token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl ServerError {
    /// HTTP status attached to the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            // Ownership failures reuse 401, like the shop clients expect.
            ServerError::Forbidden
            | ServerError::Unauthorized(_)
            | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::Sql(_)
            | ServerError::Token(_)
            | ServerError::Crypto(_)
            | ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(skip)]
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `message` field.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.into();
        self
    }

    /// Automatically add errors field.
    ///
    /// The first field message also becomes the top-level message.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        let errors = parse_validation_errors(errors);
        if let Some(first) = errors.first() {
            self.message = first.message.clone();
        }
        self.errors = Some(errors);
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
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
            message: "Internal server error".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect::<Vec<_>>();
    // HashMap order is random.
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = ResponseError::default().status(status);

        let response = match &self {
            ServerError::Validation(validation_errors) => response
                .message("There were validation errors with your request.")
                .errors(validation_errors),

            ServerError::Json(rejection) => response.message(&rejection.body_text()),

            ServerError::Sql(_)
            | ServerError::Token(_)
            | ServerError::Crypto(_)
            | ServerError::Internal { .. } => {
                tracing::error!(error = %self, "server returned 500 status");
                response
            },

            _ => response.message(&self.to_string()),
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
            serde_json::json!({ "message": "Internal server error" })
                .to_string()
                .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
