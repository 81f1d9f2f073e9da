//! HTTP API.
pub mod auth;
mod favorites;
pub mod products;
pub mod status;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ServerError;

/// JSON body checked with [`Validate`] before reaching the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Plain `{message}` body.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl From<&str> for Message {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}
