//! Favorites of the acting user.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::product::Product;
use crate::router::Message;
use crate::user::User;

const FAVORITE_ADDED: &str = "Product added to favorites";
const FAVORITE_REMOVED: &str = "Product removed from favorites";

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.favorites.list(user.id).await?))
}

pub async fn add(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Message>> {
    state.favorites.add(user.id, &id).await?;
    Ok(Json(FAVORITE_ADDED.into()))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Message>> {
    state.favorites.remove(user.id, &id).await?;
    Ok(Json(FAVORITE_REMOVED.into()))
}
