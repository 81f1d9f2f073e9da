//! Product catalog routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, get, post, put};
use axum::{Extension, Json, Router};

use crate::error::Result;
use crate::product::{NewProduct, Pagination, Product, ProductChanges, ProductPage};
use crate::router::{Message, Valid, favorites};
use crate::user::User;
use crate::{AppState, middleware};

const PRODUCT_REMOVED: &str = "Product removed";

/// Listing query. Every value is kept as text so malformed numbers fall
/// back to defaults instead of rejecting the request.
#[derive(Debug, Default, PartialEq)]
pub struct ListQuery {
    keyword: Option<String>,
    page_number: Option<String>,
    page_size: Option<String>,
}

impl FromIterator<(String, String)> for ListQuery {
    /// First value wins when a key is repeated, unknown keys are ignored.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "keyword" => &mut query.keyword,
                "pageNumber" => &mut query.page_number,
                "pageSize" => &mut query.page_size,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

fn number(value: Option<&str>) -> Option<i64> {
    value.and_then(|value| value.trim().parse::<i64>().ok())
}

fn signed(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), middleware::auth))
}

// Admin check reads the user set by `auth`, so `auth` must wrap it.
fn admin(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    signed(
        state,
        route.route_layer(from_fn_with_state(state.clone(), middleware::admin)),
    )
}

/// `GET /products` goes to `list`, `POST /products` to `create`.
pub fn index(state: &AppState) -> MethodRouter<AppState> {
    get(list).merge(admin(state, post(create)))
}

/// `/products` routes.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", index(&state))
        // `GET /products/favorites`. Authorization required.
        .route("/favorites", signed(&state, get(favorites::list)))
        .route(
            "/{id}",
            get(get_product).merge(admin(&state, put(update).delete(delete))),
        )
        // `POST` and `DELETE /products/{id}/favorite`. Authorization required.
        .route(
            "/{id}/favorite",
            signed(&state, post(favorites::add).delete(favorites::remove)),
        )
}

/// List one page of products.
pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ProductPage>> {
    let query = pairs.into_iter().collect::<ListQuery>();
    let pagination = Pagination::new(
        number(query.page_number.as_deref()),
        number(query.page_size.as_deref()),
        state.products.catalog(),
    );

    Ok(Json(
        state
            .products
            .list(query.keyword.as_deref(), pagination)
            .await?,
    ))
}

/// Get a single product.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.products.get(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.products.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<User>,
    Valid(body): Valid<ProductChanges>,
) -> Result<Json<Product>> {
    Ok(Json(state.products.update(&id, user.id, body).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Message>> {
    state.products.delete(&id, user.id).await?;
    Ok(Json(PRODUCT_REMOVED.into()))
}
