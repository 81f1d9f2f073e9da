//! MicroMarket is a small product catalog API with per-user favorites.

#![forbid(unsafe_code)]
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
mod middleware;
pub mod product;
mod router;
pub mod seed;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::crypto::PasswordManager;
use crate::database::Store;
use crate::product::ProductService;
use crate::token::TokenManager;
use crate::user::{FavoriteService, UserService};

pub use error::ServerError;

const JWT_SECRET: &str = "JWT_SECRET";

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub products: ProductService,
    pub favorites: FavoriteService,
    pub users: UserService,
    pub token: TokenManager,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire services on top of `store`.
    pub fn new(
        config: Arc<config::Configuration>,
        store: Store,
        pwd: PasswordManager,
        token: TokenManager,
    ) -> Self {
        Self {
            products: ProductService::new(
                Arc::clone(&store.products),
                config.catalog.clone(),
            ),
            favorites: FavoriteService::new(
                Arc::clone(&store.users),
                Arc::clone(&store.products),
            ),
            users: UserService::new(store.users, Arc::new(pwd)),
            token,
            metrics: None,
            config,
        }
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /metrics` goes to Prometheus exposition.
        .route("/metrics", get(router::status::metrics))
        .nest("/auth", router::auth::router())
        .nest("/products", router::products::router(state.clone()))
        // Nested `/` does not match `/products/`.
        .route("/products/", router::products::index(&state))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let store = match config.postgres {
        Some(ref postgres) => {
            let db = database::Database::new(
                &postgres.address,
                postgres
                    .username
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                postgres
                    .password
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                postgres
                    .database
                    .as_deref()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME),
                postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?;

            // execute migrations scripts on start.
            db.migrate().await?;
            Store::postgres(&db)
        },
        None => {
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file, data is kept in memory"
            );
            Store::memory()
        },
    };

    let pwd = PasswordManager::new(config.argon2.clone())?;

    // handle jwt.
    let secret = match &config.token.secret {
        Some(secret) => secret.clone(),
        None => std::env::var(JWT_SECRET)
            .map_err(|_| format!("missing `token.secret` entry or `{JWT_SECRET}` variable"))?,
    };
    let mut token =
        TokenManager::new(&config.url, secret.as_bytes(), config.token.expiration);
    if let Some(audience) = &config.token.audience {
        token.audience(audience);
    }

    let mut state = AppState::new(Arc::clone(&config), store, pwd, token);
    if config.telemetry.metrics {
        state.metrics = Some(telemetry::setup_metrics_recorder()?);
    }

    Ok(state)
}

/// Password used by [`test_user`].
#[cfg(test)]
pub const TEST_PASSWORD: &str = "password123";

/// In-memory state with cheap password hashing.
/// MUST NEVER be used in production.
#[cfg(test)]
pub fn test_state() -> AppState {
    let config = Arc::new(config::Configuration::default());
    let token = TokenManager::new(&config.url, b"test-secret", config.token.expiration);
    let pwd = PasswordManager::new(Some(crypto::fast_params()))
        .expect("valid argon2 parameters");

    AppState::new(config, Store::memory(), pwd, token)
}

/// Register a user and sign a token for it.
#[cfg(test)]
pub async fn test_user(
    state: &AppState,
    username: &str,
    is_admin: bool,
) -> (user::User, String) {
    let user = state
        .users
        .register(username, TEST_PASSWORD, is_admin)
        .await
        .expect("cannot register user");
    let token = state
        .token
        .create(&user.id.to_string())
        .expect("cannot create JWT");

    (user, token)
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}
