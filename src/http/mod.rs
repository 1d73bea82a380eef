use axum::http::{header, HeaderValue, Method};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;

use crate::graphql::build_schema;
use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{clear_session_cookie, session_cookie, SessionUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let schema = build_schema(state.clone());

    Router::new()
        .merge(routes::health())
        .merge(routes::graphql())
        .layer(Extension(schema))
        .layer(cors(&state.cors_origins))
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
