pub mod auth;
pub mod books;
pub mod feed;
pub mod notes;
pub mod social;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full API router. Shared with integration tests.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(books::router())
        .merge(feed::router())
        .merge(notes::router())
        .merge(social::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
