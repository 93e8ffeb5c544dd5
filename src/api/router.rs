use crate::api::handlers;
use crate::api::state::ApiState;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn create_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route(
            "/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        .route("/cycle/items", post(handlers::add_cycle_item))
        .route("/cycle/items/:id", delete(handlers::delete_cycle_item))
        .route("/cycle/items/:id/toggle", post(handlers::toggle_cycle_item))
        .route("/cycle/reorder", post(handlers::reorder_cycle_items))
        .route("/timer", get(handlers::get_timer))
        .route("/timer/action", post(handlers::timer_action))
        .route("/timer/settings", post(handlers::update_timer_settings))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_bearer,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
