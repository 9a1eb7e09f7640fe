use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handler::*, middleware::api_gateway, AppState};

/// Every `/api` route sits behind the gateway, including the router's own
/// 405 fallback, so anonymous callers see 401 whatever the verb.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:hashid",
            get(get_task)
                .put(update_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .route("/tasks/:hashid/complete", post(mark_task_complete))
        .route("/tasks/:hashid/current", post(mark_task_current))
        .route(
            "/tasks/:hashid/notes",
            get(get_task_notes)
                .put(update_task_notes)
                .patch(update_task_notes),
        )
        .layer(from_fn_with_state(app_state.clone(), api_gateway));

    Router::new()
        .route("/", get(health_checker_handler))
        .nest("/api", api)
        .with_state(app_state)
}

pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
}

pub fn create_app(app_state: Arc<AppState>, cors_origin: HeaderValue) -> Router {
    create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}
