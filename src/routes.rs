use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::auth_middleware, handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let (auth_public, auth_protected) = handlers::auth_routes();

    // Public routes (no auth required)
    let public_routes = Router::new()
        .nest("/auth", auth_public)
        .merge(handlers::plan_routes());

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .nest("/auth", auth_protected)
        .nest("/companies", handlers::tenant_routes())
        .nest("/users", handlers::account_routes())
        .nest("/permits", handlers::permit_routes())
        .nest("/incidents", handlers::incident_routes())
        .merge(handlers::overview_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let file_routes = handlers::file_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    Router::new()
        .merge(handlers::site_routes())
        .nest("/api", public_routes.merge(protected_routes))
        .nest("/files", file_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
