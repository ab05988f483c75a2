pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    Router,
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Auth routes
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))

        // API routes
        .nest("/api", api_routes(app_state.clone()))

        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.settings.server.max_upload_bytes + MULTIPART_OVERHEAD;

    // Browsing the catalog needs no account
    let public = Router::new()
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/categories/:id", get(handlers::catalog::get_category))
        .route("/categories/slug/:slug", get(handlers::catalog::get_category_by_slug))
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/:id", get(handlers::catalog::get_product))
        .route("/products/slug/:slug", get(handlers::catalog::get_product_by_slug))
        .route("/products/category/:slug", get(handlers::catalog::list_products_in_category));

    let protected = Router::new()
        .route(
            "/me",
            get(handlers::auth::me)
                .put(handlers::auth::update_me)
                .delete(handlers::auth::delete_me),
        )
        .route("/orders", get(handlers::orders::list_mine))
        .route("/orders", post(handlers::orders::create))
        .route("/orders/:id", get(handlers::orders::get))
        .route(
            "/payments",
            post(handlers::payments::submit_proof).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ));

    public.merge(protected)
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", get(handlers::orders::list_all))
        .route("/orders/status", put(handlers::orders::update_status))
        .route("/orders/status/:status", get(handlers::orders::list_by_status))
        // Payment verification queue
        .route("/payments/pending", get(handlers::payments::list_pending))
        .route("/payments/:id", get(handlers::payments::get))
        .route("/payments/:id/approve", post(handlers::payments::approve))
        .route("/payments/:id/reject", post(handlers::payments::reject))
        // Catalog management
        .route("/categories", post(handlers::catalog::create_category))
        .route(
            "/categories/:id",
            put(handlers::catalog::update_category).delete(handlers::catalog::delete_category),
        )
        .route("/products", post(handlers::catalog::create_product))
        .route(
            "/products/:id",
            put(handlers::catalog::update_product).delete(handlers::catalog::delete_product),
        )
        .route("/products/status/:status", get(handlers::catalog::list_products_by_status))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
