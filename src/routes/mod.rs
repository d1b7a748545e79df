// Route modules
pub mod courses;
pub mod enrollments;
pub mod payments;
pub mod webhooks;

use crate::{
    app_state::AppState,
    middleware::{create_rate_limiter, jwt_auth_middleware, logging_middleware},
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(state.clone()))
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: AppState) -> Router<AppState> {
    // Learner routes: authenticated and rate limited per user
    let rate_limiter =
        create_rate_limiter(state.redis.clone(), state.config.rate_limit.clone());
    let protected_routes = Router::new()
        .route("/payments", post(payments::create_payment))
        .route("/payments/{payment_id}", get(payments::get_payment))
        .route("/enrollments", post(enrollments::enroll))
        .route("/enrollments/unenroll", post(enrollments::unenroll))
        .route("/enrollments/check", get(enrollments::check_enrollment))
        .route("/courses/{course_id}/access", get(courses::course_access))
        .route_layer(middleware::from_fn(rate_limiter))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    // Gateway callbacks (no authentication, no rate limiting)
    let webhook_routes = Router::new()
        .route("/webhooks/click", post(webhooks::click_webhook))
        .route("/webhooks/payme", post(webhooks::payme_webhook));

    // x-request-id is assigned before logging and echoed on the response
    Router::new()
        .merge(protected_routes)
        .merge(webhook_routes)
        .layer(middleware::from_fn(logging_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
