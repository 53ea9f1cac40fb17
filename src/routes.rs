use crate::{auth, config::session::SessionLayer, handlers, middleware as app_middleware, AppState};
use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::SessionStore;

pub fn build_router<S>(state: AppState, session_layer: SessionLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    // Routes that act on the logged-in account
    let protected_routes = Router::new()
        .route("/verify-email", get(handlers::verify_email))
        .route(
            "/resend-verification-email",
            get(handlers::resend_verification_email),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let guest_routes = Router::new()
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route_layer(middleware::from_fn(
            auth::middleware::redirect_if_authenticated,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/sign-up",
            get(handlers::sign_up_form).post(handlers::sign_up_submit),
        )
        .route(
            "/signUp",
            get(handlers::sign_up_form).post(handlers::sign_up_submit),
        )
        .route("/verify-email-token", get(handlers::verify_email_token))
        .route("/logout", get(auth::handlers::logout_handler))
        .merge(protected_routes)
        .merge(guest_routes)
        .nest_service("/static", ServeDir::new("static"))
        .layer(session_layer)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(app_middleware::add_security_headers)),
        )
        .with_state(state)
}
