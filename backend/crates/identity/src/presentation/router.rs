//! Identity Router

use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use platform::mail::{MailTransport, Mailer};

use crate::domain::repository::IdentityRepository;
use crate::error::IdentityError;
use crate::infra::postgres::PgIdentityRepository;
use crate::presentation::handlers::{self, IdentityAppState};
use crate::presentation::middleware::{
    authenticate, rate_limit, require_authentication, track_metrics,
};

/// Create the identity router with the PostgreSQL repository
pub fn identity_router(
    state: IdentityAppState<PgIdentityRepository, Mailer>,
    trusted_origins: &[String],
) -> Router {
    identity_router_generic(state, trusted_origins)
}

/// Create the identity router for any repository and mail transport
///
/// Layers, outermost first: trace, metrics, CORS, panic recovery,
/// rate limit, authenticate. Routes that need a signed-in caller add
/// `require_authentication` on top.
pub fn identity_router_generic<R, M>(
    state: IdentityAppState<R, M>,
    trusted_origins: &[String],
) -> Router
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let protected = Router::new()
        .route(
            "/tokens/verification/email-change",
            post(handlers::request_email_change_token::<R, M>),
        )
        .route(
            "/users/me",
            get(handlers::show_current_user).put(handlers::update_current_user::<R, M>),
        )
        .route_layer(middleware::from_fn(require_authentication));

    let api = Router::new()
        .route("/healthcheck", get(handlers::healthcheck::<R, M>))
        .route(
            "/tokens/authentication",
            post(handlers::create_authentication_token::<R, M>),
        )
        .route(
            "/tokens/verification/registration",
            post(handlers::request_registration_token::<R, M>),
        )
        .route(
            "/tokens/verification/password-reset",
            post(handlers::request_password_reset_token::<R, M>),
        )
        .route("/users", post(handlers::register_user::<R, M>))
        .route("/users/password", put(handlers::reset_password::<R, M>))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .route("/debug/metrics", get(handlers::metrics_report::<R, M>))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate::<R, M>,
        ))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(trusted_origins))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());

    IdentityError::Internal(format!("handler panicked: {message}")).into_response()
}
