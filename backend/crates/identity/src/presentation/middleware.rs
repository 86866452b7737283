//! Identity Middleware
//!
//! Request metrics, rate limiting, bearer-token authentication and the
//! per-route authentication guard.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;

use platform::client::client_identity;
use platform::mail::MailTransport;
use platform::metrics::HttpMetrics;
use platform::rate_limit::RateLimiterRegistry;

use crate::application::AuthenticationTokenStore;
use crate::domain::entity::principal::Principal;
use crate::domain::repository::IdentityRepository;
use crate::error::{IdentityError, IdentityResult};
use crate::presentation::handlers::IdentityAppState;

/// Count every request and time it to the response.
pub async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    metrics.request_received();
    let response = next.run(req).await;
    metrics.response_sent(response.status().as_u16(), started.elapsed());
    response
}

/// Per-client token bucket. A pass-through when the limiter is disabled.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiterRegistry>>,
    req: Request<Body>,
    next: Next,
) -> IdentityResult<Response> {
    if !limiter.config().enabled {
        return Ok(next.run(req).await);
    }

    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let identity = client_identity(req.headers(), direct_ip);

    if !limiter.allow(&identity) {
        tracing::debug!(client = %identity, "Request rejected by rate limiter");
        return Err(IdentityError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}

/// Resolve the bearer token, if any, into a [`Principal`] extension.
///
/// No `Authorization` header means anonymous. A header that is present but
/// malformed, unknown or expired fails the request. Either way the response
/// varies on `Authorization`.
pub async fn authenticate<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let principal = resolve_principal(&state, req.headers()).await;
    let mut response = match principal {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn resolve_principal<R, M>(
    state: &IdentityAppState<R, M>,
    headers: &HeaderMap,
) -> IdentityResult<Principal>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let Some(token) = bearer_token(headers)? else {
        return Ok(Principal::Anonymous);
    };

    let store = AuthenticationTokenStore::new(
        state.repo.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    match store.resolve_user(token).await {
        Ok(user) => Ok(Principal::Authenticated(user)),
        Err(IdentityError::NotFound | IdentityError::Expired) => {
            Err(IdentityError::InvalidAuthenticationToken)
        }
        Err(e) => Err(e),
    }
}

/// Reject anonymous callers on the routes it wraps.
pub async fn require_authentication(req: Request<Body>, next: Next) -> IdentityResult<Response> {
    let anonymous = req
        .extensions()
        .get::<Principal>()
        .is_none_or(Principal::is_anonymous);

    if anonymous {
        return Err(IdentityError::AuthenticationRequired);
    }

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> IdentityResult<Option<&str>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(IdentityError::InvalidAuthenticationToken)?;

    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).unwrap().is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(matches!(
            bearer_token(&headers),
            Err(IdentityError::InvalidAuthenticationToken)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
