//! HTTP Handlers

use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use platform::background::BackgroundTasks;
use platform::clock::Clock;
use platform::mail::MailTransport;
use platform::metrics::HttpMetrics;
use platform::rate_limit::RateLimiterRegistry;

use crate::application::config::IdentityConfig;
use crate::application::request_verification::VERIFICATION_SENT_MESSAGE;
use crate::application::reset_password::PASSWORD_RESET_MESSAGE;
use crate::application::{
    RequestVerificationUseCase, ResetPasswordInput, ResetPasswordUseCase, SignInInput,
    SignInUseCase, SignUpInput, SignUpUseCase, UpdateAccountInput, UpdateAccountUseCase,
};
use crate::domain::entity::{principal::Principal, user::User};
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::email::Email;
use crate::error::{IdentityError, IdentityResult};
use crate::presentation::extract::JsonBody;
use crate::presentation::dto::{
    AuthenticationTokenEnvelope, CredentialsRequest, EmailRequest, HealthcheckResponse,
    MessageResponse, SystemInfo, TokenCredentialsRequest, UpdateAccountRequest, UserEnvelope,
};

/// Shared state for identity handlers and middleware
pub struct IdentityAppState<R, M>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub mailer: Arc<M>,
    pub config: Arc<IdentityConfig>,
    pub clock: Arc<dyn Clock>,
    pub tasks: BackgroundTasks,
    pub limiter: Arc<RateLimiterRegistry>,
    pub metrics: Arc<HttpMetrics>,
}

// Derive would demand `M: Clone`; every field is already shared.
impl<R, M> Clone for IdentityAppState<R, M>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            tasks: self.tasks.clone(),
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<R, M> IdentityAppState<R, M>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    fn request_verification(&self) -> RequestVerificationUseCase<R, M> {
        RequestVerificationUseCase::new(
            self.repo.clone(),
            self.mailer.clone(),
            self.tasks.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }
}

fn authenticated(principal: Principal) -> IdentityResult<User> {
    principal
        .into_user()
        .ok_or(IdentityError::AuthenticationRequired)
}

fn verification_sent() -> Json<MessageResponse> {
    Json(MessageResponse::new(VERIFICATION_SENT_MESSAGE))
}

// ============================================================================
// Healthcheck
// ============================================================================

/// GET /api/v1/healthcheck
pub async fn healthcheck<R, M>(
    State(state): State<IdentityAppState<R, M>>,
) -> Json<HealthcheckResponse>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    Json(HealthcheckResponse {
        status: "available",
        system_info: SystemInfo {
            environment: state.config.environment.clone(),
            version: state.config.version.clone(),
        },
    })
}

/// GET /debug/metrics
pub async fn metrics_report<R, M>(
    State(state): State<IdentityAppState<R, M>>,
) -> IdentityResult<impl IntoResponse>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    state.metrics.set_background_tasks(state.tasks.len());
    let body = state
        .metrics
        .render()
        .map_err(|e| IdentityError::Internal(e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// ============================================================================
// Tokens
// ============================================================================

/// POST /api/v1/tokens/authentication
pub async fn create_authentication_token<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> IdentityResult<impl IntoResponse>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let use_case =
        SignInUseCase::new(state.repo.clone(), state.config.clone(), state.clock.clone());

    let token = use_case
        .execute(SignInInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthenticationTokenEnvelope::from(&token)),
    ))
}

/// POST /api/v1/tokens/verification/registration
pub async fn request_registration_token<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> IdentityResult<Json<MessageResponse>>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let email = Email::new(req.email)?;
    state.request_verification().registration(&email).await?;
    Ok(verification_sent())
}

/// POST /api/v1/tokens/verification/password-reset
pub async fn request_password_reset_token<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> IdentityResult<Json<MessageResponse>>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let email = Email::new(req.email)?;
    state.request_verification().password_reset(&email).await?;
    Ok(verification_sent())
}

/// POST /api/v1/tokens/verification/email-change
pub async fn request_email_change_token<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> IdentityResult<Json<MessageResponse>>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let user = authenticated(principal)?;
    let email = Email::new(req.email)?;
    state.request_verification().email_change(&user, &email).await?;
    Ok(verification_sent())
}

// ============================================================================
// Users
// ============================================================================

/// POST /api/v1/users
pub async fn register_user<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    JsonBody(req): JsonBody<TokenCredentialsRequest>,
) -> IdentityResult<impl IntoResponse>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let use_case =
        SignUpUseCase::new(state.repo.clone(), state.config.clone(), state.clock.clone());

    let user = use_case
        .execute(SignUpInput {
            email: req.email,
            password: req.password,
            token: req.token,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope::from(&user))))
}

/// PUT /api/v1/users/password
pub async fn reset_password<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    JsonBody(req): JsonBody<TokenCredentialsRequest>,
) -> IdentityResult<Json<MessageResponse>>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let use_case =
        ResetPasswordUseCase::new(state.repo.clone(), state.config.clone(), state.clock.clone());

    use_case
        .execute(ResetPasswordInput {
            email: req.email,
            password: req.password,
            token: req.token,
        })
        .await?;

    Ok(Json(MessageResponse::new(PASSWORD_RESET_MESSAGE)))
}

/// GET /api/v1/users/me
pub async fn show_current_user(
    Extension(principal): Extension<Principal>,
) -> IdentityResult<Json<UserEnvelope>> {
    let user = authenticated(principal)?;
    Ok(Json(UserEnvelope::from(&user)))
}

/// PUT /api/v1/users/me
pub async fn update_current_user<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<UpdateAccountRequest>,
) -> IdentityResult<Json<UserEnvelope>>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    let user = authenticated(principal)?;
    let use_case =
        UpdateAccountUseCase::new(state.repo.clone(), state.config.clone(), state.clock.clone());

    let user = use_case
        .execute(
            user,
            UpdateAccountInput {
                email: req.email,
                password: req.password,
                token: req.token,
            },
        )
        .await?;

    Ok(Json(UserEnvelope::from(&user)))
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    kernel::error::app_error::AppError::not_found("the requested resource could not be found")
}
