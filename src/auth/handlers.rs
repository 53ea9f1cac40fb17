use crate::auth::session;
use crate::error::AppError;
use crate::handlers::render;
use crate::middleware::csrf::{csrf_token_for_form, validate_csrf_form_field};
use crate::services::auth_service::{AuthServiceError, LoginRequest};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    login: String,
    error: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username_or_email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    csrf_token: String,
}

async fn login_error(login: &str, msg: &str, session: &Session) -> Response {
    render(&LoginTemplate {
        login: login.to_string(),
        error: Some(msg.to_string()),
        csrf_token: csrf_token_for_form(session).await,
    })
}

/// GET /login
pub async fn login_page(session: Session) -> Response {
    render(&LoginTemplate {
        login: String::new(),
        error: None,
        csrf_token: csrf_token_for_form(&session).await,
    })
}

/// POST /login
pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return Ok(login_error(
            &form.username_or_email,
            "Invalid security token. Please refresh the page and try again.",
            &session,
        )
        .await);
    }

    let request = LoginRequest {
        login: form.username_or_email.clone(),
        password: form.password,
    };

    match state.auth_service.authenticate(request).await {
        Ok(account) => {
            state.account_service.login(&session, &account).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthServiceError::InvalidCredentials) => Ok(login_error(
            &form.username_or_email,
            "Invalid username, email or password",
            &session,
        )
        .await),
        Err(e) => Err(e.into()),
    }
}

/// GET /logout
pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = session::log_out(&session).await {
        tracing::warn!("Failed to flush session on logout: {}", e);
    }
    Redirect::to("/")
}
