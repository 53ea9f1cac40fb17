use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::handlers::render;
use crate::middleware::csrf::{csrf_token_for_form, validate_csrf_form_field};
use crate::models::sign_up::{SignUpForm, ValidationErrors};
use crate::services::AccountServiceError;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use tower_sessions::Session;

pub const WRONG_EMAIL: &str = "wrong.email";
pub const WRONG_TOKEN: &str = "wrong.token";
pub const RESEND_COOLDOWN_MESSAGE: &str = "We already sent verification 1 hour ago.";

#[derive(Template)]
#[template(path = "account/sign_up.html")]
struct SignUpTemplate {
    username: String,
    email: String,
    username_error: Option<String>,
    email_error: Option<String>,
    password_error: Option<String>,
    global_error: Option<String>,
    csrf_token: String,
}

impl SignUpTemplate {
    fn empty(csrf_token: String) -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            username_error: None,
            email_error: None,
            password_error: None,
            global_error: None,
            csrf_token,
        }
    }

    /// Re-renders the submitted values. The password is never echoed.
    fn with_errors(form: &SignUpForm, errors: &ValidationErrors, csrf_token: String) -> Self {
        Self {
            username: form.username.clone(),
            email: form.email.clone(),
            username_error: errors.message_for("username").map(str::to_string),
            email_error: errors.message_for("email").map(str::to_string),
            password_error: errors.message_for("password").map(str::to_string),
            global_error: None,
            csrf_token,
        }
    }

    fn with_global_error(form: &SignUpForm, message: &str, csrf_token: String) -> Self {
        Self {
            global_error: Some(message.to_string()),
            ..Self::with_errors(form, &ValidationErrors::new(), csrf_token)
        }
    }
}

#[derive(Template)]
#[template(path = "account/verified_email.html")]
struct VerifiedEmailTemplate {
    error: Option<String>,
    number_of_user: i64,
    username: String,
}

impl VerifiedEmailTemplate {
    fn error(code: &str) -> Self {
        Self {
            error: Some(code.to_string()),
            number_of_user: 0,
            username: String::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "account/verify_email.html")]
struct VerifyEmailTemplate {
    email: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailTokenQuery {
    token: Option<String>,
    email: Option<String>,
}

/// GET /sign-up
pub async fn sign_up_form(session: Session) -> Response {
    render(&SignUpTemplate::empty(csrf_token_for_form(&session).await))
}

/// POST /sign-up
pub async fn sign_up_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignUpForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        let csrf_token = csrf_token_for_form(&session).await;
        return Ok(render(&SignUpTemplate::with_global_error(
            &form,
            "Invalid security token. Please refresh the page and try again.",
            csrf_token,
        )));
    }

    let errors = state.sign_up_validator.validate(&form).await?;
    if errors.has_errors() {
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        tracing::debug!(?fields, "sign-up form rejected");
        let csrf_token = csrf_token_for_form(&session).await;
        return Ok(render(&SignUpTemplate::with_errors(&form, &errors, csrf_token)));
    }

    let account = match state.account_service.process_new_account(&form).await {
        Ok(account) => account,
        Err(AccountServiceError::AlreadyRegistered) => {
            let csrf_token = csrf_token_for_form(&session).await;
            return Ok(render(&SignUpTemplate::with_global_error(
                &form,
                "This username or email is already in use.",
                csrf_token,
            )));
        }
        Err(e) => return Err(e.into()),
    };

    state.account_service.login(&session, &account).await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /verify-email-token?token=..&email=..
pub async fn verify_email_token(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<VerifyEmailTokenQuery>,
) -> Result<Response, AppError> {
    let email = query.email.unwrap_or_default();
    let token = query.token.unwrap_or_default();

    let Some(mut account) = state.account_service.find_by_email(&email).await? else {
        return Ok(render(&VerifiedEmailTemplate::error(WRONG_EMAIL)));
    };

    if !account.is_valid_token(&token) {
        tracing::debug!(account_id = account.id, "verification token mismatch");
        return Ok(render(&VerifiedEmailTemplate::error(WRONG_TOKEN)));
    }

    state.account_service.complete_sign_up(&mut account).await?;
    state.account_service.login(&session, &account).await?;

    let number_of_user = state.account_service.count_accounts().await?;
    Ok(render(&VerifiedEmailTemplate {
        error: None,
        number_of_user,
        username: account.username,
    }))
}

/// GET /verify-email
pub async fn verify_email(Extension(CurrentUser(account)): Extension<CurrentUser>) -> Response {
    render(&VerifyEmailTemplate {
        email: account.email,
        error: None,
    })
}

/// GET /resend-verification-email
pub async fn resend_verification_email(
    State(state): State<AppState>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    if !account.can_send_confirm_email(state.account_service.now()) {
        return Ok(render(&VerifyEmailTemplate {
            email: account.email,
            error: Some(RESEND_COOLDOWN_MESSAGE.to_string()),
        }));
    }

    state
        .account_service
        .send_sign_up_confirm_email(&account)
        .await?;
    Ok(Redirect::to("/").into_response())
}
