pub mod account_handlers;
pub mod home_handlers;

pub use account_handlers::{
    resend_verification_email, sign_up_form, sign_up_submit, verify_email, verify_email_token,
};
pub use home_handlers::index;

use crate::error::AppError;
use askama::Template;
use axum::response::{Html, IntoResponse, Response};

pub(crate) fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => AppError::Template(e).into_response(),
    }
}
