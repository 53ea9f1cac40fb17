use crate::auth::session;
use crate::error::AppError;
use crate::handlers::render;
use crate::AppState;
use askama::Template;
use axum::{extract::State, response::Response};
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    username: Option<String>,
    needs_verification: bool,
}

/// GET / - landing page, with a reminder for accounts that are not verified yet
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let account = match session::logged_in_account_id(&session).await? {
        Some(id) => state.account_service.find_by_id(id).await?,
        None => None,
    };

    let template = match account {
        Some(account) => IndexTemplate {
            needs_verification: !account.email_verified,
            username: Some(account.username),
        },
        None => IndexTemplate {
            username: None,
            needs_verification: false,
        },
    };

    Ok(render(&template))
}
