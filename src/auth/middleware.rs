use crate::auth::{session, CurrentUser};
use crate::error::AppError;
use crate::services::AuthServiceError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Resolves the logged-in account once and hands it to the handler as a
/// `CurrentUser` extension. Anonymous requests go to the login page.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let account_id = match session::logged_in_account_id(&session).await {
        Ok(Some(id)) => id,
        Ok(None) => return Redirect::to("/login").into_response(),
        Err(e) => {
            tracing::warn!("Failed to read session: {}", e);
            return Redirect::to("/login").into_response();
        }
    };

    match state.auth_service.get_account_by_id(account_id).await {
        Ok(account) => {
            request.extensions_mut().insert(CurrentUser(account));
            next.run(request).await
        }
        Err(AuthServiceError::AccountNotFound) => {
            // The account behind the session no longer exists.
            let _ = session::log_out(&session).await;
            Redirect::to("/login").into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_account_id)) = session::logged_in_account_id(&session).await {
        Redirect::to("/").into_response()
    } else {
        next.run(request).await
    }
}
