pub mod handlers;
pub mod middleware;
pub mod session;

use crate::models::account::Account;

/// The account bound to the requesting session, resolved by
/// [`middleware::require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);
