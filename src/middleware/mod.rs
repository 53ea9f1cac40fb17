pub mod csrf;
pub mod security_headers;

pub use csrf::{csrf_token_for_form, validate_csrf_form_field, CsrfError};
pub use security_headers::add_security_headers;
