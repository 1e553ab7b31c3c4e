//! Basic-Authentication injection.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::Credentials;
use crate::http::headers::Headers;

pub const AUTHORIZATION: &str = "Authorization";

/// `Basic base64(username:password)`, or `None` when no password is set.
///
/// # Example
///
/// ```
/// # use basic_auth_proxy::config::Credentials;
/// # use basic_auth_proxy::proxy::auth::basic_auth_value;
/// let creds = Credentials::new("admin", Some("secret".to_string()));
/// assert_eq!(basic_auth_value(&creds).as_deref(), Some("Basic YWRtaW46c2VjcmV0"));
/// ```
pub fn basic_auth_value(credentials: &Credentials) -> Option<String> {
    let password = credentials.password.as_deref()?;
    let token = STANDARD.encode(format!("{}:{}", credentials.username, password));
    Some(format!("Basic {token}"))
}

/// Adds `Authorization` unless the client already sent one.
///
/// `auth_value` is the precomputed header from [`basic_auth_value`]; `None`
/// disables injection. Returns whether the header was added.
pub fn inject_credentials(headers: &mut Headers, auth_value: Option<&str>) -> bool {
    match auth_value {
        Some(value) if !headers.contains(AUTHORIZATION) => {
            headers.append(AUTHORIZATION, value);
            true
        }
        _ => false,
    }
}
