use crate::traverser::OpenApiTraverser;
use crate::types::auth::{AuthForHar, AuthValue};
use crate::types::har::HarParam;
use crate::{IN_FIELD, NAME_FIELD, SCHEME_FIELD, TYPE_FIELD};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

const AUTHORIZATION_HEADER: &str = "Authorization";
const BEARER_FORMAT_EXTENSION: &str = "x-bearer-format";

/// The request list a security value is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarTarget {
    Headers,
    Cookies,
    QueryString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityOutcome {
    /// The scheme is unknown, unsupported or has no value supplied.
    Absent,
    /// The scheme matched but the supplied credentials cannot be used.
    Unusable,
    Resolved { target: HarTarget, param: HarParam },
}

impl SecurityOutcome {
    fn resolved(target: HarTarget, name: impl Into<String>, value: String) -> Self {
        if value.is_empty() {
            return SecurityOutcome::Absent;
        }
        SecurityOutcome::Resolved {
            target,
            param: HarParam::new(name, value),
        }
    }
}

/// Uppercases the first character: `token` becomes `Token`.
fn capitalize(word: &str) -> String {
    let mut characters = word.chars();
    match characters.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(characters).collect(),
    }
}

fn token(value: Option<&AuthValue>) -> Option<&str> {
    match value {
        Some(AuthValue::Token(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn bearer(value: Option<&AuthValue>) -> SecurityOutcome {
    match token(value) {
        Some(token) => SecurityOutcome::resolved(
            HarTarget::Headers,
            AUTHORIZATION_HEADER,
            format!("Bearer {token}"),
        ),
        None => SecurityOutcome::Unusable,
    }
}

fn basic(value: Option<&AuthValue>) -> SecurityOutcome {
    let (user, pass) = match value {
        Some(AuthValue::Basic { user, pass }) => (
            user.as_deref().unwrap_or_default(),
            pass.as_deref().unwrap_or_default(),
        ),
        _ => return SecurityOutcome::Unusable,
    };
    if user.is_empty() && pass.is_empty() {
        return SecurityOutcome::Unusable;
    }
    let credentials = STANDARD.encode(format!("{user}:{pass}"));
    SecurityOutcome::resolved(
        HarTarget::Headers,
        AUTHORIZATION_HEADER,
        format!("Basic {credentials}"),
    )
}

fn api_key(scheme: &Value, value: Option<&AuthValue>) -> SecurityOutcome {
    let Some(key) = token(value) else {
        return SecurityOutcome::Absent;
    };
    let name = OpenApiTraverser::get_as_str(scheme, NAME_FIELD).unwrap_or_default();
    match OpenApiTraverser::get_as_str(scheme, IN_FIELD) {
        Ok("query") => SecurityOutcome::resolved(HarTarget::QueryString, name, key.to_string()),
        Ok("cookie") => SecurityOutcome::resolved(HarTarget::Cookies, name, key.to_string()),
        Ok("header") => {
            let value = match OpenApiTraverser::get_as_str(scheme, BEARER_FORMAT_EXTENSION) {
                Ok(format) if !format.is_empty() => format!("{} {key}", capitalize(format)),
                _ => key.to_string(),
            };
            SecurityOutcome::resolved(HarTarget::Headers, name, value)
        }
        _ => SecurityOutcome::Absent,
    }
}

/// Resolves the request field carrying the credentials for `scheme_name`.
///
/// # Parameters
/// - `traverser`: The API document
/// - `auth`: Credentials keyed by scheme name
/// - `scheme_name`: A key of `components.securitySchemes`
///
/// # Returns
/// [`SecurityOutcome::Absent`] when nothing applies, [`SecurityOutcome::Unusable`]
/// when the scheme is known but the credentials are blank, and the header,
/// cookie or query parameter otherwise.
pub fn configure_security(
    traverser: &OpenApiTraverser,
    auth: &AuthForHar,
    scheme_name: &str,
) -> SecurityOutcome {
    if scheme_name.is_empty() || auth.is_empty() {
        return SecurityOutcome::Absent;
    }
    let Some(scheme) = traverser.security_scheme(scheme_name) else {
        log::debug!("Security scheme {scheme_name} is not usable, skipping");
        return SecurityOutcome::Absent;
    };
    let value = auth.get(scheme_name);

    let scheme_type = OpenApiTraverser::get_as_str(scheme, TYPE_FIELD).unwrap_or_default();
    if scheme_type.eq_ignore_ascii_case("http") {
        let http_scheme = OpenApiTraverser::get_as_str(scheme, SCHEME_FIELD).unwrap_or_default();
        if http_scheme.eq_ignore_ascii_case("basic") {
            return basic(value);
        }
        if http_scheme.eq_ignore_ascii_case("bearer") {
            return bearer(value);
        }
    } else if scheme_type.eq_ignore_ascii_case("apiKey") {
        return api_key(scheme, value);
    } else if scheme_type.eq_ignore_ascii_case("oauth2") {
        return bearer(value);
    }
    log::debug!("Unsupported security scheme type {scheme_type} for {scheme_name}");
    SecurityOutcome::Absent
}
