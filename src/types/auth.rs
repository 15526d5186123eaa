use indexmap::IndexMap;
use serde_json::Value;

const USER_FIELD: &str = "user";
const PASS_FIELD: &str = "pass";

/// A credential supplied for one security scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthValue {
    /// A bearer token, OAuth2 token or API key.
    Token(String),
    /// HTTP Basic credentials. Either half may be missing.
    Basic {
        user: Option<String>,
        pass: Option<String>,
    },
}

impl AuthValue {
    pub fn basic(user: impl Into<String>, pass: impl Into<String>) -> Self {
        AuthValue::Basic {
            user: Some(user.into()),
            pass: Some(pass.into()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(token) => Some(AuthValue::Token(token.clone())),
            Value::Number(number) => Some(AuthValue::Token(number.to_string())),
            Value::Bool(flag) => Some(AuthValue::Token(flag.to_string())),
            Value::Object(credentials) => {
                let part = |field: &str| {
                    credentials
                        .get(field)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                Some(AuthValue::Basic {
                    user: part(USER_FIELD),
                    pass: part(PASS_FIELD),
                })
            }
            Value::Null | Value::Array(_) => None,
        }
    }
}

impl From<&str> for AuthValue {
    fn from(value: &str) -> Self {
        AuthValue::Token(value.to_string())
    }
}

impl From<String> for AuthValue {
    fn from(value: String) -> Self {
        AuthValue::Token(value)
    }
}

/// Credentials keyed by security scheme name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForHar(IndexMap<String, AuthValue>);

impl AuthForHar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `{scheme: "token" | number | {user, pass}}`. Other shapes are ignored.
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            None => Self::new(),
            Some(schemes) => Self(
                schemes
                    .iter()
                    .filter_map(|(scheme, value)| {
                        AuthValue::from_json(value).map(|auth| (scheme.clone(), auth))
                    })
                    .collect(),
            ),
        }
    }

    pub fn with(mut self, scheme: impl Into<String>, value: impl Into<AuthValue>) -> Self {
        self.0.insert(scheme.into(), value.into());
        self
    }

    pub fn get(&self, scheme: &str) -> Option<&AuthValue> {
        self.0.get(scheme)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
