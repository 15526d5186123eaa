pub mod auth;
pub mod data;
pub mod har;
pub mod json_path;
pub mod operation;
pub mod primitive;
pub mod value;

use crate::style::Style;
use crate::types::primitive::OpenApiPrimitives;
use crate::{FORMAT_FIELD, ITEMS_FIELD, TYPE_FIELD};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ParameterLocation {
    Header,
    Query,
    Cookie,
    Path,
    /// A property of a multipart request body.
    Body,
}

impl ParameterLocation {
    /// The style OpenAPI assumes when a parameter does not declare one.
    pub fn default_style(&self) -> Style {
        match self {
            ParameterLocation::Path | ParameterLocation::Header => Style::Simple,
            ParameterLocation::Query | ParameterLocation::Cookie | ParameterLocation::Body => {
                Style::Form
            }
        }
    }
}

impl Display for ParameterLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = String::from(match self {
            ParameterLocation::Header => "header",
            ParameterLocation::Query => "query",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Path => "path",
            ParameterLocation::Body => "body",
        });
        write!(f, "{}", str)
    }
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "header" => Ok(ParameterLocation::Header),
            "query" => Ok(ParameterLocation::Query),
            "cookie" => Ok(ParameterLocation::Cookie),
            "path" => Ok(ParameterLocation::Path),
            "body" => Ok(ParameterLocation::Body),
            other => Err(other.to_string()),
        }
    }
}

/// A declared parameter (or multipart body property) ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) location: ParameterLocation,
    pub(crate) required: bool,
    pub(crate) style: Option<Style>,
    pub(crate) explode: Option<bool>,
    pub(crate) allow_reserved: bool,
    pub(crate) schema: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            style: None,
            explode: None,
            allow_reserved: false,
            schema: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn explode(mut self, explode: bool) -> Self {
        self.explode = Some(explode);
        self
    }

    pub fn allow_reserved(mut self, allow_reserved: bool) -> Self {
        self.allow_reserved = allow_reserved;
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> ParameterLocation {
        self.location
    }

    /// The schema default, but only when it is truthy: `0`, `""`, `false` and
    /// `null` defaults are not applied.
    pub(crate) fn truthy_default(&self) -> Option<&Value> {
        let default = self.schema.as_ref()?.get(crate::DEFAULT_FIELD)?;
        if is_truthy(default) { Some(default) } else { None }
    }

    /// `type: array` whose items are `format: binary`.
    pub(crate) fn is_binary_array(&self) -> bool {
        match &self.schema {
            None => false,
            Some(schema) => is_binary_array_schema(schema),
        }
    }
}

/// JSON values that count as "set": everything except `null`, `false`, `0`
/// and `""`.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn is_binary_array_schema(schema: &Value) -> bool {
    schema.get(TYPE_FIELD).and_then(Value::as_str) == Some(OpenApiPrimitives::Array.as_str())
        && schema
            .get(ITEMS_FIELD)
            .and_then(|items| items.get(FORMAT_FIELD))
            .and_then(Value::as_str)
            == Some(crate::BINARY_FORMAT)
}

#[cfg(test)]
mod test {
    use crate::style::Style;
    use crate::types::{Parameter, ParameterLocation};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_location_round_trips_through_strings() {
        for location in [
            ParameterLocation::Header,
            ParameterLocation::Query,
            ParameterLocation::Cookie,
            ParameterLocation::Path,
        ] {
            assert_eq!(ParameterLocation::from_str(&location.to_string()), Ok(location));
        }
        assert!(ParameterLocation::from_str("matrix").is_err());
    }

    #[test]
    fn test_default_styles() {
        assert_eq!(ParameterLocation::Path.default_style(), Style::Simple);
        assert_eq!(ParameterLocation::Header.default_style(), Style::Simple);
        assert_eq!(ParameterLocation::Query.default_style(), Style::Form);
        assert_eq!(ParameterLocation::Cookie.default_style(), Style::Form);
    }

    #[test]
    fn test_truthy_default_ignores_falsy_defaults() {
        let param = Parameter::new("a", ParameterLocation::Query).schema(json!({"default": 0}));
        assert!(param.truthy_default().is_none());
        let param = Parameter::new("a", ParameterLocation::Query).schema(json!({"default": ""}));
        assert!(param.truthy_default().is_none());
        let param =
            Parameter::new("a", ParameterLocation::Query).schema(json!({"default": [null, null]}));
        assert_eq!(param.truthy_default(), Some(&json!([null, null])));
    }

    #[test]
    fn test_is_binary_array() {
        let param = Parameter::new("files", ParameterLocation::Body)
            .schema(json!({"type": "array", "items": {"type": "string", "format": "binary"}}));
        assert!(param.is_binary_array());
        let param = Parameter::new("file", ParameterLocation::Body)
            .schema(json!({"type": "string", "format": "binary"}));
        assert!(!param.is_binary_array());
    }
}
