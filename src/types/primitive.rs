use crate::TYPE_FIELD;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum OpenApiPrimitives {
    Null,
    Bool,
    Integer,
    Array,
    Number,
    String,
    Object,
}

impl Display for OpenApiPrimitives {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpenApiPrimitives {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "null" => Ok(OpenApiPrimitives::Null),
            "boolean" => Ok(OpenApiPrimitives::Bool),
            "integer" => Ok(OpenApiPrimitives::Integer),
            "number" => Ok(OpenApiPrimitives::Number),
            "string" => Ok(OpenApiPrimitives::String),
            "array" => Ok(OpenApiPrimitives::Array),
            "object" => Ok(OpenApiPrimitives::Object),
            other => Err(other.to_string()),
        }
    }
}

impl OpenApiPrimitives {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenApiPrimitives::Null => "null",
            OpenApiPrimitives::Bool => "boolean",
            OpenApiPrimitives::Integer => "integer",
            OpenApiPrimitives::Array => "array",
            OpenApiPrimitives::Number => "number",
            OpenApiPrimitives::String => "string",
            OpenApiPrimitives::Object => "object",
        }
    }

    /// Checks whether a schema's `type` is, or contains, this primitive.
    ///
    /// `type` may be a single string or (in 3.1 documents) an array of strings.
    pub fn is_type_of(&self, schema: &Value) -> bool {
        match schema.get(TYPE_FIELD) {
            Some(Value::String(declared)) => OpenApiPrimitives::from_str(declared).as_ref() == Ok(self),
            Some(Value::Array(declared)) => declared
                .iter()
                .filter_map(Value::as_str)
                .any(|declared| OpenApiPrimitives::from_str(declared).as_ref() == Ok(self)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::types::primitive::OpenApiPrimitives;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_from_str_accepts_schema_type_names() {
        assert_eq!(OpenApiPrimitives::from_str("boolean"), Ok(OpenApiPrimitives::Bool));
        assert_eq!(OpenApiPrimitives::from_str("Integer"), Ok(OpenApiPrimitives::Integer));
        assert!(OpenApiPrimitives::from_str("file").is_err());
    }

    #[test]
    fn test_is_type_of_single_type() {
        let schema = json!({"type": "string"});
        assert!(OpenApiPrimitives::String.is_type_of(&schema));
        assert!(!OpenApiPrimitives::Object.is_type_of(&schema));
    }

    #[test]
    fn test_is_type_of_type_array() {
        let schema = json!({"type": ["string", "null"]});
        assert!(OpenApiPrimitives::String.is_type_of(&schema));
        assert!(OpenApiPrimitives::Null.is_type_of(&schema));
        assert!(!OpenApiPrimitives::Number.is_type_of(&schema));
    }

    #[test]
    fn test_is_type_of_without_type() {
        assert!(!OpenApiPrimitives::Object.is_type_of(&json!({"properties": {}})));
    }
}
