use crate::data_url;
use crate::flatten::{FormattedValue, append_har_value};
use crate::formatter::format_parameter;
use crate::style::Style;
use crate::types::data::DataForHar;
use crate::types::har::{FileMetadata, HarParam, PostData};
use crate::types::operation::{FORM_URL_ENCODED, MULTIPART_FORM_DATA, Operation};
use crate::types::primitive::OpenApiPrimitives;
use crate::types::value::RuntimeValue;
use crate::types::{Parameter, ParameterLocation, is_binary_array_schema};
use crate::{
    BINARY_FORMAT, ENCODING_FIELD, EXPLODE_FIELD, FORMAT_FIELD, ITEMS_FIELD, JSON_FORMAT,
    PROPERTIES_FIELD, RAW_BODY, REQUIRED_FIELD, STYLE_FIELD,
};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// File name used for data URLs that do not carry a `name` parameter.
const UNKNOWN_FILE_NAME: &str = "unknown";

/// Schemas nested deeper than this are not searched for `format: json`.
const MAX_SCHEMA_DEPTH: usize = 32;

/// Failures while assembling a JSON or multipart body.
///
/// These never reach the caller. Each one falls back to sending the payload
/// as opaque text.
#[derive(Debug, PartialEq, Eq)]
pub enum BodyError {
    /// The payload was declared as JSON but does not parse.
    InvalidJson(String),

    /// The payload or schema has a shape the content type cannot express.
    UnsupportedShape(String),
}

impl BodyError {
    #[inline]
    pub(crate) fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson(message.into())
    }

    #[inline]
    pub(crate) fn unsupported_shape(message: impl Into<String>) -> Self {
        Self::UnsupportedShape(message.into())
    }
}

impl Display for BodyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::InvalidJson(message) => write!(f, "Invalid JSON body: {}", message),
            BodyError::UnsupportedShape(message) => {
                write!(f, "Unsupported body shape: {}", message)
            }
        }
    }
}

impl std::error::Error for BodyError {}

/// A step into a payload: an object member, or every element of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PayloadSegment {
    Key(String),
    Items,
}

/// Builds `postData` for the operation's request body.
///
/// # Parameters
/// - `operation`: The operation being serialized
/// - `values`: The caller supplied values
/// - `content_type`: The request mime type, after any `Content-Type` override
///
/// # Returns
/// `None` when the operation has no request body schema or no body value was
/// supplied.
pub fn assemble_request_body(
    operation: &Operation,
    values: &DataForHar,
    content_type: &str,
) -> Option<PostData> {
    let schema = operation.request_body_schema()?;

    if operation.is_form_url_encoded() {
        return url_encoded_body(values);
    }

    let body = &values.body;
    if !body.has_content() {
        return None;
    }

    if operation.is_multipart() {
        log::debug!("Serializing multipart body for {}", operation.path());
        return Some(match multipart_body(operation, values, schema) {
            Ok(post_data) => post_data,
            Err(e) => {
                log::warn!("Falling back to a text body: {e}");
                PostData::text(MULTIPART_FORM_DATA, stringify(body))
            }
        });
    }

    if operation.is_json() {
        log::debug!("Serializing JSON body for {}", operation.path());
        return Some(match json_body(schema, body, content_type) {
            Ok(post_data) => post_data,
            Err(e) => {
                log::warn!("Falling back to a text body: {e}");
                PostData::text(content_type, stringify(body))
            }
        });
    }

    log::debug!("Serializing {content_type} body for {}", operation.path());
    Some(PostData::text(content_type, encode_body_for_har(body)))
}

fn url_encoded_body(values: &DataForHar) -> Option<PostData> {
    if values.form_data.is_empty() {
        return None;
    }
    let cleaned = RuntimeValue::Object(values.form_data.clone()).pruned()?;
    let params = cleaned
        .as_object()?
        .iter()
        .map(|(name, value)| HarParam::new(name.as_str(), stringify_parameter(value)))
        .collect();
    Some(PostData::params(FORM_URL_ENCODED, params))
}

/// A single url-encoded form value: arrays of primitives are comma joined,
/// other containers become JSON.
fn stringify_parameter(value: &RuntimeValue) -> String {
    match value {
        RuntimeValue::Array(items) if items.iter().all(RuntimeValue::is_primitive) => {
            value.to_string()
        }
        RuntimeValue::Array(_) | RuntimeValue::Object(_) => {
            value.to_json_string().unwrap_or_default()
        }
        other => other.to_string(),
    }
}

fn multipart_body(
    operation: &Operation,
    values: &DataForHar,
    schema: &Value,
) -> Result<PostData, BodyError> {
    let properties = match schema.get(PROPERTIES_FIELD).and_then(Value::as_object) {
        Some(properties) => properties,
        None => {
            return Err(BodyError::unsupported_shape(
                "multipart schema does not declare properties",
            ));
        }
    };
    let cleaned = match values.body.pruned() {
        Some(RuntimeValue::Object(members)) => members,
        _ => return Ok(PostData::params(MULTIPART_FORM_DATA, vec![])),
    };
    let encoding = operation
        .request_body()
        .and_then(|(_, media)| media.get(ENCODING_FIELD));

    let mut params = vec![];
    for name in cleaned.keys() {
        let Some(property) = properties.get(name) else {
            log::debug!("Skipping undeclared multipart property {name}");
            continue;
        };
        let part = multipart_parameter(name, property, schema, encoding.and_then(|e| e.get(name)));
        let is_binary = is_binary_property(property);

        let parts = match format_parameter(values, &part, ParameterLocation::Body, true) {
            None => vec![],
            Some(FormattedValue::List(items)) => items,
            Some(other) => vec![other],
        };
        for value in &parts {
            let metadata = match value {
                FormattedValue::Scalar(text) if is_binary => file_metadata(text),
                _ => None,
            };
            append_har_value(&mut params, name, Some(value), metadata.as_ref());
        }
    }
    Ok(PostData::params(MULTIPART_FORM_DATA, params))
}

/// Describes one multipart property as a body parameter, using the media
/// type's `encoding` entry for style and explode.
fn multipart_parameter(
    name: &str,
    property: &Value,
    schema: &Value,
    encoding: Option<&Value>,
) -> Parameter {
    let required = match schema.get(REQUIRED_FIELD) {
        Some(Value::Bool(required)) => *required,
        Some(Value::Array(required)) => required.iter().any(|field| field.as_str() == Some(name)),
        _ => false,
    };
    let mut parameter = Parameter::new(name, ParameterLocation::Body)
        .required(required)
        .schema(property.clone());
    if let Some(encoding) = encoding {
        let style = encoding.get(STYLE_FIELD).and_then(Value::as_str);
        if let Some(style) = style.and_then(|style| Style::from_str(style).ok()) {
            parameter = parameter.style(style);
        }
        if let Some(explode) = encoding.get(EXPLODE_FIELD).and_then(Value::as_bool) {
            parameter = parameter.explode(explode);
        }
    }
    parameter
}

fn is_binary_property(property: &Value) -> bool {
    property.get(FORMAT_FIELD).and_then(Value::as_str) == Some(BINARY_FORMAT)
        || is_binary_array_schema(property)
}

fn file_metadata(value: &str) -> Option<FileMetadata> {
    let parsed = data_url::parse(value)?;
    Some(FileMetadata {
        file_name: Some(parsed.name.unwrap_or_else(|| UNKNOWN_FILE_NAME.to_string())),
        content_type: parsed.content_type,
    })
}

fn json_body(schema: &Value, body: &RuntimeValue, content_type: &str) -> Result<PostData, BodyError> {
    let cleaned = body.pruned();

    if OpenApiPrimitives::String.is_type_of(schema) {
        let text = match &cleaned {
            Some(RuntimeValue::String(text)) => text.clone(),
            Some(other) if other.is_primitive() => other.to_string(),
            _ => {
                return Err(BodyError::unsupported_shape(
                    "a string schema needs a JSON encoded string",
                ));
            }
        };
        let parsed: Value = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => return Err(BodyError::invalid_json(e.to_string())),
        };
        return Ok(PostData::text(content_type, Some(parsed.to_string())));
    }

    let mut json_paths = vec![];
    collect_json_paths(schema, &mut vec![], &mut json_paths, 0);
    if json_paths.is_empty() {
        return Ok(PostData::text(content_type, stringify(body)));
    }

    let Some(mut cleaned) = cleaned else {
        return Err(BodyError::unsupported_shape("body has no defined values"));
    };
    let mut found = false;
    for path in &json_paths {
        found |= parse_json_at(&mut cleaned, path);
    }
    if !found {
        return Ok(PostData::text(content_type, stringify(body)));
    }

    if let RuntimeValue::Object(members) = &mut cleaned {
        if let Some(raw) = members.shift_remove(RAW_BODY) {
            cleaned = raw;
        }
    }
    Ok(PostData::text(content_type, cleaned.to_json_string()))
}

/// Collects the payload locations of every `format: json` schema below `schema`.
fn collect_json_paths(
    schema: &Value,
    prefix: &mut Vec<PayloadSegment>,
    found: &mut Vec<Vec<PayloadSegment>>,
    depth: usize,
) {
    if depth > MAX_SCHEMA_DEPTH {
        return;
    }
    if !prefix.is_empty() && schema.get(FORMAT_FIELD).and_then(Value::as_str) == Some(JSON_FORMAT)
    {
        found.push(prefix.clone());
        return;
    }
    if let Some(properties) = schema.get(PROPERTIES_FIELD).and_then(Value::as_object) {
        for (name, property) in properties {
            prefix.push(PayloadSegment::Key(name.clone()));
            collect_json_paths(property, prefix, found, depth + 1);
            prefix.pop();
        }
    }
    if let Some(items) = schema.get(ITEMS_FIELD) {
        prefix.push(PayloadSegment::Items);
        collect_json_paths(items, prefix, found, depth + 1);
        prefix.pop();
    }
}

/// Parses the strings at `path` as JSON in place. Strings that do not parse
/// are left alone.
///
/// Returns whether `path` exists in `value`.
fn parse_json_at(value: &mut RuntimeValue, path: &[PayloadSegment]) -> bool {
    match path.split_first() {
        None => {
            if let RuntimeValue::String(text) = value {
                match serde_json::from_str::<Value>(text) {
                    Ok(parsed) => *value = RuntimeValue::from(parsed),
                    Err(e) => log::debug!("Leaving JSON property as a string: {e}"),
                }
            }
            true
        }
        Some((PayloadSegment::Key(name), rest)) => match value {
            RuntimeValue::Object(members) => match members.get_mut(name) {
                Some(member) => parse_json_at(member, rest),
                None => false,
            },
            _ => false,
        },
        Some((PayloadSegment::Items, rest)) => match value {
            RuntimeValue::Array(items) => {
                let mut found = false;
                for item in items {
                    found |= parse_json_at(item, rest);
                }
                found
            }
            _ => false,
        },
    }
}

/// The payload `RAW_BODY` stands for, or the value itself.
fn unwrap_raw_body(body: &RuntimeValue) -> &RuntimeValue {
    match body.get(RAW_BODY) {
        Some(raw) if !raw.is_undefined() => raw,
        _ => body,
    }
}

/// JSON text of the payload with missing values dropped. An empty payload has
/// no text.
fn stringify(body: &RuntimeValue) -> Option<String> {
    unwrap_raw_body(body).pruned()?.to_json_string()
}

/// Text for a body that is sent as-is: primitives verbatim, everything else as
/// JSON.
pub fn encode_body_for_har(body: &RuntimeValue) -> Option<String> {
    if body.is_primitive() {
        return Some(body.to_string());
    }
    let payload = unwrap_raw_body(body);
    if payload.is_primitive() {
        return Some(payload.to_string());
    }
    payload.pruned()?.to_json_string()
}

#[cfg(test)]
mod test {
    use crate::request_body::{BodyError, assemble_request_body, encode_body_for_har, json_body};
    use crate::types::data::DataForHar;
    use crate::types::har::{HarParam, PostData};
    use crate::types::operation::Operation;
    use crate::types::value::RuntimeValue;
    use indexmap::IndexMap;
    use serde_json::{Value, json};

    const OWLBERT: &str = "data:image/png;name=owlbert.png;base64,iVBORw0KGgo=";

    fn operation(media_type: &str, media: Value) -> Operation {
        let mut content = IndexMap::new();
        content.insert(media_type.to_string(), media);
        let mut operation = Operation::empty();
        operation.request_body = Some(content);
        operation
    }

    fn json_operation(schema: Value) -> Operation {
        operation("application/json", json!({"schema": schema}))
    }

    fn body(value: Value) -> DataForHar {
        DataForHar::new().with_body(value)
    }

    fn text(post_data: Option<PostData>) -> Option<String> {
        post_data.and_then(|post_data| post_data.text)
    }

    #[test]
    fn test_no_schema_or_values_means_no_body() {
        let values = body(json!({"a": "b"}));
        assert_eq!(assemble_request_body(&Operation::empty(), &values, "application/json"), None);

        let operation = json_operation(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        assert_eq!(assemble_request_body(&operation, &DataForHar::new(), "application/json"), None);
        assert_eq!(assemble_request_body(&operation, &body(json!({})), "application/json"), None);
        assert_eq!(assemble_request_body(&operation, &body(json!(null)), "application/json"), None);
    }

    #[test]
    fn test_json_object_body() {
        let operation = json_operation(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        let post_data = assemble_request_body(&operation, &body(json!({"a": "value", "b": [1, 2]})), "application/json");
        assert_eq!(
            post_data,
            Some(PostData::text("application/json", Some(r#"{"a":"value","b":[1,2]}"#.to_string())))
        );
    }

    #[test]
    fn test_undefined_members_are_dropped() {
        let operation = json_operation(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        let values = DataForHar::new().with_body(RuntimeValue::Object(IndexMap::from([
            ("a".to_string(), RuntimeValue::from("value")),
            ("b".to_string(), RuntimeValue::Undefined),
        ])));
        let post_data = assemble_request_body(&operation, &values, "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#"{"a":"value"}"#));
    }

    #[test]
    fn test_json_string_schema_is_normalized() {
        let operation = json_operation(json!({"type": "string", "format": "json"}));
        let values = body(json!("{\n  \"a\": 1\n}"));
        let post_data = assemble_request_body(&operation, &values, "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_invalid_json_string_falls_back_to_text() {
        let schema = json!({"type": "string", "format": "json"});
        let result = json_body(&schema, &RuntimeValue::from("{ not json"), "application/json");
        match result {
            Err(BodyError::InvalidJson(_)) => {}
            other => panic!("Expected InvalidJson, got {other:?}"),
        }

        let operation = json_operation(schema);
        let post_data = assemble_request_body(&operation, &body(json!("{ not json")), "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#""{ not json""#));
    }

    #[test]
    fn test_format_json_properties_are_parsed() {
        let operation = json_operation(json!({
            "type": "object",
            "properties": {
                "config": {"type": "string", "format": "json"},
                "broken": {"type": "string", "format": "json"},
                "name": {"type": "string"}
            }
        }));
        let values = body(json!({"config": "{\"a\": [1, 2]}", "broken": "{ nope", "name": "{\"b\": 1}"}));
        let post_data = assemble_request_body(&operation, &values, "application/json");
        assert_eq!(
            text(post_data).as_deref(),
            Some(r#"{"config":{"a":[1,2]},"broken":"{ nope","name":"{\"b\": 1}"}"#)
        );
    }

    #[test]
    fn test_nested_format_json_properties_are_parsed() {
        let operation = json_operation(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"payload": {"type": "string", "format": "json"}}
                    }
                }
            }
        }));
        let values = body(json!({"items": [{"payload": "{\"a\":1}"}, {"payload": "[true]"}]}));
        let post_data = assemble_request_body(&operation, &values, "application/json");
        assert_eq!(
            text(post_data).as_deref(),
            Some(r#"{"items":[{"payload":{"a":1}},{"payload":[true]}]}"#)
        );
    }

    #[test]
    fn test_raw_body() {
        let primitive = json_operation(json!({"type": "object", "properties": {"RAW_BODY": {"type": "string"}}}));
        let post_data = assemble_request_body(&primitive, &body(json!({"RAW_BODY": "test"})), "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#""test""#));
        let post_data = assemble_request_body(&primitive, &body(json!({"RAW_BODY": ""})), "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#""""#));
        let post_data = assemble_request_body(&primitive, &body(json!({"RAW_BODY": 5})), "application/json");
        assert_eq!(text(post_data).as_deref(), Some("5"));

        let json = json_operation(json!({"type": "object", "properties": {"RAW_BODY": {"type": "string", "format": "json"}}}));
        let post_data = assemble_request_body(&json, &body(json!({"RAW_BODY": "{ \"a\": 1 }"})), "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#"{"a":1}"#));

        let objects = json_operation(json!({"type": "object", "properties": {"RAW_BODY": {"type": "object"}}}));
        let post_data = assemble_request_body(&objects, &body(json!({"RAW_BODY": {"a": "test"}})), "application/json");
        assert_eq!(text(post_data).as_deref(), Some(r#"{"a":"test"}"#));
        let post_data = assemble_request_body(&objects, &body(json!({"RAW_BODY": {}})), "application/json");
        assert_eq!(text(post_data), None);
    }

    #[test]
    fn test_other_content_types_pass_primitives_through() {
        let operation = operation("application/xml", json!({"schema": {"type": "string"}}));
        let post_data = assemble_request_body(&operation, &body(json!("<xml>")), "application/xml");
        assert_eq!(post_data, Some(PostData::text("application/xml", Some("<xml>".to_string()))));

        let operation = operation_with_image();
        let post_data = assemble_request_body(&operation, &body(json!(OWLBERT)), "image/png");
        assert_eq!(text(post_data).as_deref(), Some(OWLBERT));
    }

    fn operation_with_image() -> Operation {
        operation("image/png", json!({"schema": {"type": "string", "format": "binary"}}))
    }

    #[test]
    fn test_url_encoded_body() {
        let operation = operation(
            "application/x-www-form-urlencoded",
            json!({"schema": {"type": "object", "properties": {"id": {"type": "string"}}}}),
        );
        let values = DataForHar::new()
            .with_form_data("id", json!("abc"))
            .with_form_data("tags", json!(["a", "b"]))
            .with_form_data("nested", json!({"a": [1, {"b": 2}]}))
            .with_form_data("empty", json!(null))
            .with_form_data("missing", RuntimeValue::Undefined);
        let post_data = assemble_request_body(&operation, &values, "application/x-www-form-urlencoded");
        assert_eq!(
            post_data,
            Some(PostData::params(
                "application/x-www-form-urlencoded",
                vec![
                    HarParam::new("id", "abc"),
                    HarParam::new("tags", "a,b"),
                    HarParam::new("nested", r#"{"a":[1,{"b":2}]}"#),
                    HarParam::new("empty", "null"),
                ]
            ))
        );
        assert_eq!(
            assemble_request_body(&operation, &DataForHar::new(), "application/x-www-form-urlencoded"),
            None
        );
    }

    fn multipart_operation() -> Operation {
        operation(
            "multipart/form-data",
            json!({
                "schema": {
                    "type": "object",
                    "required": ["orderId"],
                    "properties": {
                        "orderId": {"type": "integer"},
                        "userId": {"type": "integer"},
                        "documentFile": {"type": "string", "format": "binary"},
                        "files": {"type": "array", "items": {"type": "string", "format": "binary"}},
                        "color": {"type": "array", "items": {"type": "string"}}
                    }
                },
                "encoding": {"color": {"style": "form", "explode": false}}
            }),
        )
    }

    #[test]
    fn test_multipart_body_with_file_metadata() {
        let values = body(json!({"orderId": 12345, "userId": 67890, "documentFile": OWLBERT}));
        let post_data = assemble_request_body(&multipart_operation(), &values, "multipart/form-data");
        let mut file = HarParam::new("documentFile", OWLBERT);
        file.file_name = Some("owlbert.png".to_string());
        file.content_type = Some("image/png".to_string());
        assert_eq!(
            post_data,
            Some(PostData::params(
                "multipart/form-data",
                vec![HarParam::new("orderId", "12345"), HarParam::new("userId", "67890"), file]
            ))
        );
    }

    #[test]
    fn test_multipart_file_arrays_and_encoding() {
        let unnamed = "data:text/plain;base64,SGVsbG8=";
        let values = body(json!({
            "files": [OWLBERT, unnamed],
            "color": ["blue", "black"],
            "undeclared": "skipped"
        }));
        let post_data = assemble_request_body(&multipart_operation(), &values, "multipart/form-data").unwrap();
        let params = post_data.params.unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].file_name.as_deref(), Some("owlbert.png"));
        assert_eq!(params[1].file_name.as_deref(), Some("unknown"));
        assert_eq!(params[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(params[2], HarParam::new("color", "blue,black"));
    }

    #[test]
    fn test_multipart_encoding_explodes_objects() {
        let operation = operation(
            "multipart/form-data",
            json!({
                "schema": {
                    "type": "object",
                    "properties": {"color": {"type": "object"}}
                },
                "encoding": {"color": {"style": "form", "explode": true}}
            }),
        );
        let values = body(json!({"color": {"R": 100, "G": 200}}));
        let post_data = assemble_request_body(&operation, &values, "multipart/form-data");
        assert_eq!(
            post_data,
            Some(PostData::params(
                "multipart/form-data",
                vec![HarParam::new("R", "100"), HarParam::new("G", "200")]
            ))
        );
    }

    #[test]
    fn test_multipart_non_object_body_has_no_params() {
        let post_data = assemble_request_body(&multipart_operation(), &body(json!("text")), "multipart/form-data");
        assert_eq!(post_data, Some(PostData::params("multipart/form-data", vec![])));
    }

    #[test]
    fn test_multipart_without_properties_falls_back_to_text() {
        let operation = operation("multipart/form-data", json!({"schema": {"type": "object"}}));
        let post_data = assemble_request_body(&operation, &body(json!({"a": 1})), "multipart/form-data");
        assert_eq!(
            post_data,
            Some(PostData::text("multipart/form-data", Some(r#"{"a":1}"#.to_string())))
        );
    }

    #[test]
    fn test_encode_body_for_har() {
        assert_eq!(encode_body_for_har(&RuntimeValue::from(json!(5))).as_deref(), Some("5"));
        assert_eq!(encode_body_for_har(&RuntimeValue::from(json!([1, null]))).as_deref(), Some("[1,null]"));
        assert_eq!(encode_body_for_har(&RuntimeValue::from(json!({"RAW_BODY": [1]}))).as_deref(), Some("[1]"));
        assert_eq!(encode_body_for_har(&RuntimeValue::from(json!({}))), None);
    }
}
