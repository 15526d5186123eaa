use crate::types::json_path::JsonPath;
use crate::types::{Parameter, ParameterLocation};
use crate::{CONTENT_FIELD, SCHEMA_FIELD};
use indexmap::IndexMap;
use serde_json::Value;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";

const JSON_MIME_MARKERS: [&str; 5] = [
    "application/json",
    "application/x-json",
    "text/json",
    "text/x-json",
    "+json",
];

const MULTIPART_MIME_TYPES: [&str; 4] = [
    "multipart/mixed",
    "multipart/related",
    "multipart/form-data",
    "multipart/alternative",
];

pub fn is_json_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_lowercase();
    JSON_MIME_MARKERS
        .iter()
        .any(|marker| media_type.contains(marker))
}

pub fn is_multipart_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_lowercase();
    MULTIPART_MIME_TYPES.contains(&media_type.as_str())
}

pub fn is_form_url_encoded_media_type(media_type: &str) -> bool {
    media_type.to_lowercase() == FORM_URL_ENCODED
}

/// One operation of the API document with its references resolved.
///
/// Operations are normally obtained from
/// [`OpenApiTraverser::get_operation`](crate::traverser::OpenApiTraverser::get_operation),
/// which merges path-level parameters and dereferences the request body,
/// responses and parameter schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub(crate) path: String,
    pub(crate) method: String,
    pub(crate) data: Value,
    pub(crate) pointer: JsonPath,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) request_body: Option<IndexMap<String, Value>>,
    pub(crate) responses: Vec<(String, Value)>,
    pub(crate) security: Vec<Vec<String>>,
}

impl Operation {
    /// An operation with no path, method, parameters or body.
    pub fn empty() -> Self {
        Self {
            path: String::new(),
            method: String::new(),
            data: Value::Object(Default::default()),
            pointer: JsonPath::new(),
            parameters: vec![],
            request_body: None,
            responses: vec![],
            security: vec![],
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw operation object.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// JSON pointer to the operation object, e.g. `/paths/~1pets/get`.
    pub fn pointer(&self) -> String {
        self.pointer.format_pointer()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |parameter| parameter.location == location)
    }

    /// Looks up a declared parameter by name regardless of its location.
    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
    }

    /// The media type used to build the request body: the first JSON media type
    /// if one is declared, otherwise the first declared media type.
    pub fn request_body(&self) -> Option<(&str, &Value)> {
        let content = self.request_body.as_ref()?;
        content
            .iter()
            .find(|(media_type, _)| is_json_media_type(media_type))
            .or_else(|| content.iter().next())
            .map(|(media_type, media)| (media_type.as_str(), media))
    }

    /// The request body schema, provided it is a non-empty object.
    pub fn request_body_schema(&self) -> Option<&Value> {
        let (_, media) = self.request_body()?;
        media
            .get(SCHEMA_FIELD)
            .filter(|schema| schema.as_object().is_some_and(|schema| !schema.is_empty()))
    }

    pub fn content_type(&self) -> &str {
        match self.request_body() {
            Some((media_type, _)) => media_type,
            None => DEFAULT_CONTENT_TYPE,
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_media_type(self.content_type())
    }

    pub fn is_multipart(&self) -> bool {
        is_multipart_media_type(self.content_type())
    }

    pub fn is_form_url_encoded(&self) -> bool {
        is_form_url_encoded_media_type(self.content_type())
    }

    /// The first media type of the first documented response that has `content`.
    pub fn response_content_type(&self) -> Option<&str> {
        self.responses.iter().find_map(|(_, response)| {
            let content = response.get(CONTENT_FIELD)?.as_object()?;
            Some(match content.keys().next() {
                Some(media_type) => media_type.as_str(),
                None => DEFAULT_CONTENT_TYPE,
            })
        })
    }

    /// Security requirement groups, each listing the scheme names it needs.
    pub fn security(&self) -> &[Vec<String>] {
        &self.security
    }
}
