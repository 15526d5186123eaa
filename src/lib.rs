pub mod data_url;
pub mod encoder;
pub mod flatten;
pub mod formatter;
pub mod request_body;
pub mod security;
pub mod server;
pub mod style;
pub mod traverser;
pub mod types;

use crate::encoder::encode_uri_component;
use crate::flatten::append_har_value;
use crate::formatter::format_parameter;
use crate::request_body::assemble_request_body;
use crate::security::{HarTarget, SecurityOutcome, configure_security};
use crate::server::{default_variables, placeholder_regex, server_url};
use crate::traverser::OpenApiTraverser;
use crate::types::auth::AuthForHar;
use crate::types::data::DataForHar;
use crate::types::har::{Har, HarParam, HarRequest};
use crate::types::operation::Operation;
use crate::types::value::RuntimeValue;
use crate::types::{Parameter, ParameterLocation, is_truthy};
use http::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

const ALLOW_RESERVED_FIELD: &str = "allowReserved";
const COMPONENTS_FIELD: &str = "components";
const CONTENT_FIELD: &str = "content";
const DEFAULT_FIELD: &str = "default";
const ENCODING_FIELD: &str = "encoding";
const EXPLODE_FIELD: &str = "explode";
const FORMAT_FIELD: &str = "format";
const IN_FIELD: &str = "in";
const ITEMS_FIELD: &str = "items";
const KEY_FIELD: &str = "key";
const NAME_FIELD: &str = "name";
const PARAMETERS_FIELD: &str = "parameters";
const PATHS_FIELD: &str = "paths";
const PROPERTIES_FIELD: &str = "properties";
const REF_FIELD: &str = "$ref";
const REQUEST_BODY_FIELD: &str = "requestBody";
const REQUIRED_FIELD: &str = "required";
const RESPONSES_FIELD: &str = "responses";
const SCHEMA_FIELD: &str = "schema";
const SCHEME_FIELD: &str = "scheme";
const SECURITY_FIELD: &str = "security";
const SECURITY_SCHEMES_FIELD: &str = "securitySchemes";
const SERVERS_FIELD: &str = "servers";
const STYLE_FIELD: &str = "style";
const TYPE_FIELD: &str = "type";
const URL_FIELD: &str = "url";
const VALUE_FIELD: &str = "value";
const VARIABLES_FIELD: &str = "variables";

const BINARY_FORMAT: &str = "binary";
const JSON_FORMAT: &str = "json";
/// A body member that stands in for the entire payload.
pub const RAW_BODY: &str = "RAW_BODY";

const PATH_SEPARATOR: &str = "/";
const TILDE: &str = "~";
const ENCODED_BACKSLASH: &str = "~1";
const ENCODED_TILDE: &str = "~0";

const PROXY_ENABLED_EXTENSION: &str = "proxy-enabled";
const HEADERS_EXTENSION: &str = "headers";

const ACCEPT_HEADER: &str = "Accept";
const CONTENT_TYPE_HEADER: &str = "Content-Type";

pub const DEFAULT_PROXY_ORIGIN: &str = "https://try.readme.io/";
pub const DEFAULT_BASE_URL: &str = "https://example.com";
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Options for [`oas_to_har`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarOptions {
    pub(crate) proxy_url: bool,
    pub(crate) proxy_origin: String,
    pub(crate) default_base_url: String,
    pub(crate) max_depth: usize,
}

impl Default for HarOptions {
    fn default() -> Self {
        Self {
            proxy_url: false,
            proxy_origin: DEFAULT_PROXY_ORIGIN.to_string(),
            default_base_url: DEFAULT_BASE_URL.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HarOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix the URL with the proxy origin when the API enables proxying.
    pub fn proxy_url(mut self, proxy_url: bool) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    pub fn proxy_origin(mut self, proxy_origin: impl Into<String>) -> Self {
        self.proxy_origin = proxy_origin.into();
        self
    }

    /// Base URL used when the document has no usable server.
    pub fn default_base_url(mut self, default_base_url: impl Into<String>) -> Self {
        self.default_base_url = default_base_url.into();
        self
    }

    /// Values nested deeper than this are dropped.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Builds the HAR request for calling `operation` with `values`.
///
/// # Arguments
///
/// * `traverser` - The API document the operation belongs to.
/// * `operation` - The operation to call, usually from [`OpenApiTraverser::get_operation`].
///   [`Operation::empty`] produces a bare request to the base URL.
/// * `values` - Parameter, body and server values supplied by the caller.
/// * `auth` - Credentials keyed by security scheme name.
/// * `options` - Proxy and fallback settings.
///
/// # Returns
///
/// A single entry HAR log. Values that cannot be serialized are left out rather
/// than reported, and `values` is never modified.
pub fn oas_to_har(
    traverser: &OpenApiTraverser,
    operation: &Operation,
    values: &DataForHar,
    auth: &AuthForHar,
    options: &HarOptions,
) -> Har {
    let values = values.bounded(options.max_depth);
    let specification = traverser.specification();

    let selected = values.server.as_ref().map_or(0, |server| server.selected);
    let mut variables = default_variables(specification, selected);
    if let Some(server) = &values.server {
        for (name, value) in &server.variables {
            variables.insert(name.clone(), value.clone());
        }
    }
    let base_url = server_url(specification, selected, &variables, &options.default_base_url);
    let url = encode_whitespace(&format!("{}{}", base_url, operation.path()));

    let mut url = substitute_path_parameters(&url, operation, &values);
    if options.proxy_url {
        let proxy_enabled = traverser.extension(PROXY_ENABLED_EXTENSION, operation);
        if proxy_enabled.is_some_and(is_truthy) {
            url = format!("{}{}", options.proxy_origin, url);
        }
    }

    let mut request = HarRequest::new(operation.method().to_uppercase(), url);
    log::debug!("Building {} {}", request.method, request.url);

    for param in operation.parameters_in(ParameterLocation::Query) {
        let value = format_parameter(&values, param, ParameterLocation::Query, true);
        append_har_value(&mut request.query_string, &param.name, value.as_ref(), None);
    }
    for param in operation.parameters_in(ParameterLocation::Cookie) {
        let value = format_parameter(&values, param, ParameterLocation::Cookie, true);
        append_har_value(&mut request.cookies, &param.name, value.as_ref(), None);
    }

    if let Some(accept) = operation.response_content_type() {
        if values.header_value(ACCEPT.as_str()).is_none() {
            request.headers.push(HarParam::new(ACCEPT_HEADER, accept));
        }
    }

    let mut content_type = operation.content_type().to_string();
    let mut has_content_type = false;
    for param in operation.parameters_in(ParameterLocation::Header) {
        let Some(value) = format_parameter(&values, param, ParameterLocation::Header, true) else {
            continue;
        };
        if param.name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            has_content_type = true;
            content_type = value.to_text();
        }
        append_har_value(&mut request.headers, &param.name, Some(&value), None);
    }

    if let Some(Value::Array(static_headers)) = traverser.extension(HEADERS_EXTENSION, operation) {
        for header in static_headers {
            let name = json_text(header.get(KEY_FIELD));
            let value = json_text(header.get(VALUE_FIELD));
            if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
                has_content_type = true;
                content_type = value.clone();
            }
            request.headers.push(HarParam::new(name, value));
        }
    }

    let supplied_accept = values
        .header_value(ACCEPT.as_str())
        .filter(|accept| !accept.is_undefined());
    if let Some(accept) = supplied_accept {
        if !has_header(&request, ACCEPT.as_str()) {
            request.headers.push(HarParam::new(ACCEPT_HEADER, accept.to_string()));
        }
    }

    request.post_data = assemble_request_body(operation, &values, &content_type)
        .filter(|post_data| !post_data.is_empty());

    let has_text = request
        .post_data
        .as_ref()
        .and_then(|post_data| post_data.text.as_deref())
        .is_some_and(|text| !text.is_empty());
    let has_schema = operation.request_body_schema().is_some();
    if (has_text || has_schema) && !has_content_type && !has_header(&request, CONTENT_TYPE.as_str())
    {
        request.headers.push(HarParam::new(CONTENT_TYPE_HEADER, content_type));
    }

    for requirement in operation.security() {
        for scheme in requirement {
            let SecurityOutcome::Resolved { target, param } =
                configure_security(traverser, auth, scheme)
            else {
                continue;
            };
            let entries = match target {
                HarTarget::Headers => &mut request.headers,
                HarTarget::Cookies => &mut request.cookies,
                HarTarget::QueryString => &mut request.query_string,
            };
            let duplicate = entries
                .iter()
                .any(|entry| entry.name == param.name && entry.value == param.value);
            if !duplicate {
                entries.push(param);
            }
        }
    }

    Har::new(request)
}

fn encode_whitespace(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    for character in url.chars() {
        if character.is_whitespace() {
            encoded.push_str("%20");
        } else {
            encoded.push(character);
        }
    }
    encoded
}

/// Fills `{name}` placeholders from the path values. Placeholders without a
/// declared parameter are treated as unstyled path parameters.
fn substitute_path_parameters(url: &str, operation: &Operation, values: &DataForHar) -> String {
    let Some(regex) = placeholder_regex() else {
        return url.to_string();
    };
    regex
        .replace_all(url, |captures: &regex::Captures| {
            let key = &captures[1];
            let parameter = match operation.find_parameter(key) {
                Some(parameter) => parameter.clone(),
                None => Parameter::new(key, ParameterLocation::Path),
            };
            let text = format_parameter(values, &parameter, ParameterLocation::Path, false)
                .map(|value| value.to_text())
                .unwrap_or_default();
            match parameter.style {
                None => encode_uri_component(&text),
                Some(_) => text,
            }
        })
        .into_owned()
}

fn has_header(request: &HarRequest, name: &str) -> bool {
    request
        .headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case(name))
}

fn json_text(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(value) => RuntimeValue::from(value).to_string(),
    }
}
