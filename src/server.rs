use crate::types::data::ValueMap;
use crate::types::value::RuntimeValue;
use crate::{DEFAULT_FIELD, SERVERS_FIELD, URL_FIELD, VARIABLES_FIELD};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const PLACEHOLDER_PATTERN: &str = r"\{([-_a-zA-Z0-9\[\]]+)\}";
const HTTPS_SCHEME: &str = "https:";

static PLACEHOLDER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// Matches `{name}` placeholders in server URLs and path templates.
pub(crate) fn placeholder_regex() -> Option<&'static Regex> {
    PLACEHOLDER_REGEX
        .get_or_init(|| match Regex::new(PLACEHOLDER_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::error!("Invalid placeholder pattern: {e}");
                None
            }
        })
        .as_ref()
}

fn selected_server(specification: &Value, selected: usize) -> Option<&Value> {
    specification
        .get(SERVERS_FIELD)
        .and_then(Value::as_array)
        .and_then(|servers| servers.get(selected))
}

/// The declared `default` of every variable of the selected server.
pub fn default_variables(specification: &Value, selected: usize) -> ValueMap {
    let variables = selected_server(specification, selected)
        .and_then(|server| server.get(VARIABLES_FIELD))
        .and_then(Value::as_object);
    match variables {
        None => ValueMap::new(),
        Some(variables) => variables
            .iter()
            .filter_map(|(name, variable)| {
                variable
                    .get(DEFAULT_FIELD)
                    .map(|default| (name.clone(), RuntimeValue::from(default)))
            })
            .collect(),
    }
}

fn strip_trailing_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Gives `url` a scheme. Relative URLs are resolved against `base_url`.
fn ensure_protocol(url: &str, base_url: &str) -> String {
    if url.starts_with("//") {
        format!("{HTTPS_SCHEME}{url}")
    } else if url.starts_with('/') {
        format!("{}{url}", strip_trailing_slash(base_url))
    } else if !url.contains("//") {
        format!("{HTTPS_SCHEME}//{url}")
    } else {
        url.to_string()
    }
}

/// Replaces `{name}` placeholders with the matching variable. Placeholders
/// without a usable value are left in place.
fn substitute_variables(url: &str, variables: &ValueMap) -> String {
    let Some(regex) = placeholder_regex() else {
        return url.to_string();
    };
    regex
        .replace_all(url, |captures: &regex::Captures| {
            let substitution = variables
                .get(&captures[1])
                .map(RuntimeValue::to_string)
                .filter(|value| !value.is_empty());
            match substitution {
                Some(value) => value,
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

/// Builds the base URL of the selected server.
///
/// A missing server list, an out-of-range `selected` index or an empty URL
/// yields `base_url`.
pub fn server_url(
    specification: &Value,
    selected: usize,
    variables: &ValueMap,
    base_url: &str,
) -> String {
    let url = selected_server(specification, selected)
        .and_then(|server| server.get(URL_FIELD))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty());
    let url = match url {
        Some(url) => ensure_protocol(strip_trailing_slash(url), base_url),
        None => {
            log::debug!("No server at index {selected}, using {base_url}");
            base_url.to_string()
        }
    };
    let url = substitute_variables(&url, variables);
    strip_trailing_slash(url.trim()).to_string()
}
