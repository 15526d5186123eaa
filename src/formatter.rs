use crate::encoder::EscapeMode;
use crate::flatten::FormattedValue;
use crate::style::{Style, StyleConfig, encode_deep_object, stylize};
use crate::types::data::DataForHar;
use crate::types::value::RuntimeValue;
use crate::types::{Parameter, ParameterLocation};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName};

/// Headers whose parameter definitions do not take part in serialization.
const UNSTYLED_HEADERS: [HeaderName; 3] = [ACCEPT, CONTENT_TYPE, AUTHORIZATION];

/// Resolves the value for `param` from `values` and formats it.
///
/// # Parameters
/// - `values`: The caller supplied values
/// - `param`: The declared parameter
/// - `location`: The bucket of `values` to read from
/// - `only_if_exists`: Suppress optional parameters that have no value
///
/// # Returns
/// `None` when nothing should be emitted for the parameter.
pub fn format_parameter(
    values: &DataForHar,
    param: &Parameter,
    location: ParameterLocation,
    only_if_exists: bool,
) -> Option<FormattedValue> {
    let supplied = values
        .lookup(location, &param.name)
        .unwrap_or(&RuntimeValue::Undefined);
    format_value(supplied, param, location, only_if_exists)
}

/// Formats an already looked-up value for `param`.
///
/// A declared style always routes through [`format_style`]. Otherwise the
/// value falls back to the schema default for required parameters, or to the
/// parameter name for path parameters. Query values are styled even without
/// a declared style.
pub fn format_value(
    supplied: &RuntimeValue,
    param: &Parameter,
    location: ParameterLocation,
    only_if_exists: bool,
) -> Option<FormattedValue> {
    if param.style.is_some() {
        return format_style(supplied, param, location);
    }

    let value = if !supplied.is_undefined() {
        supplied.clone()
    } else if only_if_exists && !param.required {
        RuntimeValue::Undefined
    } else if let Some(default) = param.truthy_default().filter(|_| param.required) {
        RuntimeValue::from(default)
    } else if location == ParameterLocation::Path {
        return Some(FormattedValue::Scalar(param.name.clone()));
    } else {
        RuntimeValue::Undefined
    };

    if param.is_binary_array() {
        return match &value {
            RuntimeValue::Array(_) => FormattedValue::from_runtime(&value),
            other => other.to_json_string().map(FormattedValue::Scalar),
        };
    }

    if value.is_undefined() {
        return None;
    }
    if location == ParameterLocation::Query {
        return format_style(&value, param, location);
    }
    FormattedValue::from_runtime(&value)
}

/// Whether each array element or object member becomes its own entry.
fn should_explode(param: &Parameter, location: ParameterLocation) -> bool {
    let wants_explode = param.explode == Some(true)
        || (param.explode != Some(false) && param.style == Some(Style::Form))
        || param.style == Some(Style::DeepObject);
    wants_explode && !matches!(location, ParameterLocation::Path | ParameterLocation::Header)
}

/// Serializes `value` with the parameter's style, filling in the OpenAPI
/// defaults for style and explode.
pub fn format_style(
    value: &RuntimeValue,
    param: &Parameter,
    location: ParameterLocation,
) -> Option<FormattedValue> {
    if location == ParameterLocation::Header
        && UNSTYLED_HEADERS
            .iter()
            .any(|header| param.name.eq_ignore_ascii_case(header.as_str()))
    {
        return FormattedValue::from_runtime(value);
    }

    let style = param.style.unwrap_or(location.default_style());
    let config = StyleConfig {
        location,
        key: &param.name,
        style,
        explode: param.explode.unwrap_or(style == Style::Form),
        escape: EscapeMode::Normal,
        allow_reserved: location == ParameterLocation::Query && param.allow_reserved,
    };

    let value = normalize_missing(value, location)?;

    if style == Style::DeepObject {
        return match value.as_object() {
            Some(members) if param.explode != Some(false) => Some(FormattedValue::Keyed(
                encode_deep_object(&config, members)
                    .into_iter()
                    .map(|(name, text)| (name, FormattedValue::Scalar(text)))
                    .collect(),
            )),
            _ => {
                log::debug!("deepObject only serializes exploded objects, skipping {}", param.name);
                None
            }
        };
    }

    if should_explode(param, location) {
        return match &value {
            RuntimeValue::Array(items) => Some(FormattedValue::List(
                items
                    .iter()
                    .filter_map(|item| stylize_value(&config, item))
                    .collect(),
            )),
            RuntimeValue::Object(members) => Some(FormattedValue::Keyed(
                members
                    .iter()
                    .filter_map(|(name, member)| {
                        stylize_value(&config, member).map(|member| (name.clone(), member))
                    })
                    .collect(),
            )),
            other => stylize_value(&config, other),
        };
    }

    stylize_value(&config, &value)
}

/// Missing values (or arrays of nothing but missing values) render as an empty
/// string in a path and are dropped everywhere else. Missing array elements
/// are removed.
fn normalize_missing(value: &RuntimeValue, location: ParameterLocation) -> Option<RuntimeValue> {
    let missing = match value {
        RuntimeValue::Undefined => true,
        RuntimeValue::Array(items) => items.iter().all(RuntimeValue::is_undefined),
        _ => false,
    };
    if missing {
        return match location {
            ParameterLocation::Path => Some(RuntimeValue::String(String::new())),
            _ => None,
        };
    }
    match value {
        RuntimeValue::Array(items) => Some(RuntimeValue::Array(
            items
                .iter()
                .filter(|item| !item.is_undefined())
                .cloned()
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn stylize_value(config: &StyleConfig, value: &RuntimeValue) -> Option<FormattedValue> {
    if config.style == Style::Simple && value.as_str() == Some("") {
        return None;
    }
    match stylize(config, value) {
        Some(text) => Some(FormattedValue::Scalar(text)),
        None => {
            log::debug!(
                "{} style does not support this value for {}, skipping",
                config.style,
                config.key
            );
            None
        }
    }
}
