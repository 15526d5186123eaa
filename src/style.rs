use crate::encoder::{EncodeOptions, EscapeMode, encode_disallowed_characters};
use crate::types::ParameterLocation;
use crate::types::value::RuntimeValue;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// OpenAPI parameter serialization styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Form,
    Simple,
    Matrix,
    Label,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl Display for Style {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Style::Form => "form",
            Style::Simple => "simple",
            Style::Matrix => "matrix",
            Style::Label => "label",
            Style::SpaceDelimited => "spaceDelimited",
            Style::PipeDelimited => "pipeDelimited",
            Style::DeepObject => "deepObject",
        };
        write!(f, "{}", str)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownStyle(pub String);

impl Display for UnknownStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown style: {}", self.0)
    }
}

impl std::error::Error for UnknownStyle {}

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(Style::Form),
            "simple" => Ok(Style::Simple),
            "matrix" => Ok(Style::Matrix),
            "label" => Ok(Style::Label),
            "spaceDelimited" => Ok(Style::SpaceDelimited),
            "pipeDelimited" => Ok(Style::PipeDelimited),
            "deepObject" => Ok(Style::DeepObject),
            other => Err(UnknownStyle(other.to_string())),
        }
    }
}

/// Everything the serializer needs to know about one value.
#[derive(Debug, Clone, Copy)]
pub struct StyleConfig<'a> {
    pub location: ParameterLocation,
    pub key: &'a str,
    pub style: Style,
    pub explode: bool,
    pub escape: EscapeMode,
    pub allow_reserved: bool,
}

impl StyleConfig<'_> {
    fn encode(&self, text: &str) -> String {
        encode_disallowed_characters(
            text,
            EncodeOptions {
                escape: self.escape,
                return_if_encoded: matches!(
                    self.location,
                    ParameterLocation::Query | ParameterLocation::Body
                ),
                allow_reserved: self.allow_reserved,
            },
        )
    }

    /// Array members: missing and `null` members become empty strings.
    fn encode_element(&self, value: &RuntimeValue) -> String {
        match value {
            RuntimeValue::Undefined | RuntimeValue::Null => String::new(),
            other => self.encode(&other.to_string()),
        }
    }

    /// Object members: missing members become empty strings, `null` stays literal.
    fn encode_member(&self, value: &RuntimeValue) -> String {
        match value {
            RuntimeValue::Undefined => String::new(),
            other => self.encode(&other.to_string()),
        }
    }
}

/// Serializes `value` according to `config`.
///
/// Returns `None` for style and shape combinations OpenAPI does not define, in
/// which case the caller omits the value entirely.
pub fn stylize(config: &StyleConfig, value: &RuntimeValue) -> Option<String> {
    match value {
        RuntimeValue::Array(items) => encode_array(config, items),
        RuntimeValue::Object(members) => encode_object(config, members),
        other => encode_primitive(config, other),
    }
}

pub fn encode_primitive(config: &StyleConfig, value: &RuntimeValue) -> Option<String> {
    let text = value.to_string();
    match config.style {
        Style::Simple | Style::Form | Style::DeepObject => Some(config.encode(&text)),
        Style::Label => Some(format!(".{}", config.encode(&text))),
        Style::Matrix => {
            if text.is_empty() {
                Some(format!(";{}", config.key))
            } else {
                Some(format!(";{}={}", config.key, config.encode(&text)))
            }
        }
        Style::SpaceDelimited | Style::PipeDelimited => None,
    }
}

pub fn encode_array(config: &StyleConfig, items: &[RuntimeValue]) -> Option<String> {
    let encoded: Vec<String> = items
        .iter()
        .map(|item| config.encode_element(item))
        .collect();
    let key = config.key;
    match (config.style, config.explode) {
        (Style::Simple, _) => Some(encoded.join(",")),
        (Style::Label, _) => Some(format!(".{}", encoded.join("."))),
        (Style::Matrix, false) => {
            if encoded.is_empty() {
                Some(String::new())
            } else {
                Some(format!(";{}={}", key, encoded.join(",")))
            }
        }
        (Style::Matrix, true) => Some(
            encoded
                .iter()
                .map(|item| format!(";{}={}", key, item))
                .collect(),
        ),
        (Style::Form, false) => Some(encoded.join(",")),
        (Style::Form, true) => Some(encoded.join(&format!("&{}=", key))),
        (Style::SpaceDelimited, false) => Some(encoded.join(" ")),
        (Style::SpaceDelimited, true) => Some(encoded.join(&format!(" {}=", key))),
        (Style::PipeDelimited, false) => Some(encoded.join("|")),
        (Style::PipeDelimited, true) => Some(encoded.join(&format!("|{}=", key))),
        (Style::DeepObject, _) => None,
    }
}

pub fn encode_object(config: &StyleConfig, members: &IndexMap<String, RuntimeValue>) -> Option<String> {
    let pairs: Vec<(&str, String)> = members
        .iter()
        .map(|(name, member)| (name.as_str(), config.encode_member(member)))
        .collect();
    let flat = |separator: &str| -> String {
        pairs
            .iter()
            .flat_map(|(name, value)| [name.to_string(), value.clone()])
            .collect::<Vec<String>>()
            .join(separator)
    };
    let assigned = |separator: &str| -> String {
        pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<String>>()
            .join(separator)
    };
    match (config.style, config.explode) {
        (Style::Simple, false) => Some(flat(",")),
        (Style::Simple, true) => Some(assigned(",")),
        (Style::Label, false) => Some(format!(".{}", flat("."))),
        (Style::Label, true) => Some(format!(".{}", assigned("."))),
        (Style::Matrix, false) => Some(format!(";{}={}", config.key, flat(","))),
        (Style::Matrix, true) => Some(format!(";{}", assigned(";"))),
        (Style::Form, false) => Some(flat(",")),
        (Style::Form, true) => Some(assigned("&")),
        (Style::SpaceDelimited, _) => Some(flat(" ")),
        (Style::PipeDelimited, _) => Some(flat("|")),
        (Style::DeepObject, false) => None,
        (Style::DeepObject, true) => Some(
            encode_deep_object(config, members)
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<String>>()
                .join("&"),
        ),
    }
}

/// Expands an object into `key[prop]` named entries, descending into nested
/// objects and arrays (`key[prop][0]`). Missing members are skipped.
pub fn encode_deep_object(
    config: &StyleConfig,
    members: &IndexMap<String, RuntimeValue>,
) -> Vec<(String, String)> {
    let mut entries = vec![];
    for (name, member) in members {
        collect_deep_entries(config, format!("{}[{}]", config.key, name), member, &mut entries);
    }
    entries
}

fn collect_deep_entries(
    config: &StyleConfig,
    name: String,
    value: &RuntimeValue,
    entries: &mut Vec<(String, String)>,
) {
    match value {
        RuntimeValue::Undefined => {}
        RuntimeValue::Object(members) => {
            for (member_name, member) in members {
                collect_deep_entries(config, format!("{}[{}]", name, member_name), member, entries);
            }
        }
        RuntimeValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_deep_entries(config, format!("{}[{}]", name, index), item, entries);
            }
        }
        other => entries.push((name, config.encode(&other.to_string()))),
    }
}

#[cfg(test)]
mod test {
    use crate::encoder::EscapeMode;
    use crate::style::{Style, StyleConfig, encode_deep_object, stylize};
    use crate::types::ParameterLocation;
    use crate::types::value::RuntimeValue;
    use serde_json::json;
    use std::str::FromStr;

    fn config(location: ParameterLocation, style: Style, explode: bool) -> StyleConfig<'static> {
        StyleConfig {
            location,
            key: "color",
            style,
            explode,
            escape: EscapeMode::Normal,
            allow_reserved: false,
        }
    }

    fn array_input() -> RuntimeValue {
        RuntimeValue::from(json!(["blue", "black", "brown"]))
    }

    fn object_input() -> RuntimeValue {
        RuntimeValue::from(json!({"R": 100, "G": 200, "B": 150}))
    }

    #[test]
    fn test_style_from_str() {
        assert_eq!(Style::from_str("spaceDelimited"), Ok(Style::SpaceDelimited));
        assert_eq!(Style::from_str("deepObject").unwrap().to_string(), "deepObject");
        assert!(Style::from_str("tabDelimited").is_err());
    }

    #[test]
    fn test_primitive_styles() {
        let value = RuntimeValue::from("blue");
        let path = ParameterLocation::Path;
        assert_eq!(stylize(&config(path, Style::Simple, false), &value).unwrap(), "blue");
        assert_eq!(stylize(&config(path, Style::Label, false), &value).unwrap(), ".blue");
        assert_eq!(stylize(&config(path, Style::Matrix, false), &value).unwrap(), ";color=blue");
        let query = ParameterLocation::Query;
        assert_eq!(stylize(&config(query, Style::Form, true), &value).unwrap(), "blue");
        assert!(stylize(&config(query, Style::SpaceDelimited, false), &value).is_none());
        assert!(stylize(&config(query, Style::PipeDelimited, true), &value).is_none());
    }

    #[test]
    fn test_primitive_empty_values() {
        let value = RuntimeValue::from("");
        let path = ParameterLocation::Path;
        assert_eq!(stylize(&config(path, Style::Matrix, false), &value).unwrap(), ";color");
        assert_eq!(stylize(&config(path, Style::Label, true), &value).unwrap(), ".");
    }

    #[test]
    fn test_null_primitive_is_literal() {
        let value = RuntimeValue::Null;
        let query = ParameterLocation::Query;
        assert_eq!(stylize(&config(query, Style::Form, true), &value).unwrap(), "null");
    }

    #[test]
    fn test_array_styles() {
        let value = array_input();
        let path = ParameterLocation::Path;
        let query = ParameterLocation::Query;
        let cases = [
            (path, Style::Simple, false, "blue,black,brown"),
            (path, Style::Simple, true, "blue,black,brown"),
            (path, Style::Label, false, ".blue.black.brown"),
            (path, Style::Label, true, ".blue.black.brown"),
            (path, Style::Matrix, false, ";color=blue,black,brown"),
            (path, Style::Matrix, true, ";color=blue;color=black;color=brown"),
            (query, Style::Form, false, "blue,black,brown"),
            (query, Style::Form, true, "blue&color=black&color=brown"),
            (query, Style::SpaceDelimited, false, "blue black brown"),
            (query, Style::SpaceDelimited, true, "blue color=black color=brown"),
            (query, Style::PipeDelimited, false, "blue|black|brown"),
            (query, Style::PipeDelimited, true, "blue|color=black|color=brown"),
        ];
        for (location, style, explode, expected) in cases {
            let result = stylize(&config(location, style, explode), &value);
            assert_eq!(result.as_deref(), Some(expected), "{style} explode={explode}");
        }
        assert!(stylize(&config(query, Style::DeepObject, true), &value).is_none());
    }

    #[test]
    fn test_array_null_members_render_empty() {
        let value = RuntimeValue::from(json!([null, null]));
        let result = stylize(&config(ParameterLocation::Query, Style::Form, true), &value);
        assert_eq!(result.unwrap(), "&color=");
    }

    #[test]
    fn test_object_styles() {
        let value = object_input();
        let path = ParameterLocation::Path;
        let query = ParameterLocation::Query;
        let cases = [
            (path, Style::Simple, false, "R,100,G,200,B,150"),
            (path, Style::Simple, true, "R=100,G=200,B=150"),
            (path, Style::Label, false, ".R.100.G.200.B.150"),
            (path, Style::Label, true, ".R=100.G=200.B=150"),
            (path, Style::Matrix, false, ";color=R,100,G,200,B,150"),
            (path, Style::Matrix, true, ";R=100;G=200;B=150"),
            (query, Style::Form, false, "R,100,G,200,B,150"),
            (query, Style::Form, true, "R=100&G=200&B=150"),
            (query, Style::SpaceDelimited, false, "R 100 G 200 B 150"),
            (query, Style::PipeDelimited, false, "R|100|G|200|B|150"),
            (query, Style::DeepObject, true, "color[R]=100&color[G]=200&color[B]=150"),
        ];
        for (location, style, explode, expected) in cases {
            let result = stylize(&config(location, style, explode), &value);
            assert_eq!(result.as_deref(), Some(expected), "{style} explode={explode}");
        }
        assert!(stylize(&config(query, Style::DeepObject, false), &value).is_none());
    }

    #[test]
    fn test_object_with_missing_member() {
        let mut members = indexmap::IndexMap::new();
        members.insert("R".to_string(), RuntimeValue::Undefined);
        let value = RuntimeValue::Object(members);
        let path = ParameterLocation::Path;
        let result = stylize(&config(path, Style::Matrix, false), &value);
        assert_eq!(result.unwrap(), ";color=R,");
        let result = stylize(&config(path, Style::Matrix, true), &value);
        assert_eq!(result.unwrap(), ";R=");
    }

    #[test]
    fn test_values_are_encoded_once() {
        let value = RuntimeValue::from(json!({"pound": "something&nothing=true", "hash": "hash#data"}));
        let query = ParameterLocation::Query;
        let result = stylize(&config(query, Style::Form, false), &value);
        assert_eq!(result.unwrap(), "pound,something%26nothing%3Dtrue,hash,hash%23data");

        let encoded = RuntimeValue::from("something%26nothing%3Dtrue");
        let result = stylize(&config(query, Style::Form, false), &encoded);
        assert_eq!(result.unwrap(), "something%26nothing%3Dtrue");
    }

    #[test]
    fn test_allow_reserved() {
        let value = RuntimeValue::from("hash#data");
        let mut config = config(ParameterLocation::Query, Style::Form, true);
        config.allow_reserved = true;
        assert_eq!(stylize(&config, &value).unwrap(), "hash#data");
    }

    #[test]
    fn test_deep_object_nested_entries() {
        let value = RuntimeValue::from(json!({
            "id": "someID",
            "petLicense": null,
            "dog": {"name": "buster", "age": 18, "treats": ["peanut butter", "apple"]},
            "pets": [{"name": "buster", "age": null, "metadata": {"isOld": true}}]
        }));
        let config = config(ParameterLocation::Query, Style::DeepObject, true);
        let entries = encode_deep_object(&config, value.as_object().unwrap());
        let expected = vec![
            ("color[id]", "someID"),
            ("color[petLicense]", "null"),
            ("color[dog][name]", "buster"),
            ("color[dog][age]", "18"),
            ("color[dog][treats][0]", "peanut%20butter"),
            ("color[dog][treats][1]", "apple"),
            ("color[pets][0][name]", "buster"),
            ("color[pets][0][age]", "null"),
            ("color[pets][0][metadata][isOld]", "true"),
        ];
        let entries: Vec<(&str, &str)> = entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        assert_eq!(entries, expected);
    }
}
