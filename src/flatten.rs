use crate::types::har::{FileMetadata, HarParam};
use crate::types::value::RuntimeValue;

/// The result of formatting a parameter.
///
/// A style either produces one string, several values sharing the parameter
/// name, or several values that each carry their own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedValue {
    Scalar(String),
    List(Vec<FormattedValue>),
    Keyed(Vec<(String, FormattedValue)>),
}

impl FormattedValue {
    /// Wraps an unstyled value. `Undefined` values and members are dropped.
    pub fn from_runtime(value: &RuntimeValue) -> Option<Self> {
        match value {
            RuntimeValue::Undefined => None,
            RuntimeValue::Array(items) => Some(FormattedValue::List(
                items.iter().filter_map(FormattedValue::from_runtime).collect(),
            )),
            RuntimeValue::Object(members) => Some(FormattedValue::Keyed(
                members
                    .iter()
                    .filter_map(|(name, member)| {
                        FormattedValue::from_runtime(member).map(|member| (name.clone(), member))
                    })
                    .collect(),
            )),
            other => Some(FormattedValue::Scalar(other.to_string())),
        }
    }

    /// Collapses the value into a single string, comma separating lists and
    /// key/value pairs.
    pub fn to_text(&self) -> String {
        match self {
            FormattedValue::Scalar(text) => text.clone(),
            FormattedValue::List(items) => items
                .iter()
                .map(FormattedValue::to_text)
                .collect::<Vec<String>>()
                .join(","),
            FormattedValue::Keyed(members) => members
                .iter()
                .flat_map(|(name, member)| [name.clone(), member.to_text()])
                .collect::<Vec<String>>()
                .join(","),
        }
    }
}

impl From<&str> for FormattedValue {
    fn from(value: &str) -> Self {
        FormattedValue::Scalar(value.to_string())
    }
}

/// Appends `value` to `target` as flat `{name, value}` pairs.
///
/// Lists repeat `name` once per member, keyed values use each key as the
/// name. `metadata` is only attached to a scalar at the top level.
pub fn append_har_value(
    target: &mut Vec<HarParam>,
    name: &str,
    value: Option<&FormattedValue>,
    metadata: Option<&FileMetadata>,
) {
    match value {
        None => {}
        Some(FormattedValue::List(items)) => {
            for item in items {
                append_har_value(target, name, Some(item), None);
            }
        }
        Some(FormattedValue::Keyed(members)) => {
            for (member_name, member) in members {
                append_har_value(target, member_name, Some(member), None);
            }
        }
        Some(FormattedValue::Scalar(text)) => {
            log::trace!("Appending {name}={text}");
            target.push(HarParam::new(name, text.as_str()).with_metadata(metadata));
        }
    }
}

#[cfg(test)]
mod test {
    use crate::flatten::{FormattedValue, append_har_value};
    use crate::types::har::{FileMetadata, HarParam};
    use crate::types::value::RuntimeValue;
    use serde_json::json;

    #[test]
    fn test_undefined_is_dropped() {
        let mut target = vec![];
        append_har_value(&mut target, "a", None, None);
        assert!(target.is_empty());
        assert!(FormattedValue::from_runtime(&RuntimeValue::Undefined).is_none());
    }

    #[test]
    fn test_list_repeats_name() {
        let mut target = vec![];
        let value = FormattedValue::from_runtime(&RuntimeValue::from(json!(["blue", "black"])));
        append_har_value(&mut target, "color", value.as_ref(), None);
        assert_eq!(
            target,
            vec![HarParam::new("color", "blue"), HarParam::new("color", "black")]
        );
    }

    #[test]
    fn test_keyed_uses_member_names() {
        let mut target = vec![];
        let value = FormattedValue::from_runtime(&RuntimeValue::from(json!({"R": 100, "G": null})));
        append_har_value(&mut target, "color", value.as_ref(), None);
        assert_eq!(target, vec![HarParam::new("R", "100"), HarParam::new("G", "null")]);
    }

    #[test]
    fn test_nested_values_flatten_recursively() {
        let mut target = vec![];
        let value = FormattedValue::Keyed(vec![(
            "a".to_string(),
            FormattedValue::List(vec!["1".into(), "2".into()]),
        )]);
        append_har_value(&mut target, "ignored", Some(&value), None);
        assert_eq!(target, vec![HarParam::new("a", "1"), HarParam::new("a", "2")]);
    }

    #[test]
    fn test_metadata_attached_to_scalar() {
        let mut target = vec![];
        let metadata = FileMetadata {
            file_name: Some("owlbert.png".to_string()),
            content_type: Some("image/png".to_string()),
        };
        append_har_value(&mut target, "file", Some(&"data:...".into()), Some(&metadata));
        assert_eq!(target[0].file_name.as_deref(), Some("owlbert.png"));
        assert_eq!(target[0].content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(FormattedValue::from("a").to_text(), "a");
        let value = FormattedValue::from_runtime(&RuntimeValue::from(json!([1, 2]))).unwrap();
        assert_eq!(value.to_text(), "1,2");
        let value = FormattedValue::from_runtime(&RuntimeValue::from(json!({"a": 1}))).unwrap();
        assert_eq!(value.to_text(), "a,1");
    }
}
