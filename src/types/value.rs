use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::fmt::{Display, Formatter};

/// A user supplied value for a parameter or body property.
///
/// Unlike [`serde_json::Value`] this can represent a value that is absent
/// altogether (`Undefined`), which is distinct from an explicit `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RuntimeValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<RuntimeValue>),
    Object(IndexMap<String, RuntimeValue>),
}

impl RuntimeValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, RuntimeValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
    }

    /// Strings, numbers and booleans.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            RuntimeValue::String(_) | RuntimeValue::Number(_) | RuntimeValue::Bool(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RuntimeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, RuntimeValue>> {
        match self {
            RuntimeValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<RuntimeValue>> {
        match self {
            RuntimeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up an object member, `None` for anything that is not an object.
    pub fn get(&self, key: &str) -> Option<&RuntimeValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Primitives, or containers with at least one member.
    pub fn has_content(&self) -> bool {
        match self {
            RuntimeValue::Undefined | RuntimeValue::Null => false,
            RuntimeValue::Array(items) => !items.is_empty(),
            RuntimeValue::Object(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Returns a copy with every `Undefined` leaf removed.
    ///
    /// Object members that are `Undefined` are dropped, while `Undefined` array
    /// elements become `null` so positions are kept. Containers left empty after
    /// cleaning are removed from their parent, and `None` is returned when the
    /// value itself ends up empty.
    pub fn pruned(&self) -> Option<RuntimeValue> {
        match self {
            RuntimeValue::Undefined => None,
            RuntimeValue::Array(items) => {
                let cleaned: Vec<RuntimeValue> = items
                    .iter()
                    .filter_map(|item| match item {
                        RuntimeValue::Undefined => Some(RuntimeValue::Null),
                        RuntimeValue::Array(_) | RuntimeValue::Object(_) => item.pruned(),
                        other => Some(other.clone()),
                    })
                    .collect();
                if cleaned.is_empty() {
                    None
                } else {
                    Some(RuntimeValue::Array(cleaned))
                }
            }
            RuntimeValue::Object(map) => {
                let cleaned: IndexMap<String, RuntimeValue> = map
                    .iter()
                    .filter_map(|(key, member)| member.pruned().map(|m| (key.clone(), m)))
                    .collect();
                if cleaned.is_empty() {
                    None
                } else {
                    Some(RuntimeValue::Object(cleaned))
                }
            }
            other => Some(other.clone()),
        }
    }

    /// Returns a copy where containers nested deeper than `max_depth` are
    /// replaced with `Undefined`.
    pub fn bounded(&self, max_depth: usize) -> RuntimeValue {
        self.bounded_at(0, max_depth)
    }

    fn bounded_at(&self, depth: usize, max_depth: usize) -> RuntimeValue {
        match self {
            RuntimeValue::Array(_) | RuntimeValue::Object(_) if depth >= max_depth => {
                log::warn!("Dropping value nested deeper than {max_depth} levels");
                RuntimeValue::Undefined
            }
            RuntimeValue::Array(items) => RuntimeValue::Array(
                items
                    .iter()
                    .map(|item| item.bounded_at(depth + 1, max_depth))
                    .collect(),
            ),
            RuntimeValue::Object(map) => RuntimeValue::Object(
                map.iter()
                    .map(|(key, member)| (key.clone(), member.bounded_at(depth + 1, max_depth)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Converts to JSON the way `JSON.stringify` would see it: `Undefined` object
    /// members are skipped and `Undefined` array elements become `null`.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            RuntimeValue::Undefined => None,
            RuntimeValue::Null => Some(Value::Null),
            RuntimeValue::Bool(b) => Some(Value::Bool(*b)),
            RuntimeValue::Number(n) => Some(Value::Number(n.clone())),
            RuntimeValue::String(s) => Some(Value::String(s.clone())),
            RuntimeValue::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(Value::Null))
                    .collect(),
            )),
            RuntimeValue::Object(map) => {
                let mut object = Map::new();
                for (key, member) in map {
                    if let Some(member) = member.to_json() {
                        object.insert(key.clone(), member);
                    }
                }
                Some(Value::Object(object))
            }
        }
    }

    pub fn to_json_string(&self) -> Option<String> {
        self.to_json().map(|json| json.to_string())
    }
}

/// Renders the value as text. Missing and `null` array elements render as
/// empty strings, objects render as JSON.
impl Display for RuntimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeValue::Undefined => Ok(()),
            RuntimeValue::Null => write!(f, "null"),
            RuntimeValue::Bool(b) => write!(f, "{}", b),
            RuntimeValue::Number(n) => match n.as_f64() {
                Some(float) if n.is_f64() && float.fract() == 0.0 => write!(f, "{}", float),
                _ => write!(f, "{}", n),
            },
            RuntimeValue::String(s) => write!(f, "{}", s),
            RuntimeValue::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_null() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            RuntimeValue::Object(_) => match self.to_json_string() {
                Some(json) => write!(f, "{}", json),
                None => Ok(()),
            },
        }
    }
}

impl From<Value> for RuntimeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RuntimeValue::Null,
            Value::Bool(b) => RuntimeValue::Bool(b),
            Value::Number(n) => RuntimeValue::Number(n),
            Value::String(s) => RuntimeValue::String(s),
            Value::Array(items) => {
                RuntimeValue::Array(items.into_iter().map(RuntimeValue::from).collect())
            }
            Value::Object(map) => RuntimeValue::Object(
                map.into_iter()
                    .map(|(key, member)| (key, RuntimeValue::from(member)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for RuntimeValue {
    fn from(value: &Value) -> Self {
        RuntimeValue::from(value.clone())
    }
}

impl From<&str> for RuntimeValue {
    fn from(value: &str) -> Self {
        RuntimeValue::String(value.to_string())
    }
}

impl From<String> for RuntimeValue {
    fn from(value: String) -> Self {
        RuntimeValue::String(value)
    }
}
