use crate::types::ParameterLocation;
use crate::types::value::RuntimeValue;
use indexmap::IndexMap;
use serde_json::Value;

pub type ValueMap = IndexMap<String, RuntimeValue>;

const PATH_KEY: &str = "path";
const QUERY_KEY: &str = "query";
const HEADER_KEY: &str = "header";
const COOKIE_KEY: &str = "cookie";
const BODY_KEY: &str = "body";
const FORM_DATA_KEY: &str = "formData";
const SERVER_KEY: &str = "server";
const SELECTED_KEY: &str = "selected";
const VARIABLES_KEY: &str = "variables";

/// Which server entry to build the base URL from, and the variables to fill it with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerSelection {
    pub selected: usize,
    pub variables: ValueMap,
}

/// Values supplied by the caller, one bucket per parameter location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataForHar {
    pub path: ValueMap,
    pub query: ValueMap,
    pub header: ValueMap,
    pub cookie: ValueMap,
    pub body: RuntimeValue,
    /// `application/x-www-form-urlencoded` payloads.
    pub form_data: ValueMap,
    pub server: Option<ServerSelection>,
}

impl DataForHar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the value buckets from a JSON document shaped like
    /// `{path: {}, query: {}, header: {}, cookie: {}, body, formData: {}, server: {selected, variables}}`.
    ///
    /// Unknown keys and buckets that are not objects are ignored.
    pub fn from_value(value: &Value) -> Self {
        let mut data = Self::new();
        data.path = Self::bucket(value, PATH_KEY);
        data.query = Self::bucket(value, QUERY_KEY);
        data.header = Self::bucket(value, HEADER_KEY);
        data.cookie = Self::bucket(value, COOKIE_KEY);
        data.form_data = Self::bucket(value, FORM_DATA_KEY);
        data.body = match value.get(BODY_KEY) {
            None => RuntimeValue::Undefined,
            Some(body) => RuntimeValue::from(body),
        };
        data.server = value.get(SERVER_KEY).map(|server| ServerSelection {
            selected: server
                .get(SELECTED_KEY)
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            variables: Self::bucket(server, VARIABLES_KEY),
        });
        data
    }

    fn bucket(value: &Value, key: &str) -> ValueMap {
        match value.get(key).and_then(Value::as_object) {
            None => ValueMap::new(),
            Some(map) => map
                .iter()
                .map(|(name, member)| (name.clone(), RuntimeValue::from(member)))
                .collect(),
        }
    }

    pub fn with(mut self, location: ParameterLocation, name: impl Into<String>, value: impl Into<RuntimeValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match location {
            ParameterLocation::Path => {
                self.path.insert(name, value);
            }
            ParameterLocation::Query => {
                self.query.insert(name, value);
            }
            ParameterLocation::Header => {
                self.header.insert(name, value);
            }
            ParameterLocation::Cookie => {
                self.cookie.insert(name, value);
            }
            ParameterLocation::Body => {
                if !matches!(self.body, RuntimeValue::Object(_)) {
                    self.body = RuntimeValue::Object(ValueMap::new());
                }
                if let RuntimeValue::Object(map) = &mut self.body {
                    map.insert(name, value);
                }
            }
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<RuntimeValue>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_form_data(mut self, name: impl Into<String>, value: impl Into<RuntimeValue>) -> Self {
        self.form_data.insert(name.into(), value.into());
        self
    }

    pub fn with_server(mut self, selected: usize, variables: ValueMap) -> Self {
        self.server = Some(ServerSelection {
            selected,
            variables,
        });
        self
    }

    /// The supplied value for `name` in the bucket for `location`.
    pub fn lookup(&self, location: ParameterLocation, name: &str) -> Option<&RuntimeValue> {
        match location {
            ParameterLocation::Path => self.path.get(name),
            ParameterLocation::Query => self.query.get(name),
            ParameterLocation::Header => self.header.get(name),
            ParameterLocation::Cookie => self.cookie.get(name),
            ParameterLocation::Body => self.body.get(name),
        }
    }

    /// Finds a supplied header by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&RuntimeValue> {
        self.header
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// A working copy with every value truncated to `max_depth` levels of nesting.
    pub(crate) fn bounded(&self, max_depth: usize) -> Self {
        let bound = |map: &ValueMap| -> ValueMap {
            map.iter()
                .map(|(name, value)| (name.clone(), value.bounded(max_depth)))
                .collect()
        };
        Self {
            path: bound(&self.path),
            query: bound(&self.query),
            header: bound(&self.header),
            cookie: bound(&self.cookie),
            body: self.body.bounded(max_depth),
            form_data: bound(&self.form_data),
            server: self.server.clone(),
        }
    }
}
