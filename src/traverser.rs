use crate::style::Style;
use crate::types::json_path::JsonPath;
use crate::types::operation::Operation;
use crate::types::{Parameter, ParameterLocation};
use crate::{
    ALLOW_RESERVED_FIELD, COMPONENTS_FIELD, CONTENT_FIELD, EXPLODE_FIELD, IN_FIELD, NAME_FIELD,
    PARAMETERS_FIELD, PATHS_FIELD, REF_FIELD, REQUEST_BODY_FIELD, REQUIRED_FIELD, RESPONSES_FIELD,
    SCHEMA_FIELD, SECURITY_FIELD, SECURITY_SCHEMES_FIELD, STYLE_FIELD,
};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

type TraverseSearchResult<'a> = Result<SearchResult<'a>, TraverserError<'a>>;
type TraverseTypeResult<'a, T> = Result<&'a T, TraverserError<'a>>;
type FindOperationResult<'a> = Result<Arc<Operation>, TraverserError<'a>>;

/// Extensions may be nested under this object instead of carrying an `x-` prefix.
const README_EXTENSIONS: &str = "x-readme";

/// References nested deeper than this are left unresolved.
const MAX_RESOLVE_DEPTH: usize = 64;

/// Error types that can occur during OpenAPI specification traversal.
///
/// This enum represents various error conditions that may arise when
/// navigating through an OpenAPI document and building operations from it.
#[derive(Debug)]
pub enum TraverserError<'a> {
    /// A required field was not found in the specification.
    MissingField(Cow<'a, str>),

    /// The found type does not match the expected type.
    TypeMismatch {
        expected: Cow<'a, str>,
        found: Cow<'a, str>,
    },

    /// The structure of the specification is invalid or contains logical errors.
    InvalidStructure(Cow<'a, str>),

    /// A circular reference was detected in the specification.
    CyclicReference(Cow<'a, str>),

    /// A specified path does not exist in the specification.
    PathNotFound(Cow<'a, str>),
}

impl<'a> TraverserError<'a> {
    /// Creates a new `MissingField` error.
    ///
    /// # Parameters
    /// - `message`: The field name or description that was missing
    #[inline]
    pub(crate) fn missing_field(message: impl Into<Cow<'a, str>>) -> Self {
        Self::MissingField(message.into())
    }

    /// Creates a new `TypeMismatch` error.
    ///
    /// # Parameters
    /// - `expected`: The expected type description
    /// - `found`: The actual type that was found
    #[inline]
    pub(crate) fn type_mismatch(
        expected: impl Into<Cow<'a, str>>,
        found: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new `InvalidStructure` error.
    ///
    /// # Parameters
    /// - `message`: Description of the structural issue
    #[inline]
    pub(crate) fn invalid_structure(message: impl Into<Cow<'a, str>>) -> Self {
        Self::InvalidStructure(message.into())
    }

    /// Creates a new `CyclicReference` error.
    ///
    /// # Parameters
    /// - `message`: Description of the circular reference
    #[inline]
    pub(crate) fn cyclic_reference(message: impl Into<Cow<'a, str>>) -> Self {
        Self::CyclicReference(message.into())
    }

    /// Creates a new `PathNotFound` error.
    ///
    /// # Parameters
    /// - `message`: The path that could not be found
    #[inline]
    pub(crate) fn path_not_found(message: impl Into<Cow<'a, str>>) -> Self {
        Self::PathNotFound(message.into())
    }

    /// Detaches the error from the document it was raised against.
    pub(crate) fn into_owned(self) -> TraverserError<'static> {
        let owned = |message: Cow<'a, str>| Cow::Owned(message.into_owned());
        match self {
            TraverserError::MissingField(field) => TraverserError::MissingField(owned(field)),
            TraverserError::TypeMismatch { expected, found } => TraverserError::TypeMismatch {
                expected: owned(expected),
                found: owned(found),
            },
            TraverserError::InvalidStructure(field) => {
                TraverserError::InvalidStructure(owned(field))
            }
            TraverserError::CyclicReference(field) => TraverserError::CyclicReference(owned(field)),
            TraverserError::PathNotFound(field) => TraverserError::PathNotFound(owned(field)),
        }
    }
}

impl Display for TraverserError<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TraverserError::MissingField(field) => {
                write!(f, "Missing field: {}", field)
            }
            TraverserError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            TraverserError::InvalidStructure(field) => {
                write!(f, "Invalid structure: {}", field)
            }
            TraverserError::CyclicReference(field) => {
                write!(f, "Cyclic reference: {}", field)
            }
            TraverserError::PathNotFound(field) => {
                write!(f, "Path not found: {}", field)
            }
        }
    }
}

impl std::error::Error for TraverserError<'_> {}

/// Represents the result of a search operation within the OpenAPI specification.
///
/// This enum encapsulates different types of references that can be returned
/// from traversal operations, either as cached Arc references or direct references
#[derive(Debug)]
pub enum SearchResult<'a> {
    /// A search yielding a cached reference.
    Arc(Arc<Value>),

    /// A search result yielding a sub-node (no reference string)
    Ref(&'a Value),
}

impl<'a> SearchResult<'a> {
    /// Returns a reference to the underlying JSON value.
    ///
    /// # Returns
    /// A reference to the `Value` contained within this search result.
    pub fn value(&'a self) -> &'a Value {
        match self {
            SearchResult::Arc(arc_val) => arc_val,
            SearchResult::Ref(val) => val,
        }
    }
}

/// Read access to an OpenAPI document.
///
/// Builds [`Operation`]s with their parameters, request body and responses
/// dereferenced, and caches both resolved references and built operations.
pub struct OpenApiTraverser {
    specification: Value,
    resolved_references: DashMap<String, Arc<Value>>,
    resolved_operations: DashMap<(String, String), Arc<Operation>>,
}

impl OpenApiTraverser {
    /// Creates a new OpenAPI traverser from a specification document.
    ///
    /// # Parameters
    /// - `specification`: The complete OpenAPI specification as a JSON Value
    ///
    /// # Examples
    /// ```rust
    /// use serde_json::json;
    /// use oas_to_har::traverser::OpenApiTraverser;
    ///
    /// let spec = json!({
    ///     "openapi": "3.0.0",
    ///     "info": {"title": "API", "version": "1.0.0"},
    ///     "paths": {
    ///         "/users": {
    ///             "get": {"summary": "Get users"}
    ///         }
    ///     }
    /// });
    ///
    /// let traverser = OpenApiTraverser::new(spec);
    /// assert!(traverser.get_operation("/users", "GET").is_ok());
    /// ```
    pub fn new(specification: Value) -> Self {
        Self {
            specification,
            resolved_references: DashMap::new(),
            resolved_operations: DashMap::new(),
        }
    }

    /// Resolves a value using caching to avoid redundant computations.
    ///
    /// # Parameters
    /// - `cache`: The cache to use for storing/retrieving values
    /// - `key`: The key to cache the result under
    /// - `resolver`: Function to compute the value if not cached
    ///
    /// # Returns
    /// The resolved value wrapped in Arc, either from cache or newly computed.
    ///
    /// # Behavior
    /// The cache is not locked while `resolver` runs, so resolvers may consult
    /// the same cache.
    fn resolve_with_cache<'a, K, V, F>(
        cache: &DashMap<K, Arc<V>>,
        key: K,
        resolver: F,
    ) -> Result<Arc<V>, TraverserError<'a>>
    where
        K: Eq + Hash,
        F: FnOnce() -> Result<Arc<V>, TraverserError<'a>>,
    {
        if let Some(found) = cache.get(&key) {
            return Ok(Arc::clone(found.value()));
        }
        let result = resolver()?;
        cache.insert(key, result.clone());
        Ok(result)
    }

    /// Returns a reference to the underlying OpenAPI specification.
    ///
    /// # Returns
    /// A reference to the complete specification JSON value.
    pub fn specification(&self) -> &Value {
        &self.specification
    }

    /// Finds the operation declared under an exact path template and method.
    ///
    /// # Parameters
    /// - `path`: The path template as written in the document (e.g., "/pets/{id}")
    /// - `method`: The HTTP method (case-insensitive, e.g., "GET", "post")
    ///
    /// # Returns
    /// An `Arc<Operation>` with path-level parameters merged in and every
    /// `$ref` below the operation resolved.
    ///
    /// # Examples
    /// ```rust
    /// use serde_json::json;
    /// use oas_to_har::traverser::OpenApiTraverser;
    ///
    /// let spec = json!({
    ///     "paths": {
    ///         "/users/{id}": {
    ///             "get": {
    ///                 "parameters": [
    ///                     {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
    ///                 ]
    ///             }
    ///         }
    ///     }
    /// });
    /// let traverser = OpenApiTraverser::new(spec);
    /// let operation = traverser.get_operation("/users/{id}", "GET").unwrap();
    /// assert_eq!(operation.parameters().len(), 1);
    /// ```
    ///
    /// # Behavior
    /// Results are cached. Returns a `PathNotFound` error if the document has no
    /// such path or method.
    pub fn get_operation<'a>(&self, path: &'a str, method: &str) -> FindOperationResult<'a> {
        let method = method.to_lowercase();
        Self::resolve_with_cache(
            &self.resolved_operations,
            (String::from(path), method.clone()),
            || match self.build_operation(path, &method) {
                Ok(operation) => Ok(Arc::new(operation)),
                Err(e) => Err(e.into_owned()),
            },
        )
    }

    /// Like [`OpenApiTraverser::get_operation`], but a path or method missing from
    /// the document yields [`Operation::empty`].
    pub fn operation_or_empty(&self, path: &str, method: &str) -> Arc<Operation> {
        match self.get_operation(path, method) {
            Ok(operation) => operation,
            Err(e) => {
                log::debug!("Using an empty operation: {e}");
                Arc::new(Operation::empty())
            }
        }
    }

    /// Assembles an operation from its path item.
    fn build_operation(&self, path: &str, method: &str) -> Result<Operation, TraverserError<'_>> {
        let paths = Self::get_as_object(&self.specification, PATHS_FIELD)?;
        let path_item = match paths.get(path) {
            None => return Err(TraverserError::path_not_found(path.to_string())),
            Some(path_item) => self.resolve_deep(path_item, &mut vec![], 0),
        };
        let data = match path_item.get(method) {
            Some(data) if data.is_object() => data.clone(),
            _ => return Err(TraverserError::path_not_found(format!("{method} {path}"))),
        };
        log::debug!("Building operation {method} {path}");

        let mut pointer = JsonPath::new();
        pointer.add(PATHS_FIELD).add(path).add(method);

        Ok(Operation {
            path: path.to_string(),
            method: method.to_string(),
            parameters: Self::merge_parameters(&path_item, &data),
            request_body: Self::request_body_content(&data),
            responses: Self::responses(&data),
            security: self.security_requirements(&data),
            pointer,
            data,
        })
    }

    /// Operation parameters followed by the path-level parameters they do not
    /// override. Parameters that cannot be read are skipped.
    fn merge_parameters(path_item: &Value, operation: &Value) -> Vec<Parameter> {
        let parse_all = |node: &Value| -> Vec<Parameter> {
            let declared = match Self::get_as_array(node, PARAMETERS_FIELD) {
                Ok(declared) => declared,
                Err(_) => return vec![],
            };
            declared
                .iter()
                .filter_map(|parameter| match Self::parse_parameter(parameter) {
                    Ok(parameter) => Some(parameter),
                    Err(e) => {
                        log::debug!("Skipping parameter: {e}");
                        None
                    }
                })
                .collect()
        };

        let mut parameters = parse_all(operation);
        for shared in parse_all(path_item) {
            let overridden = parameters.iter().any(|parameter| {
                parameter.name == shared.name && parameter.location == shared.location
            });
            if !overridden {
                parameters.push(shared);
            }
        }
        parameters
    }

    /// Reads a parameter object. Unknown styles fall back to the location default.
    fn parse_parameter(node: &Value) -> Result<Parameter, TraverserError<'_>> {
        let name = Self::get_as_str(node, NAME_FIELD)?;
        let location = Self::get_as_str(node, IN_FIELD)?;
        let location = match ParameterLocation::from_str(location) {
            Ok(location) => location,
            Err(e) => {
                return Err(TraverserError::invalid_structure(format!(
                    "unknown parameter location {e}"
                )));
            }
        };

        let optional_bool = |field: &str| match node.get(field) {
            None => Ok(None),
            Some(flag) => Self::require_bool(flag).map(Some),
        };

        let mut parameter = Parameter::new(name, location)
            .required(optional_bool(REQUIRED_FIELD)?.unwrap_or(false))
            .allow_reserved(optional_bool(ALLOW_RESERVED_FIELD)?.unwrap_or(false));
        if let Some(explode) = optional_bool(EXPLODE_FIELD)? {
            parameter = parameter.explode(explode);
        }
        if let Ok(style) = Self::get_as_str(node, STYLE_FIELD) {
            match Style::from_str(style) {
                Ok(style) => parameter = parameter.style(style),
                Err(e) => log::debug!("Ignoring style of {name}: {e}"),
            }
        }
        if let Some(schema) = node.get(SCHEMA_FIELD) {
            parameter = parameter.schema(schema.clone());
        }
        Ok(parameter)
    }

    fn request_body_content(operation: &Value) -> Option<IndexMap<String, Value>> {
        let request_body = operation.get(REQUEST_BODY_FIELD)?;
        let content = Self::get_as_object(request_body, CONTENT_FIELD).ok()?;
        Some(
            content
                .iter()
                .map(|(media_type, media)| (media_type.clone(), media.clone()))
                .collect(),
        )
    }

    fn responses(operation: &Value) -> Vec<(String, Value)> {
        match Self::get_as_object(operation, RESPONSES_FIELD) {
            Ok(responses) => responses
                .iter()
                .map(|(status, response)| (status.clone(), response.clone()))
                .collect(),
            Err(_) => vec![],
        }
    }

    /// The scheme names of each security requirement, taken from the
    /// operation or, when it declares none, from the document root.
    fn security_requirements(&self, operation: &Value) -> Vec<Vec<String>> {
        let requirements = match Self::get_as_array(operation, SECURITY_FIELD) {
            Ok(requirements) => requirements,
            Err(_) => match Self::get_as_array(&self.specification, SECURITY_FIELD) {
                Ok(requirements) => requirements,
                Err(_) => return vec![],
            },
        };
        requirements
            .iter()
            .filter_map(Value::as_object)
            .map(|requirement| requirement.keys().cloned().collect())
            .collect()
    }

    /// Looks up `components.securitySchemes.<name>`.
    ///
    /// # Returns
    /// `None` when the scheme is missing or is itself a `$ref`.
    pub fn security_scheme(&self, name: &str) -> Option<&Value> {
        let schemes = Self::get_as_object(&self.specification, COMPONENTS_FIELD)
            .ok()?
            .get(SECURITY_SCHEMES_FIELD)?;
        let scheme = schemes.get(name)?;
        if scheme.get(REF_FIELD).is_some() {
            return None;
        }
        Some(scheme)
    }

    /// Reads an extension from the operation, then from the document root.
    ///
    /// # Parameters
    /// - `name`: The extension name without prefix (e.g., "proxy-enabled")
    /// - `operation`: The operation to check first
    ///
    /// # Behavior
    /// At each level `x-readme.<name>` is preferred over `x-<name>`.
    pub fn extension<'s>(&'s self, name: &str, operation: &'s Operation) -> Option<&'s Value> {
        let prefixed = format!("x-{name}");
        [operation.data(), &self.specification]
            .into_iter()
            .find_map(|node| {
                node.get(README_EXTENSIONS)
                    .and_then(|extensions| extensions.get(name))
                    .or_else(|| node.get(&prefixed))
            })
    }

    /// Returns a copy of `node` with every `$ref` replaced by its target.
    ///
    /// # Parameters
    /// - `node`: The JSON node to resolve
    /// - `trail`: References currently being expanded, for cycle detection
    /// - `depth`: Current nesting depth
    ///
    /// # Behavior
    /// References that are cyclic, dangling, or nested too deep are kept
    /// as-is.
    fn resolve_deep(&self, node: &Value, trail: &mut Vec<String>, depth: usize) -> Value {
        if depth >= MAX_RESOLVE_DEPTH {
            log::warn!("Not resolving references nested deeper than {MAX_RESOLVE_DEPTH} levels");
            return node.clone();
        }
        match node {
            Value::Object(members) => {
                if let Ok(reference) = Self::get_as_str(node, REF_FIELD) {
                    if trail.iter().any(|seen| seen == reference) {
                        log::debug!("Leaving cyclic reference {reference} unresolved");
                        return node.clone();
                    }
                    return match self.resolve_possible_ref(node) {
                        Ok(resolved) => {
                            trail.push(reference.to_string());
                            let resolved = self.resolve_deep(resolved.value(), trail, depth + 1);
                            trail.pop();
                            resolved
                        }
                        Err(e) => {
                            log::debug!("Leaving reference {reference} unresolved: {e}");
                            node.clone()
                        }
                    };
                }
                let mut resolved = Map::new();
                for (key, member) in members {
                    resolved.insert(key.clone(), self.resolve_deep(member, trail, depth + 1));
                }
                Value::Object(resolved)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_deep(item, trail, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Resolves a JSON node that might contain a $ref reference.
    ///
    /// # Parameters
    /// - `node`: The JSON node to potentially resolve
    ///
    /// # Returns
    /// A `SearchResult` containing either the original node or the resolved reference.
    fn resolve_possible_ref<'node>(&'node self, node: &'node Value) -> TraverseSearchResult<'node> {
        if let Ok(ref_string) = Self::get_as_str(node, REF_FIELD) {
            let result = Self::resolve_with_cache(
                &self.resolved_references,
                String::from(ref_string),
                || {
                    let mut seen_references = HashSet::new();
                    let result = self.get_reference_path(ref_string, &mut seen_references)?;
                    Ok(match result {
                        SearchResult::Arc(val) => val,
                        SearchResult::Ref(val) => Arc::new(val.clone()),
                    })
                },
            )?;
            return Ok(SearchResult::Arc(result));
        }
        Ok(SearchResult::Ref(node))
    }

    /// Follows a chain of references with circular reference detection.
    ///
    /// # Parameters
    /// - `ref_string`: The reference string to resolve (e.g., "#/components/schemas/User")
    /// - `seen_references`: Set of already seen references for cycle detection
    ///
    /// # Returns
    /// The first node along the chain that is not itself a reference, or an
    /// error if the reference is dangling or circular.
    fn get_reference_path<'node>(
        &'node self,
        ref_string: &'node str,
        seen_references: &mut HashSet<&'node str>,
    ) -> TraverseSearchResult<'node> {
        if !seen_references.insert(ref_string) {
            return Err(TraverserError::cyclic_reference(ref_string));
        }
        let pointer = JsonPath::from_reference(ref_string).format_pointer();
        let found = match self.specification.pointer(&pointer) {
            None => return Err(TraverserError::missing_field(ref_string)),
            Some(found) => found,
        };
        match Self::get_as_str(found, REF_FIELD) {
            Ok(next) => self.get_reference_path(next, seen_references),
            Err(_) => Ok(SearchResult::Ref(found)),
        }
    }

    /// Generic helper for extracting typed values from JSON nodes.
    ///
    /// # Parameters
    /// - `node`: The JSON node containing the field
    /// - `field`: The field name to extract
    /// - `converter`: Function to convert the raw Value to the desired type
    ///
    /// # Returns
    /// A reference to the converted type or a TraverserError.
    fn get_as_type<'n, 's, T, F>(
        node: &'n Value,
        field: &'n str,
        converter: F,
    ) -> TraverseTypeResult<'s, T>
    where
        'n: 's,
        T: ?Sized,
        F: Fn(&'n Value) -> TraverseTypeResult<'s, T>,
    {
        match node.get(field) {
            None => Err(TraverserError::missing_field(field)),
            Some(found) => converter(found),
        }
    }

    /// Generic helper for requiring specific types with proper error messages.
    ///
    /// # Parameters
    /// - `node`: The JSON node to convert
    /// - `converter`: Function that attempts the type conversion
    /// - `type_name`: Name of the expected type for error reporting
    ///
    /// # Returns
    /// The converted value or a type mismatch error.
    fn require_type<'n, 's, T, F>(
        node: &'n Value,
        converter: F,
        type_name: &'static str,
    ) -> Result<T, TraverserError<'s>>
    where
        'n: 's,
        F: Fn(&'n Value) -> Option<T>,
    {
        converter(node).ok_or(TraverserError::type_mismatch(
            type_name,
            format!("{}", node),
        ))
    }

    /// Extracts a string field from a JSON node.
    ///
    /// # Parameters
    /// - `node`: The JSON node containing the field
    /// - `field`: The field name to extract as a string
    ///
    /// # Returns
    /// A reference to the string value or a TraverserError.
    pub(crate) fn get_as_str<'n, 's>(node: &'n Value, field: &'n str) -> TraverseTypeResult<'s, str>
    where
        'n: 's,
    {
        Self::get_as_type(node, field, Self::require_str)
    }

    /// Extracts an object field from a JSON node.
    ///
    /// # Parameters
    /// - `node`: The JSON node containing the field
    /// - `field`: The field name to extract as an object
    ///
    /// # Returns
    /// A reference to the object (Map) or a TraverserError.
    pub(crate) fn get_as_object<'n, 's>(
        node: &'n Value,
        field: &'n str,
    ) -> TraverseTypeResult<'s, Map<String, Value>>
    where
        'n: 's,
    {
        Self::get_as_type(node, field, Self::require_object)
    }

    /// Extracts an array field from a JSON node.
    ///
    /// # Parameters
    /// - `node`: The JSON node containing the field
    /// - `field`: The field name to extract as an array
    ///
    /// # Returns
    /// A reference to the array (Vec) or a TraverserError.
    pub(crate) fn get_as_array<'n, 's>(
        node: &'n Value,
        field: &'n str,
    ) -> TraverseTypeResult<'s, Vec<Value>>
    where
        'n: 's,
    {
        Self::get_as_type(node, field, Self::require_array)
    }

    /// Requires a JSON value to be a boolean.
    ///
    /// # Parameters
    /// - `node`: The JSON value to convert
    ///
    /// # Returns
    /// The boolean value or a type mismatch error.
    pub(crate) fn require_bool<'n, 's>(node: &'n Value) -> Result<bool, TraverserError<'s>>
    where
        'n: 's,
    {
        Self::require_type(node, Value::as_bool, "bool")
    }

    /// Requires a JSON value to be a string.
    pub(crate) fn require_str<'n, 's>(node: &'n Value) -> TraverseTypeResult<'s, str>
    where
        'n: 's,
    {
        Self::require_type(node, Value::as_str, "string")
    }

    /// Requires a JSON value to be an object.
    pub(crate) fn require_object<'n, 's>(
        node: &'n Value,
    ) -> TraverseTypeResult<'s, Map<String, Value>>
    where
        'n: 's,
    {
        Self::require_type(node, Value::as_object, "object")
    }

    /// Requires a JSON value to be an array.
    pub(crate) fn require_array<'n, 's>(node: &'n Value) -> TraverseTypeResult<'s, Vec<Value>>
    where
        'n: 's,
    {
        Self::require_type(node, Value::as_array, "array")
    }
}
