use crate::{ENCODED_BACKSLASH, ENCODED_TILDE, PATH_SEPARATOR, TILDE};

/// Segments of a JSON pointer into the API document, escaped as they are added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPath(pub Vec<String>);

impl JsonPath {
    pub fn new() -> Self {
        JsonPath(Vec::new())
    }

    /// Splits a local reference such as `#/components/schemas/Pet` into its segments.
    ///
    /// The segments are kept in their escaped form.
    pub fn from_reference(reference: &str) -> Self {
        JsonPath(
            reference
                .split(PATH_SEPARATOR)
                .filter(|segment| !segment.is_empty() && *segment != "#")
                .map(String::from)
                .collect(),
        )
    }

    pub fn add(&mut self, segment: impl AsRef<str>) -> &mut Self {
        let segment = segment.as_ref();
        if segment.contains(TILDE) || segment.contains(PATH_SEPARATOR) {
            let segment = segment
                .replace(TILDE, ENCODED_TILDE)
                .replace(PATH_SEPARATOR, ENCODED_BACKSLASH);
            self.0.push(segment);
        } else {
            self.0.push(segment.to_owned());
        }

        self
    }

    pub fn format_path(&self) -> String {
        self.0.join(PATH_SEPARATOR)
    }

    /// The path as an RFC 6901 pointer usable with [`serde_json::Value::pointer`].
    pub fn format_pointer(&self) -> String {
        let mut pointer = String::from(PATH_SEPARATOR);
        pointer.push_str(&self.format_path());
        pointer
    }
}
