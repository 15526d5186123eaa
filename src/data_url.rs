const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64";
const NAME_PARAMETER: &str = "name";

/// The parts of a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub content_type: Option<String>,
    /// The `name=` parameter, kept exactly as written.
    pub name: Option<String>,
}

/// Parses `input` as a data URL, `None` if it is not one.
///
/// Accepts `data:[<type>/<subtype>][;<key>=<value>]*[;base64],<data>`.
pub fn parse(input: &str) -> Option<DataUrl> {
    let input = input.trim();
    if input.len() < DATA_SCHEME.len() || !input[..DATA_SCHEME.len()].eq_ignore_ascii_case(DATA_SCHEME) {
        return None;
    }
    let (header, _) = input[DATA_SCHEME.len()..].split_once(',')?;

    let mut segments = header.split(';');
    let content_type = match segments.next() {
        None | Some("") => None,
        Some(media_type) => {
            let (kind, subtype) = media_type.split_once('/')?;
            if kind.is_empty() || subtype.is_empty() || media_type.contains(char::is_whitespace) {
                return None;
            }
            Some(media_type.to_lowercase())
        }
    };

    let mut name = None;
    for segment in segments {
        if segment.eq_ignore_ascii_case(BASE64_MARKER) {
            continue;
        }
        let (key, value) = segment.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        if name.is_none() && key.eq_ignore_ascii_case(NAME_PARAMETER) {
            name = Some(value.to_string());
        }
    }

    Some(DataUrl { content_type, name })
}
