use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode_byte, utf8_percent_encode};

/// RFC 3986 reserved characters.
const RESERVED_CHARACTERS: &str = ":/?#[]@!$&'()*+,;=";

/// Everything `encodeURIComponent` escapes.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How aggressively disallowed characters are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    /// Leave the string untouched.
    Off,
    /// Percent-encode everything outside the unreserved set.
    Normal,
    /// Like `Normal`, but reserved characters are left alone.
    Unsafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub escape: EscapeMode,
    /// Return the input as-is when it already looks percent-encoded.
    pub return_if_encoded: bool,
    pub allow_reserved: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            escape: EscapeMode::Normal,
            return_if_encoded: false,
            allow_reserved: false,
        }
    }
}

fn is_unreserved(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '.' | '_' | '~')
}

fn is_reserved(character: char) -> bool {
    RESERVED_CHARACTERS.contains(character)
}

/// Every `%` must introduce two hex digits for the string to count as encoded.
fn has_malformed_escape(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let valid = bytes.len() > index + 2
                && bytes[index + 1].is_ascii_hexdigit()
                && bytes[index + 2].is_ascii_hexdigit();
            if !valid {
                return true;
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    false
}

/// Whether percent-decoding `input` yields a different string.
///
/// A malformed escape sequence, or one that does not decode to UTF-8, is
/// treated as "not encoded".
pub fn is_already_encoded(input: &str) -> bool {
    if has_malformed_escape(input) {
        return false;
    }
    match percent_decode_str(input).decode_utf8() {
        Ok(decoded) => decoded != input,
        Err(_) => false,
    }
}

/// Percent-encodes `input` one code point at a time, never double-encoding
/// a value when `return_if_encoded` is set.
pub fn encode_disallowed_characters(input: &str, options: EncodeOptions) -> String {
    if options.return_if_encoded && is_already_encoded(input) {
        return input.to_string();
    }
    if options.escape == EscapeMode::Off {
        return input.to_string();
    }

    let keep_reserved = options.escape == EscapeMode::Unsafe || options.allow_reserved;
    let mut encoded = String::with_capacity(input.len());
    let mut buffer = [0u8; 4];
    for character in input.chars() {
        if is_unreserved(character) || (keep_reserved && is_reserved(character)) {
            encoded.push(character);
        } else {
            for byte in character.encode_utf8(&mut buffer).bytes() {
                encoded.push_str(percent_encode_byte(byte));
            }
        }
    }
    encoded
}

/// Encodes a value the way `encodeURIComponent` does.
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}
