//! Character reference resolution over the HTML5 named-reference table.

use std::borrow::Cow;

/// Longest name in the HTML5 table is `CounterClockwiseContourIntegral`.
const MAX_NAME_LEN: usize = 32;

/// Characters a reference name (without `&`/`;`) stands for.
///
/// Accepts named (`eacute`, `DoubleRightArrow`) and numeric (`#233`,
/// `#xE9`) forms. A few named references expand to two code points.
pub fn resolve(name: &str) -> Option<String> {
    let plausible = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
    if !plausible {
        return None;
    }

    let reference = format!("&{name};");
    match html_escape::decode_html_entities(&reference) {
        Cow::Owned(decoded) if decoded != reference && decoded.chars().count() <= 2 => {
            Some(decoded)
        }
        _ => None,
    }
}

/// Decode every character reference of `text`.
pub fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
