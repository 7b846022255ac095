//! MathML string transforms.
//!
//! Everything here is a pure `&str -> String` function: conversion between the
//! XML and safe-XML alphabets, LaTeX annotation management, semantics
//! stripping and character reference normalization. None of these functions
//! parse the MathML; they work on substrings, which keeps them byte-exact on
//! round trips.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::charset::{BLACKBOARD_REPLACEMENTS, SAFE_XML, SAFE_XML_ENTITIES, XML};
use crate::entities;

/// Encoding name of the LaTeX annotation.
pub const LATEX_ENCODING: &str = "LaTeX";

const OPEN_ANNOTATION: &str = "<annotation";
const CLOSE_ANNOTATION: &str = "</annotation>";
const CLOSE_SEMANTICS: &str = "</semantics>";
const CLOSE_MATH: &str = "</math>";

/// Substrings that crash the accessibility service.
const CORRUPT_MATHML: [&str; 10] = [
    "\u{27E8}", "\u{27E9}", "\u{2329}", "\u{232A}", "<mstack", "<mscarries", "<mscarry",
    "<msgroup", "<msline", "<msrow",
];

/// Options for [`safe_xml_decode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Escape `<`, `>` and `&` operators left unencoded by the blackboard
    /// integration before decoding.
    pub blackboard: bool,
}

/// Replace every XML control character by its safe counterpart.
pub fn safe_xml_encode(input: &str) -> String {
    let mut output = input.to_string();
    for (xml, safe) in XML.pairs(&SAFE_XML) {
        output = output.replace(xml, safe.encode_utf8(&mut [0; 4]));
    }
    output
}

/// Inverse of [`safe_xml_encode`].
///
/// Runs three passes whose order matters: safe entity spellings are first
/// turned into safe characters (optionally fixing blackboard operators), safe
/// characters are then turned into XML characters, and finally `$name;`
/// pseudo-references written by old releases become `&name;`.
pub fn safe_xml_decode(input: &str, options: DecodeOptions) -> String {
    let mut output = input.to_string();

    for (entity, safe) in SAFE_XML_ENTITIES {
        output = output.replace(entity, safe.encode_utf8(&mut [0; 4]));
    }

    if options.blackboard {
        for (bad, good) in BLACKBOARD_REPLACEMENTS {
            output = output.replace(bad, good);
        }
    }

    for (safe, xml) in SAFE_XML.pairs(&XML) {
        output = output.replace(safe, xml.encode_utf8(&mut [0; 4]));
    }

    restore_dollar_entities(&output)
}

fn is_entity_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '#' | '.' | '_' | '-')
}

/// `$name;` becomes `&name;`. A `$` run interrupted by any character that
/// cannot belong to a reference name is emitted as-is and the interrupting
/// character is scanned again.
fn restore_dollar_entities(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut entity: Option<String> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match entity.take() {
            None => {
                if c == '$' {
                    entity = Some(String::new());
                } else {
                    output.push(c);
                }
            }
            Some(mut name) => {
                if c == ';' {
                    output.push('&');
                    output.push_str(&name);
                    output.push(';');
                } else if is_entity_char(c) {
                    name.push(c);
                    entity = Some(name);
                } else {
                    output.push('$');
                    output.push_str(&name);
                    // Parse the current character again.
                    continue;
                }
            }
        }
        i += 1;
    }

    if let Some(name) = entity {
        output.push('$');
        output.push_str(&name);
    }
    output
}

/// Whether position `i` of `content` lies inside an attribute value of an
/// `<img>` tag, e.g. the MathML serialized in a formula image attribute.
pub fn is_mathml_in_attribute(content: &str, i: usize) -> bool {
    // Matched against the reversed prefix: `"=name ... gmi<` is `<img ... name="`.
    static IN_ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r#"^['"][\s]*=[\s]*[\w-]+([\s]*("[^"]*"|'[^']*')[\s]*=[\s]*[\w-]+[\s]*)*[\s]+gmi<"#,
        )
        .expect("valid attribute regex")
    });

    let Some(prefix) = content.get(..i) else {
        return false;
    };
    let reversed: String = prefix.chars().rev().collect();
    IN_ATTRIBUTE_RE.is_match(&reversed)
}

/// Add an `<annotation encoding="{encoding}">` holding `content`.
///
/// The result always has a `<semantics>` wrapper: an existing one receives
/// the new annotation before its close tag, an empty `<math>` gets a fresh
/// wrapper, and otherwise the current children are wrapped in `<mrow>`.
pub fn add_annotation(mathml: &str, content: &str, encoding: &str) -> String {
    let annotation = format!(r#"<annotation encoding="{encoding}">{content}</annotation>"#);

    if mathml.contains(OPEN_ANNOTATION) {
        if let Some(close) = mathml.find(CLOSE_SEMANTICS) {
            return format!("{}{}{}", &mathml[..close], annotation, &mathml[close..]);
        }
    }

    if is_empty(mathml) {
        let end = match (mathml.find('>'), mathml.find("/>")) {
            (Some(close), Some(inline)) if inline + 1 == close => inline,
            (Some(close), _) => close,
            (None, _) => mathml.len(),
        };
        return format!(
            "{}><semantics>{}</semantics>{}",
            &mathml[..end],
            annotation,
            CLOSE_MATH
        );
    }

    let begin = mathml.find('>').map_or(0, |i| i + 1);
    let end = mathml.rfind(CLOSE_MATH).unwrap_or(mathml.len()).max(begin);
    format!(
        "{}<semantics><mrow>{}</mrow>{}</semantics>{}",
        &mathml[..begin],
        &mathml[begin..end],
        annotation,
        CLOSE_MATH
    )
}

/// Remove the annotation with the given encoding.
///
/// When other annotations remain only the matching element is spliced out;
/// when it was the last one the semantics wrapper goes too.
pub fn remove_annotation(mathml: &str, encoding: &str) -> String {
    let open = format!(r#"<annotation encoding="{encoding}">"#);
    let Some(start) = mathml.find(&open) else {
        return mathml.to_string();
    };

    let has_other = mathml
        .match_indices(OPEN_ANNOTATION)
        .any(|(index, _)| index != start);

    if !has_other {
        return remove_semantics(mathml);
    }

    match mathml[start..].find(CLOSE_ANNOTATION) {
        Some(offset) => {
            let end = start + offset + CLOSE_ANNOTATION.len();
            format!("{}{}", &mathml[..start], &mathml[end..])
        }
        None => mathml.to_string(),
    }
}

/// Strip the `<semantics>` wrapper, its inner `<mrow>` and the annotation
/// block that closes it.
///
/// With several annotations only the run up to the first `</semantics>` is
/// removed.
pub fn remove_semantics(mathml: &str) -> String {
    static OPEN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"<semantics>(<mrow>)?").expect("valid semantics regex"));
    static CLOSE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(</mrow>)?<annotation[\W\w]*?</semantics>").expect("valid annotation regex")
    });

    let without_open = OPEN_RE.replace(mathml, "");
    CLOSE_RE.replace(&without_open, "").into_owned()
}

/// `<math/>` and `<math></math>` (with an optional namespace prefix) are empty.
pub fn is_empty(mathml: &str) -> bool {
    static CLOSE_MATH_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"</(.+:)?math>").expect("valid math close regex"));

    let Some(first_close) = mathml.find('>') else {
        return false;
    };
    if mathml.find("/>").is_some_and(|inline| inline + 1 == first_close) {
        return true;
    }

    CLOSE_MATH_RE
        .find(mathml)
        .is_some_and(|close| close.start() == first_close + 1)
}

/// Whether the first `class` attribute of `mathml` mentions `class_name`.
///
/// Plain substring search from `class` up to the end of its tag.
pub fn contain_class(mathml: &str, class_name: &str) -> bool {
    let Some(class_index) = mathml.find("class") else {
        return false;
    };
    let tag_end = mathml[class_index..]
        .find('>')
        .map_or(mathml.len(), |i| class_index + i);
    mathml[class_index..tag_end].contains(class_name)
}

/// MathML known to break the accessibility service.
pub fn is_corrupt_mathml(mathml: &str) -> bool {
    CORRUPT_MATHML.iter().any(|token| mathml.contains(token))
}

/// Payload of the LaTeX annotation, if present.
pub fn latex_annotation(mathml: &str) -> Option<&str> {
    let open = format!(r#"<annotation encoding="{LATEX_ENCODING}">"#);
    let start = mathml.find(&open)? + open.len();
    let end = start + mathml[start..].find(CLOSE_ANNOTATION)?;
    Some(&mathml[start..end])
}

/// Replace every non-ASCII character and every named reference by a decimal
/// numeric character reference.
pub fn mathml_entities(mathml: &str) -> String {
    let mut output = String::with_capacity(mathml.len());
    let mut rest = mathml;

    while let Some(c) = rest.chars().next() {
        if (c as u32) > 128 {
            output.push_str(&format!("&#{};", c as u32));
            rest = &rest[c.len_utf8()..];
        } else if c == '&' {
            match numeric_reference(rest) {
                Some((reference, consumed)) => {
                    output.push_str(&reference);
                    rest = &rest[consumed..];
                }
                None => {
                    output.push('&');
                    rest = &rest[1..];
                }
            }
        } else {
            output.push(c);
            rest = &rest[1..];
        }
    }
    output
}

/// `&name;` at the start of `text` as `&#N;` references, with the bytes
/// consumed.
///
/// Unknown names are returned unchanged.
fn numeric_reference(text: &str) -> Option<(String, usize)> {
    let end = text[1..].find(';')? + 1;
    let name = &text[1..end];
    let reference = match entities::resolve(name) {
        Some(chars) => chars.chars().map(|c| format!("&#{};", c as u32)).collect(),
        None => text[..=end].to_string(),
    };
    Some((reference, end + 1))
}

/// Turn HTML character references into numeric XML references and re-escape
/// the bracket literals that HTML serialization leaves bare.
pub fn html_entities_to_xml_entities(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match numeric_reference(rest) {
            Some((reference, consumed)) => {
                output.push_str(&reference);
                rest = &rest[consumed..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);

    output
        .replace(r#""<""#, r#""&lt;""#)
        .replace(r#"">""#, r#""&gt;""#)
        .replace("><<", ">&lt;<")
        .replace(">></", ">&gt;</")
}

/// Escape `&`, `<`, `>` and `"`.
pub fn html_entities_encode(input: &str) -> String {
    html_escape::encode_double_quoted_attribute(input).into_owned()
}

/// Decode character references.
pub fn html_entities_decode(input: &str) -> String {
    entities::decode(input)
}
