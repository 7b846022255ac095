//! The two parallel alphabets of markup control characters.
//!
//! Standard XML uses `< > " & '`. The "safe" alphabet replaces each of them
//! with a high Latin-1 character so that markup can travel through places that
//! reject literal angle brackets, such as HTML attribute values.

/// One alphabet of markup control characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSet {
    pub tag_opener: char,
    pub tag_closer: char,
    pub double_quote: char,
    pub ampersand: char,
    pub quote: char,
}

impl CharacterSet {
    /// `<{name}` in this alphabet.
    pub fn open_tag(&self, name: &str) -> String {
        format!("{}{}", self.tag_opener, name)
    }

    /// `</{name}>` in this alphabet.
    pub fn close_tag(&self, name: &str) -> String {
        format!("{}/{}{}", self.tag_opener, name, self.tag_closer)
    }

    /// `<annotation encoding="{encoding}">` in this alphabet.
    pub fn annotation_open(&self, encoding: &str) -> String {
        format!(
            "{}annotation encoding={}{}{}{}",
            self.tag_opener, self.double_quote, encoding, self.double_quote, self.tag_closer
        )
    }

    pub fn is_safe(&self) -> bool {
        *self == SAFE_XML
    }

    /// Pairs `(self char, other char)` in encoding order.
    pub(crate) fn pairs(&self, other: &CharacterSet) -> [(char, char); 5] {
        [
            (self.tag_opener, other.tag_opener),
            (self.tag_closer, other.tag_closer),
            (self.double_quote, other.double_quote),
            (self.ampersand, other.ampersand),
            (self.quote, other.quote),
        ]
    }
}

pub const XML: CharacterSet = CharacterSet {
    tag_opener: '<',
    tag_closer: '>',
    double_quote: '"',
    ampersand: '&',
    quote: '\'',
};

pub const SAFE_XML: CharacterSet = CharacterSet {
    tag_opener: '«',
    tag_closer: '»',
    double_quote: '¨',
    ampersand: '§',
    quote: '`',
};

/// Entity spellings of the safe characters, decoded before the characters.
///
/// `&quot;` is the "real double quote" left behind by content imported from
/// older releases and also decodes to `¨`.
pub const SAFE_XML_ENTITIES: [(&str, char); 4] = [
    ("&laquo;", '«'),
    ("&raquo;", '»'),
    ("&uml;", '¨'),
    ("&quot;", '¨'),
];

/// Operator idioms that are invalid once decoded, paired with their escaped
/// replacements. Only applied in blackboard compatibility mode.
pub const BLACKBOARD_REPLACEMENTS: [(&str, &str); 3] = [
    ("«mo»<«/mo»", "«mo»§lt;«/mo»"),
    ("«mo»>«/mo»", "«mo»§gt;«/mo»"),
    ("«mo»&«/mo»", "«mo»§amp;«/mo»"),
];
