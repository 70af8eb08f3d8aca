//! Textual repair of malformed XML before the lenient re-parse.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z_][A-Za-z0-9._-]*;)?")
        .expect("ampersand regex is valid")
});

/// Make a broken document parseable by a lenient reader.
///
/// Control characters are stripped, bare ampersands escaped and `<` that do
/// not open a tag, comment, CDATA section or declaration are neutralized.
pub(crate) fn repair(input: &str) -> String {
    let text = strip_control_chars(input);
    repair_markup(&text)
}

fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || !(c.is_control() || matches!(c, '\u{fffe}' | '\u{ffff}'))
        })
        .collect()
}

fn escape_bare_ampersands(input: &str) -> String {
    AMPERSAND
        .replace_all(input, |caps: &Captures<'_>| match caps.get(1) {
            Some(_) => caps[0].to_string(),
            None => "&amp;".to_string(),
        })
        .into_owned()
}

/// Sections copied verbatim, with their terminators.
const VERBATIM: [(&str, &str); 4] = [
    ("<![CDATA[", "]]>"),
    ("<!--", "-->"),
    ("<?", "?>"),
    ("<!", ">"),
];

/// Escape text segments and neutralize stray `<`; verbatim sections pass through.
fn repair_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('<') {
        out.push_str(&escape_bare_ampersands(&rest[..pos]));
        rest = &rest[pos..];

        if let Some(len) = verbatim_len(rest) {
            out.push_str(&rest[..len]);
            rest = &rest[len..];
            continue;
        }

        match tag_len(rest) {
            Some(len) => {
                out.push_str(&rest[..len]);
                rest = &rest[len..];
            }
            None => {
                out.push_str("&lt;");
                rest = &rest[1..];
            }
        }
    }
    out.push_str(&escape_bare_ampersands(rest));
    out
}

/// Length of a complete comment/CDATA/declaration at the start of `s`.
fn verbatim_len(s: &str) -> Option<usize> {
    let (open, close) = VERBATIM.iter().find(|(open, _)| s.starts_with(open))?;
    let end = s[open.len()..].find(close)?;
    Some(open.len() + end + close.len())
}

/// Length of a start or end tag at the start of `s`, if it is one and it is closed
/// before the next `<`.
fn tag_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('<')?;
    let body = body.strip_prefix('/').unwrap_or(body);
    let first = body.chars().next()?;
    if !(first.is_alphabetic() || first == '_' || first == ':') {
        return None;
    }

    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            (None, '<') => return None,
            (None, _) => {}
        }
    }
    None
}
