//! Text cleansing for feed fields that may carry HTML, CDATA or entity noise.

use std::sync::LazyLock;

use jobfeed_core::DESCRIPTION_MAX_CHARS;
use regex::{Captures, Regex};

static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!\[CDATA\[|\]\]>").expect("cdata regex is valid"));

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("entity regex is valid")
});

static RESIDUAL_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#?[A-Za-z0-9]+;").expect("residual regex is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Marker appended to truncated descriptions.
const TRUNCATION_MARKER: &str = "...";

/// Look up a named entity: the five XML ones plus common HTML ones.
pub(crate) fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "euro" => "\u{20ac}",
        "pound" => "\u{a3}",
        "yen" => "\u{a5}",
        "cent" => "\u{a2}",
        _ => return None,
    })
}

/// Resolve the body of a reference (`amp`, `#39`, `#x27`) to its text.
pub(crate) fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(String::from);
    }
    named_entity(name).map(str::to_string)
}

/// Decode every known reference in `text`, leaving unknown ones as they are.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            resolve_reference(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Reduce markup-laden text to plain, single-spaced text.
///
/// CDATA wrappers and tags are removed, known references decoded, leftover
/// reference noise turned into spaces and whitespace collapsed.
pub fn clean_text(raw: &str) -> String {
    let text = CDATA.replace_all(raw, "");
    let text = TAG.replace_all(&text, " ");
    let text = decode_entities(&text);
    // Escaped markup shows up as tags only after decoding.
    let text = TAG.replace_all(&text, " ");
    let text = RESIDUAL_ENTITY.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Cap a description at [`DESCRIPTION_MAX_CHARS`] characters, appending `...` when cut.
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_MAX_CHARS) {
        Some((cut, _)) => format!("{}{}", text[..cut].trim_end(), TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_markup_and_decodes() {
        let raw = "<![CDATA[<p>We&#8217;re hiring &amp; growing</p><br/>Apply&nbsp;now]]>";
        assert_eq!(clean_text(raw), "We\u{2019}re hiring & growing Apply now");
    }

    #[test]
    fn test_clean_text_handles_escaped_html() {
        let raw = "&lt;strong&gt;Remote&lt;/strong&gt; role &#x2014; EU only";
        assert_eq!(clean_text(raw), "Remote role \u{2014} EU only");
    }

    #[test]
    fn test_unknown_entities_become_whitespace() {
        assert_eq!(clean_text("Salary&zwsp;range &bogus; 50k"), "Salary range 50k");
    }

    #[test]
    fn test_truncate_description() {
        let short = "short text";
        assert_eq!(truncate_description(short), short);

        let long = "é".repeat(DESCRIPTION_MAX_CHARS + 5);
        let cut = truncate_description(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), DESCRIPTION_MAX_CHARS + 3);

        let exact = "a".repeat(DESCRIPTION_MAX_CHARS);
        assert_eq!(truncate_description(&exact), exact);
    }

    #[test]
    fn test_resolve_reference() {
        assert_eq!(resolve_reference("#39").as_deref(), Some("'"));
        assert_eq!(resolve_reference("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_reference("amp").as_deref(), Some("&"));
        assert_eq!(resolve_reference("#0"), None);
        assert_eq!(resolve_reference("nope"), None);
    }
}
