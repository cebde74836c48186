//! Patterns for finding links in text.
//!
//! Two grammars live here: the generic URL recognizer used for plain text,
//! and the outline link syntax (`[[target][descr]]`, `<scheme:payload>` and
//! bare `scheme:payload`) restricted to an allow-list of schemes.

use regex::{Captures, Regex};

use crate::error::{Error, Result};

/// Schemes recognized in outline links unless the configuration adds more.
pub const DEFAULT_SCHEMES: &[&str] = &["doi", "http", "https", "mid"];

// Generic URL: optional `scheme:` or `scheme://`, optional dotted domain
// ending in an alphabetic top-level label, optional path.
const URL_SCHEME: &str = r"(?:([[:alpha:]]+:(//)?))";
const URL_DOMAIN_COMPONENT: &str = r"(?:[\p{L}0-9][\p{L}0-9_-]*)?[\p{L}0-9]";
const URL_TOP_LEVEL_DOMAIN: &str = r"\p{L}{2,64}\.?";
const URL_PATH_COMPONENT: &str = r"(?:[\p{L}0-9.@,~_-]|%[0-9a-fA-F]{2})*";

// Capture groups of the generic URL pattern.
const URL_SCHEME_GROUP: usize = 1;
const URL_DOMAIN_GROUP: usize = 3;
const URL_TLD_GROUP: usize = 4;
const URL_PATH_GROUP: usize = 5;

// Characters allowed inside a bare link: no whitespace, brackets, parens
// or angle brackets.
const BARE_CHAR: &str = r"[^\]\[ \t\n()<>]";

pub(crate) const HEADING_PATTERN: &str = r"^(\*+)\s+(\S(?:.*\S)?)?$";

pub(crate) const BRACKET_PATTERN: &str =
    r"\[\[((?:[^\]\[]|\\(?:\\\\)*[\]\[]|\\+[^\]\[])+)\](?:\[((?s:.)+?)\])?\]";

pub(crate) const ANGLE_SUFFIX: &str = r"[^>\n]*(?:\n[ \t]*[^> \t\n][^> \n]*)*";

/// Payload of a bare link. Balanced parentheses (two levels) are allowed;
/// the final character may not be punctuation unless it is `/` or `)`.
pub(crate) fn bare_suffix() -> String {
    let paren = format!(r"\((?:{BARE_CHAR}|\({BARE_CHAR}*\))*\)");
    format!(r"(?:{BARE_CHAR}|{paren})+(?:[^[:punct:] \t\n]|/|{paren})")
}

fn url_pattern() -> String {
    format!(
        r"{URL_SCHEME}?((?:{URL_DOMAIN_COMPONENT}\.)*({URL_TOP_LEVEL_DOMAIN}))?((?:/{URL_PATH_COMPONENT})*)?"
    )
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Decide whether a raw match of the generic URL pattern is a real URL.
///
/// Rejects the scheme alone, a lone top-level-domain-like word, relative
/// paths such as `src/File.h` and bare absolute paths.
pub fn match_is_url(caps: &Captures<'_>) -> bool {
    let full = group(caps, 0);
    if full.is_empty() {
        return false;
    }
    let scheme = group(caps, URL_SCHEME_GROUP);
    let domain = group(caps, URL_DOMAIN_GROUP);
    let tld = group(caps, URL_TLD_GROUP);
    if full == scheme || full == tld {
        return false;
    }
    if domain == tld && scheme.is_empty() {
        return false;
    }
    full != group(caps, URL_PATH_GROUP)
}

/// Validate a scheme name for the outline allow-list.
fn check_scheme(scheme: &str) -> Result<()> {
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidScheme(scheme.to_string()))
    }
}

/// Compiled patterns, built once from the configured scheme list.
#[derive(Debug, Clone)]
pub struct Grammar {
    schemes: Vec<String>,
    pub(crate) url: Regex,
    pub(crate) heading: Regex,
    pub(crate) link: Regex,
    pub(crate) scheme_prefix: Regex,
    pub(crate) angle_open: Regex,
    pub(crate) angle_middle: Regex,
    pub(crate) angle_close: Regex,
}

impl Grammar {
    pub fn new<S: AsRef<str>>(extra_schemes: &[S]) -> Result<Self> {
        let mut schemes: Vec<String> = DEFAULT_SCHEMES.iter().map(|s| s.to_string()).collect();
        for scheme in extra_schemes {
            let scheme = scheme.as_ref().trim().trim_end_matches(':');
            check_scheme(scheme)?;
            if !schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
                schemes.push(scheme.to_string());
            }
        }

        let alternation = schemes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let angle = format!(r"<({alternation}):({ANGLE_SUFFIX})>");
        let bare = format!(r"\b({alternation}):({})", bare_suffix());

        Ok(Self {
            url: Regex::new(&url_pattern())?,
            heading: Regex::new(HEADING_PATTERN)?,
            link: Regex::new(&format!("{BRACKET_PATTERN}|{angle}|{bare}"))?,
            scheme_prefix: Regex::new(&format!("^(?:{alternation}):"))?,
            angle_open: Regex::new(&format!(r"<(?:{alternation}):[^>]*$"))?,
            angle_middle: Regex::new(r"^[ \t]*[^> \t][^> ]*$")?,
            angle_close: Regex::new(r"^[ \t]*[^> \t][^> ]*>")?,
            schemes,
        })
    }

    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Find every URL inside one whitespace-free token.
    pub fn urls_in_token<'a>(&'a self, token: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.url
            .captures_iter(token)
            .filter(match_is_url)
            .map(|caps| group(&caps, 0))
    }

    /// Find every URL in free text, token by token.
    pub fn urls_in_text<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        text.split_whitespace()
            .flat_map(move |token| self.urls_in_token(token))
    }
}
