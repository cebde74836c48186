use ahash::AHashSet;
use regex::Regex;

use crate::error::{Error, Result};
use crate::grammar::{bare_suffix, Grammar, ANGLE_SUFFIX, BRACKET_PATTERN};

use super::outline::{logical_lines, unfold};

// A scheme name optionally followed by `:` and anything else.
const PREFIX_PATTERN: &str = r"^(?i:[a-z]+(?:[-+a-z0-9]*[a-z0-9])?)(:[^\n]*)?$";

/// Build the alternation matching any of `prefixes`.
///
/// Prefixes are matched literally; a prefix without a colon gets one
/// appended, so `["http", "https:"]` becomes `(?:http:|https:)`.
pub fn link_set_alternation<S: AsRef<str>>(prefixes: &[S]) -> Result<String> {
    if prefixes.is_empty() {
        return Err(Error::EmptyPrefixList);
    }
    let valid = Regex::new(PREFIX_PATTERN)?;
    let mut parts = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let prefix = prefix.as_ref();
        let caps = valid
            .captures(prefix)
            .ok_or_else(|| Error::InvalidPrefix(prefix.to_string()))?;
        let mut part = regex::escape(prefix);
        if caps.get(1).is_none() {
            part.push(':');
        }
        parts.push(part);
    }
    Ok(format!("(?:{})", parts.join("|")))
}

/// Compiled patterns for one link-set query.
#[derive(Debug, Clone)]
pub struct LinkSetPattern {
    bare: Regex,
    outline: Regex,
    bracket_prefix: Regex,
    angle_open: Regex,
}

impl LinkSetPattern {
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Result<Self> {
        let base = link_set_alternation(prefixes)?;
        let bare = format!(r"\b({base}{})", bare_suffix());
        Ok(Self {
            outline: Regex::new(&format!("{BRACKET_PATTERN}|<({base}{ANGLE_SUFFIX})>|{bare}"))?,
            bare: Regex::new(&bare)?,
            bracket_prefix: Regex::new(&format!("^{base}"))?,
            angle_open: Regex::new(&format!("<{base}[^>]*$"))?,
        })
    }

    pub(super) fn collect_bare(&self, content: &str, out: &mut AHashSet<String>) {
        for line in content.lines() {
            out.extend(
                self.bare
                    .captures_iter(line)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
    }

    pub(super) fn collect_outline(&self, grammar: &Grammar, content: &str, out: &mut AHashSet<String>) {
        for line in logical_lines(grammar, &self.angle_open, content) {
            for caps in self.outline.captures_iter(&line.text) {
                if let Some(target) = caps.get(1) {
                    if self.bracket_prefix.is_match(target.as_str()) {
                        out.insert(target.as_str().to_string());
                    }
                } else if let Some(angle) = caps.get(3) {
                    out.insert(unfold(angle.as_str()));
                } else if let Some(bare) = caps.get(4) {
                    out.insert(bare.as_str().to_string());
                } else {
                    log::error!("link set match fits no known form: {:?}", &caps[0]);
                }
            }
        }
    }
}
