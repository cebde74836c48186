//! Equivalent spellings of a URL used by mention lookup.

const SCHEME_SWAPS: &[(&str, &str)] = &[("http:", "https:"), ("https:", "http:")];

/// All variants of `url` that should be treated as the same page: the URL
/// itself, its `http`/`https` counterpart, and forms with redundant trailing
/// `#`, `&`, `?` and `/` characters stripped.
pub fn url_variants(url: &str) -> Vec<String> {
    let mut variants = redundant_tail_variants(url);
    for (from, to) in SCHEME_SWAPS {
        if let Some(rest) = url.strip_prefix(from) {
            variants.extend(redundant_tail_variants(&format!("{to}{rest}")));
        }
    }
    variants
}

/// Every prefix of `url` between the shortest form without a redundant tail
/// and the full string.
///
/// The tail is stripped in order: one `#`, any number of `&`, one `?`, then
/// any number of `/`.
pub fn redundant_tail_variants(url: &str) -> Vec<String> {
    let chars: Vec<char> = url.chars().collect();
    let mut end = chars.len();
    if end > 0 && chars[end - 1] == '#' {
        end -= 1;
    }
    while end > 0 && chars[end - 1] == '&' {
        end -= 1;
    }
    if end > 0 && chars[end - 1] == '?' {
        end -= 1;
    }
    while end > 0 && chars[end - 1] == '/' {
        end -= 1;
    }
    if chars.is_empty() {
        return Vec::new();
    }
    (end..=chars.len())
        .map(|i| chars[..i].iter().collect())
        .collect()
}
