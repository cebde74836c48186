use crate::grammar::Grammar;
use crate::tree::{Children, Link};

use super::LinkFilter;

/// Plain text has no structure: every URL goes to the root's own leaf.
pub(super) fn extract(grammar: &Grammar, content: &str, filter: Option<LinkFilter<'_>>) -> Children {
    let mut root = Children::new(None);
    for (i, line) in content.lines().enumerate() {
        for url in grammar.urls_in_text(line) {
            let link = Link::new(url, i + 1);
            if filter.map_or(true, |accept| accept(&link)) {
                root.add_link(link);
            }
        }
    }
    root
}
