use std::borrow::Cow;

use regex::{Captures, Regex};

use crate::grammar::Grammar;
use crate::tree::{Children, Heading, Link, LinkTree, NodeTag};

use super::LinkFilter;

/// A source line, possibly extended by the continuation lines of an angle
/// link left open at its end.
pub(super) struct LogicalLine<'a> {
    pub line_no: usize,
    pub first: &'a str,
    pub text: Cow<'a, str>,
}

/// Split `content` into logical lines.
///
/// A line matching `angle_open` is joined with the following indented
/// single-token lines, but only when one of them closes the link with `>`.
pub(super) fn logical_lines<'a>(
    grammar: &Grammar,
    angle_open: &Regex,
    content: &'a str,
) -> Vec<LogicalLine<'a>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let first = lines[i];
        let mut end = i + 1;
        if angle_open.is_match(first) {
            let mut j = end;
            while j < lines.len() && grammar.angle_middle.is_match(lines[j]) {
                j += 1;
            }
            if j < lines.len() && grammar.angle_close.is_match(lines[j]) {
                end = j + 1;
            }
        }
        let text = if end == i + 1 {
            Cow::Borrowed(first)
        } else {
            Cow::Owned(lines[i..end].join("\n"))
        };
        out.push(LogicalLine {
            line_no: i + 1,
            first,
            text,
        });
        i = end;
    }
    out
}

/// Drop line breaks and the indentation after them from an angle link.
pub(super) fn unfold(payload: &str) -> String {
    if !payload.contains('\n') {
        return payload.to_string();
    }
    payload
        .split('\n')
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part
            } else {
                part.trim_start_matches([' ', '\t'])
            }
        })
        .collect()
}

fn link_from_match(grammar: &Grammar, caps: &Captures<'_>, line_no: usize) -> Option<Link> {
    if let Some(target) = caps.get(1) {
        let target = target.as_str();
        if !grammar.scheme_prefix.is_match(target) {
            return None;
        }
        let description = caps.get(2).map(|m| m.as_str().to_string());
        return Some(Link::new(target, line_no).with_description(description));
    }
    for (scheme, payload) in [(3, 4), (5, 6)] {
        if let (Some(scheme), Some(payload)) = (caps.get(scheme), caps.get(payload)) {
            let url = format!("{}:{}", scheme.as_str(), unfold(payload.as_str()));
            return Some(Link::new(url, line_no));
        }
    }
    log::error!("outline link match fits no known form: {:?}", &caps[0]);
    None
}

/// Open nodes along the current heading path.
///
/// `open[0]` is the root and `open[d]` sits at heading depth `d`. Nodes are
/// created lazily when the first link beneath them arrives and are attached
/// to their parent when a later heading closes them.
struct OutlineBuilder {
    open: Vec<Children>,
    headings: Vec<Option<Heading>>,
}

impl OutlineBuilder {
    fn new() -> Self {
        Self {
            open: vec![Children::new(None)],
            headings: Vec::new(),
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth.max(1) {
            if let Some(node) = self.open.pop() {
                if let Some(parent) = self.open.last_mut() {
                    parent.push(LinkTree::Children(node));
                }
            }
        }
    }

    fn open_heading(&mut self, level: usize, heading: Heading) {
        self.close_to(level);
        self.headings.truncate(level - 1);
        // Skipped levels become untagged placeholders.
        self.headings.resize(level - 1, None);
        self.headings.push(Some(heading));
    }

    fn add_link(&mut self, link: Link) {
        while self.open.len() <= self.headings.len() {
            let heading = self.headings[self.open.len() - 1].clone();
            self.open.push(Children::new(heading.map(NodeTag::Heading)));
        }
        if let Some(tip) = self.open.last_mut() {
            tip.add_link(link);
        }
    }

    fn finish(mut self) -> Children {
        self.close_to(1);
        self.open.pop().unwrap_or_default()
    }
}

pub(super) fn extract(grammar: &Grammar, content: &str, filter: Option<LinkFilter<'_>>) -> Children {
    let mut builder = OutlineBuilder::new();
    for line in logical_lines(grammar, &grammar.angle_open, content) {
        if let Some(caps) = grammar.heading.captures(line.first) {
            let level = caps[1].len();
            let raw_text = caps.get(2).map_or("", |m| m.as_str()).to_string();
            builder.open_heading(
                level,
                Heading {
                    line_no: line.line_no,
                    raw_text,
                },
            );
        }
        for caps in grammar.link.captures_iter(&line.text) {
            let Some(link) = link_from_match(grammar, &caps, line.line_no) else {
                continue;
            };
            if filter.map_or(true, |accept| accept(&link)) {
                builder.add_link(link);
            }
        }
    }
    builder.finish()
}
