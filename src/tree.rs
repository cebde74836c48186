//! Link tree shared by the parsers, the pruner and the query handlers.
//!
//! A tree mirrors document structure: a `FileGroup` root holds one `File`
//! node per source, each file holds nested heading nodes, and links sit in
//! `Leaf` buckets. A node's own leaf, when present, is its first child.

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub description: Option<String>,
    pub line_no: usize,
}

impl Link {
    pub fn new(url: impl Into<String>, line_no: usize) -> Self {
        Self {
            url: url.into(),
            description: None,
            line_no,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line_no: usize,
    pub raw_text: String,
}

/// Identity of a [`Children`] node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTag {
    File { path: String },
    FileGroup,
    Heading(Heading),
}

impl NodeTag {
    fn type_name(&self) -> &'static str {
        match self {
            Self::File { .. } => "File",
            Self::FileGroup => "FileGroup",
            Self::Heading(_) => "Heading",
        }
    }
}

/// Counters attached by the relevance pruner.
///
/// `target_count` is a budget while the pruner walks down and the realized
/// number of kept links once it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountAttrs {
    pub count: usize,
    pub target_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub tag: Option<NodeTag>,
    pub children: Vec<LinkTree>,
}

impl Children {
    pub fn new(tag: Option<NodeTag>) -> Self {
        Self {
            tag,
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: LinkTree) {
        self.children.push(child);
    }

    /// Append a link to this node's own leaf, creating the leaf on first use.
    pub fn add_link(&mut self, link: Link) {
        if let Some(LinkTree::Leaf(links)) = self.children.first_mut() {
            links.push(link);
            return;
        }
        self.children.insert(0, LinkTree::Leaf(vec![link]));
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTree {
    Leaf(Vec<Link>),
    Children(Children),
    Counted(CountAttrs, Box<LinkTree>),
}

impl LinkTree {
    pub fn count_attrs(&self) -> Option<CountAttrs> {
        match self {
            Self::Counted(attrs, _) => Some(*attrs),
            _ => None,
        }
    }

    /// The node with any count annotation peeled off.
    pub fn inner(&self) -> &LinkTree {
        match self {
            Self::Counted(_, node) => node.inner(),
            node => node,
        }
    }

    pub fn tag(&self) -> Option<&NodeTag> {
        match self.inner() {
            Self::Children(node) => node.tag.as_ref(),
            _ => None,
        }
    }

    pub fn children(&self) -> &[LinkTree] {
        match self.inner() {
            Self::Children(node) => &node.children,
            _ => &[],
        }
    }

    /// Links held directly by this node (not by nested headings).
    pub fn own_links(&self) -> &[Link] {
        match self.inner() {
            Self::Leaf(links) => links,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Leaf(links) => links.is_empty(),
            Self::Children(node) => node.is_empty(),
            Self::Counted(_, node) => node.is_empty(),
        }
    }

    /// Depth-first walk over every link, in document order.
    pub fn links(&self) -> Links<'_> {
        Links {
            stack: vec![self],
            current: Default::default(),
        }
    }

    pub fn link_count(&self) -> usize {
        self.links().count()
    }
}

pub struct Links<'a> {
    stack: Vec<&'a LinkTree>,
    current: std::slice::Iter<'a, Link>,
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a Link;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(link) = self.current.next() {
                return Some(link);
            }
            let node = self.stack.pop()?;
            match node.inner() {
                LinkTree::Leaf(links) => self.current = links.iter(),
                LinkTree::Children(node) => self.stack.extend(node.children.iter().rev()),
                LinkTree::Counted(..) => {}
            }
        }
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("_type", "Link")?;
        map.serialize_entry("url", &self.url)?;
        if let Some(description) = &self.description {
            map.serialize_entry("descr", description)?;
        }
        map.serialize_entry("lineNo", &self.line_no)?;
        map.end()
    }
}

impl Serialize for LinkTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // A group of a single file is reported as that file.
        if let Self::Counted(_, node) = self {
            if let Self::Children(group) = &**node {
                if group.tag == Some(NodeTag::FileGroup) && group.children.len() == 1 {
                    return group.children[0].serialize(serializer);
                }
            }
        }

        let mut map = serializer.serialize_map(None)?;
        let mut node = self;
        while let Self::Counted(attrs, inner) = node {
            map.serialize_entry("total", &attrs.count)?;
            map.serialize_entry("filtered", &attrs.target_count)?;
            node = &**inner;
        }
        match node {
            Self::Leaf(links) => {
                map.serialize_entry("_type", "Body")?;
                map.serialize_entry("links", links)?;
            }
            Self::Children(children) => {
                match &children.tag {
                    Some(tag) => {
                        map.serialize_entry("_type", tag.type_name())?;
                        match tag {
                            NodeTag::File { path } => map.serialize_entry("path", path)?,
                            NodeTag::Heading(heading) => {
                                map.serialize_entry("lineNo", &heading.line_no)?;
                                map.serialize_entry("rawText", &heading.raw_text)?;
                            }
                            NodeTag::FileGroup => {}
                        }
                    }
                    None => map.serialize_entry("_type", "Node")?,
                }
                map.serialize_entry("children", &children.children)?;
            }
            Self::Counted(..) => unreachable!("annotations are unwrapped above"),
        }
        map.end()
    }
}
