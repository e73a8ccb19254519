use serde::{Deserialize, Serialize};
use std::fmt;

/// One element of the source tree, owned until it has been shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawElement {
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: RawElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// This element and all of its descendants, breadth first.
    pub fn descendants(&self) -> Vec<&RawElement> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            out.extend(current.children.iter());
            i += 1;
        }
        out
    }
}

/// The five output tables, one per record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Node,
    NodeTags,
    Way,
    WayNodes,
    WayTags,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Node,
        RecordKind::NodeTags,
        RecordKind::Way,
        RecordKind::WayNodes,
        RecordKind::WayTags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Node => "node",
            RecordKind::NodeTags => "node_tags",
            RecordKind::Way => "way",
            RecordKind::WayNodes => "way_nodes",
            RecordKind::WayTags => "way_tags",
        }
    }

    /// Column order of the table; matches the struct field order below.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Node => &NODE_FIELDS,
            RecordKind::Way => &WAY_FIELDS,
            RecordKind::NodeTags | RecordKind::WayTags => &TAG_FIELDS,
            RecordKind::WayNodes => &WAY_NODE_FIELDS,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub const NODE_FIELDS: [&str; 8] = [
    "id",
    "lat",
    "lon",
    "user",
    "uid",
    "version",
    "changeset",
    "timestamp",
];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const TAG_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_NODE_FIELDS: [&str; 3] = ["id", "node_id", "position"];

/// Allow-listed attributes of a `<node>`. Missing attributes stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub id: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

/// Allow-listed attributes of a `<way>`. Missing attributes stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WayRecord {
    pub id: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: Option<String>,
    pub key: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WayNodeRecord {
    pub id: Option<String>,
    pub node_id: Option<String>,
    pub position: usize,
}

/// Everything produced from one top-level element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedElement {
    Node {
        node: NodeRecord,
        tags: Vec<TagRecord>,
    },
    Way {
        way: WayRecord,
        nodes: Vec<WayNodeRecord>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn id(&self) -> Option<&str> {
        match self {
            ShapedElement::Node { node, .. } => node.id.as_deref(),
            ShapedElement::Way { way, .. } => way.id.as_deref(),
        }
    }

    pub fn primary_kind(&self) -> RecordKind {
        match self {
            ShapedElement::Node { .. } => RecordKind::Node,
            ShapedElement::Way { .. } => RecordKind::Way,
        }
    }

    pub fn tags(&self) -> &[TagRecord] {
        match self {
            ShapedElement::Node { tags, .. } | ShapedElement::Way { tags, .. } => tags,
        }
    }
}
