//! The in-memory property tree consumed by the converter.
//!
//! The tree is arena-backed: nodes live in one `Vec` and refer to each other
//! by [`NodeId`] index. Links are a first-class value holding the id of their
//! target, which keeps cycle detection and post-hoc record patching a matter
//! of integer bookkeeping instead of reference identity.

/// Index of a node within its [`PropertyTree`] arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A canvas payload: fixed 32-bit-per-pixel BGRA rows
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    /// Pixel width
    pub width: u32,

    /// Pixel height
    pub height: u32,

    /// `width * height * 4` bytes of pixel data
    pub data: Vec<u8>,
}

impl Canvas {
    /// Wrap raw pixel rows
    ///
    /// `data` must hold exactly `width * height * 4` bytes; panics otherwise.
    /// A mismatch here would otherwise surface only as a container whose
    /// recorded dimensions disagree with its pixel data.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "canvas data must hold width * height * 4 bytes"
        );
        Self {
            width,
            height,
            data,
        }
    }
}

/// An audio payload: codec header bytes plus the encoded stream
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    /// Duration in milliseconds
    pub duration_ms: i32,

    /// Codec header bytes, stored ahead of the stream
    pub header: Vec<u8>,

    /// Encoded audio bytes
    pub data: Vec<u8>,
}

/// The value carried by one property node
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Structural node: directory, image group, sub-property, convex, null
    Empty,

    /// 16/32/64-bit integer, widened
    Integer(i64),

    /// 32/64-bit float, widened
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Two 32-bit integers
    Point(i32, i32),

    /// Image payload
    Canvas(Canvas),

    /// Audio payload
    Audio(Audio),

    /// Alias of another node's value and structure, resolved while converting
    Link(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct PropertyNode {
    pub name: String,
    pub value: PropertyValue,
    pub children: Vec<NodeId>,
}

/// An ordered tree of named, typed property nodes
///
/// ```
/// use nx_pkg::{PropertyTree, PropertyValue};
///
/// let mut tree = PropertyTree::new("");
/// let root = tree.root();
/// tree.add_child(root, "level", PropertyValue::Integer(30));
/// assert_eq!(tree.children(root).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PropertyTree {
    nodes: Vec<PropertyNode>,
}

impl PropertyTree {
    /// Create a tree holding only a structural root with the given name
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![PropertyNode {
                name: root_name.into(),
                value: PropertyValue::Empty,
                children: Vec::new(),
            }],
        }
    }

    /// The root node, always id 0
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the arena, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds only the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Append a child to `parent`, returning the new node's id
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PropertyNode {
            name: name.into(),
            value,
            children: Vec::new(),
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    /// Add a node without attaching it to any parent
    ///
    /// Detached nodes are never flattened; a link pointing at one is a
    /// dangling link.
    pub fn add_detached(&mut self, name: impl Into<String>, value: PropertyValue) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PropertyNode {
            name: name.into(),
            value,
            children: Vec::new(),
        });
        id
    }

    /// Point an existing link node at a new target
    ///
    /// Allows building cyclic or forward-referencing link chains after the
    /// nodes involved exist. Panics if `link` is not a link node.
    pub fn retarget_link(&mut self, link: NodeId, target: NodeId) {
        match &mut self.nodes[link.0 as usize].value {
            PropertyValue::Link(t) => *t = target,
            _ => panic!("retarget_link called on a non-link node"),
        }
    }

    /// The name of a node
    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0 as usize].name
    }

    /// The value of a node
    pub fn value(&self, id: NodeId) -> &PropertyValue {
        &self.nodes[id.0 as usize].value
    }

    /// The children of a node, in insertion order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0 as usize].children
    }
}
