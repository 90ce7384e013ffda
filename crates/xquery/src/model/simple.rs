//! Simple in-memory tree implementing [`XdmNode`], used in tests and for
//! compile-time placeholder nodes.
//!
//! ```
//! use xquery_core::model::simple::{elem, text, attr};
//!
//! // <root id="r"><child>Hello</child></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.children().len(), 1);
//! assert_eq!(root.string_value(), "Hello");
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{Node, NodeId, NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
    cached_text: OnceLock<String>,
}

/// Arc-backed immutable node; the parent link is fixed once when the parent is built.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

fn local(name: &str) -> Option<QName> {
    Some(QName {
        prefix: None,
        local: name.to_string(),
        ns_uri: None,
    })
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            parent: OnceLock::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            cached_text: OnceLock::new(),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }
    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, local(name))
    }
    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Attribute, local(name), Some(value.to_string()))
    }
    pub fn text(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Text, None, Some(value.to_string()))
    }
    pub fn comment(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Comment, None, Some(value.to_string()))
    }

    /// Fresh, empty document node.
    pub fn dummy_document() -> Node {
        doc().build().into()
    }

    /// Fresh, empty element node.
    pub fn dummy_element() -> Node {
        elem("dummy").build().into()
    }

    pub fn children(&self) -> Vec<SimpleNode> {
        self.0.children.clone()
    }

    pub fn attributes(&self) -> Vec<SimpleNode> {
        self.0.attributes.clone()
    }

    pub fn string_value(&self) -> String {
        XdmNode::string_value(self)
    }

    fn parent_node(&self) -> Option<SimpleNode> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    children: Vec<SimpleNode>,
    attrs: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            children: Vec::new(),
            attrs: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(match child.into() {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        });
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.0.kind == NodeKind::Attribute);
        self.attrs.push(attr);
        self
    }

    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            parent: OnceLock::new(),
            attributes: self.attrs,
            children: self.children,
            cached_text: OnceLock::new(),
        }));
        for c in node.0.attributes.iter().chain(&node.0.children) {
            // a node handed to a second parent keeps its first parent
            let _ = c.0.parent.set(Arc::downgrade(&node.0));
        }
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}
impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}
impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNode::element(name)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(name, v)
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::comment(v)
}
pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }
    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }
    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => self
                .0
                .cached_text
                .get_or_init(|| {
                    fn dfs(n: &SimpleNode, out: &mut String) {
                        if n.0.kind == NodeKind::Text
                            && let Some(v) = &n.0.value
                        {
                            out.push_str(v);
                        }
                        for c in &n.0.children {
                            dfs(c, out);
                        }
                    }
                    let mut out = String::new();
                    dfs(self, &mut out);
                    out
                })
                .clone(),
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }
    fn parent(&self) -> Option<Node> {
        self.parent_node().map(Node::from)
    }
    fn children(&self) -> Vec<Node> {
        self.0.children.iter().cloned().map(Node::from).collect()
    }
    fn attributes(&self) -> Vec<Node> {
        self.0.attributes.iter().cloned().map(Node::from).collect()
    }
    fn identity(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0) as usize, 0)
    }
}

impl From<SimpleNode> for Node {
    fn from(n: SimpleNode) -> Self {
        Node::new(n)
    }
}

impl From<SimpleNode> for crate::xdm::Item {
    fn from(n: SimpleNode) -> Self {
        crate::xdm::Item::Node(n.into())
    }
}
