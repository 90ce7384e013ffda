use crate::types::NodeType;
use core::fmt;
use std::sync::Arc;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

/// Identity of a node: the owning allocation plus a position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize, pub u64);

/// Node adapter interface. Implementations hand out [`Node`] handles for
/// navigation so that trees of different origin can be mixed in one sequence.
pub trait XdmNode: fmt::Debug + Send + Sync {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn parent(&self) -> Option<Node>;
    fn children(&self) -> Vec<Node>;
    fn attributes(&self) -> Vec<Node>;
    fn identity(&self) -> NodeId;

    /// Data source this node belongs to, if any.
    fn data(&self) -> Option<DataRef> {
        None
    }
}

/// Shared handle to a node.
#[derive(Clone)]
pub struct Node(Arc<dyn XdmNode>);

impl Node {
    pub fn new(node: impl XdmNode + 'static) -> Self {
        Node(Arc::new(node))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind()
    }

    pub fn name(&self) -> Option<QName> {
        self.0.name()
    }

    pub fn string_value(&self) -> String {
        self.0.string_value()
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent()
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children()
    }

    pub fn attributes(&self) -> Vec<Node> {
        self.0.attributes()
    }

    pub fn data(&self) -> Option<DataRef> {
        self.0.data()
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind() {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element => NodeType::Element,
            NodeKind::Attribute => NodeType::Attribute,
            NodeKind::Text => NodeType::Text,
            NodeKind::Comment => NodeType::Comment,
            NodeKind::ProcessingInstruction => NodeType::ProcessingInstruction,
            NodeKind::Namespace => NodeType::Namespace,
        }
    }

    /// Topmost ancestor (or the node itself).
    pub fn root(&self) -> Node {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.identity() == other.0.identity()
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.identity().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().map(|q| match q.prefix {
            Some(p) => format!("{p}:{}", q.local),
            None => q.local,
        });
        match (self.kind(), name) {
            (NodeKind::Document, _) => f.write_str("document-node()"),
            (NodeKind::Element, Some(n)) => write!(f, "<{n}/>"),
            (NodeKind::Attribute, Some(n)) => write!(f, "{n}=\"{}\"", self.string_value()),
            (NodeKind::Text, _) => write!(f, "text {{ \"{}\" }}", self.string_value()),
            (NodeKind::Comment, _) => write!(f, "<!--{}-->", self.string_value()),
            (kind, _) => write!(f, "{}", Node::kind_name(kind)),
        }
    }
}

impl Node {
    fn kind_name(kind: NodeKind) -> &'static str {
        match kind {
            NodeKind::Document => "document-node()",
            NodeKind::Element => "element()",
            NodeKind::Attribute => "attribute()",
            NodeKind::Text => "text()",
            NodeKind::Comment => "comment()",
            NodeKind::ProcessingInstruction => "processing-instruction()",
            NodeKind::Namespace => "namespace-node()",
        }
    }
}

/// Opaque handle to an external document store.
pub trait DataSource: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    /// Document nodes exposed by this source.
    fn documents(&self) -> Vec<Node>;
}

pub type DataRef = Arc<dyn DataSource>;

/// Minimal node addressed by its position in a data source.
#[derive(Debug, Clone)]
pub struct DbNode {
    data: DataRef,
    pre: u64,
    kind: NodeKind,
}

impl DbNode {
    pub fn new(data: DataRef, pre: u64, kind: NodeKind) -> Self {
        Self { data, pre, kind }
    }

    /// Element placeholder at position 0 of `data`.
    pub fn placeholder(data: DataRef) -> Node {
        Node::new(DbNode::new(data, 0, NodeKind::Element))
    }

    pub fn pre(&self) -> u64 {
        self.pre
    }
}

impl XdmNode for DbNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }
    fn name(&self) -> Option<QName> {
        None
    }
    fn string_value(&self) -> String {
        String::new()
    }
    fn parent(&self) -> Option<Node> {
        None
    }
    fn children(&self) -> Vec<Node> {
        Vec::new()
    }
    fn attributes(&self) -> Vec<Node> {
        Vec::new()
    }
    fn identity(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.data).cast::<()>() as usize, self.pre)
    }
    fn data(&self) -> Option<DataRef> {
        Some(self.data.clone())
    }
}

/// In-memory data source over prebuilt documents.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    documents: Vec<Node>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, documents: impl IntoIterator<Item = Node>) -> DataRef {
        Arc::new(Self {
            name: name.into(),
            documents: documents.into_iter().collect(),
        })
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }
    fn documents(&self) -> Vec<Node> {
        self.documents.clone()
    }
}
