//! Node stream model.
//!
//! The decoder's output is a flat sequence of construction events: objects are
//! opened and closed, members are opened and closed inside objects, values and
//! nested objects live inside members. [`NodeWriter`] is the sink interface,
//! [`NodeList`] the buffering sink everything internal writes to.
//!
//! # Beispiel
//!
//! ```
//! use cmrx::node::{Node, NodeList, NodeWriter, Value, transform};
//! use cmrx::schema::{MemberInfo, MemberKind, TypeInfo};
//!
//! let button = TypeInfo::builder("Button", "urn:ui").build();
//! let content = MemberInfo::property(button.clone(), "Content", MemberKind::Regular);
//!
//! let mut list = NodeList::new();
//! list.start_object(button);
//! list.start_member(content);
//! list.value(Value::Text("OK".into()));
//! list.end_member();
//! list.end_object();
//! assert!(list.check_well_formed().is_ok());
//!
//! let mut copy = NodeList::new();
//! transform(&list, &mut copy);
//! assert_eq!(copy, list);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::decoder::DeferredContent;
use crate::schema::{MemberRef, TypeRef};
use crate::{Error, Result};

/// Prefix binding emitted before the object it scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub namespace: String,
}

/// Scalar or captured value inside a member.
#[derive(Clone)]
pub enum Value {
    Text(String),
    /// Text to be converted by `converter`.
    Converted { text: String, converter: TypeRef },
    /// Custom binary value that was not materialized.
    Binary { converter_id: i16, bytes: Vec<u8> },
    /// Type reference (positional parameter of `x:Type`).
    Type(TypeRef),
    /// Captured node sequence (template content).
    Nodes(Rc<NodeList>),
    /// Lazily decodable deferred region.
    Deferred(Rc<DeferredContent>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Converted { text: s, .. } => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (
                Self::Converted { text: a, converter: ca },
                Self::Converted { text: b, converter: cb },
            ) => a == b && ca.same_type(cb),
            (
                Self::Binary { converter_id: ia, bytes: a },
                Self::Binary { converter_id: ib, bytes: b },
            ) => ia == ib && a == b,
            (Self::Type(a), Self::Type(b)) => a.same_type(b),
            (Self::Nodes(a), Self::Nodes(b)) => a == b,
            (Self::Deferred(a), Self::Deferred(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Converted { text, converter } => {
                write!(f, "Converted({text:?}, {})", converter.name())
            }
            Self::Binary { converter_id, bytes } => {
                write!(f, "Binary({converter_id}, {} bytes)", bytes.len())
            }
            Self::Type(t) => write!(f, "Type({t})"),
            Self::Nodes(list) => write!(f, "Nodes({} nodes)", list.len()),
            Self::Deferred(d) => write!(f, "Deferred({} entries)", d.len()),
        }
    }
}

/// One construction event.
#[derive(Clone)]
pub enum Node {
    StartObject(TypeRef),
    /// Retrieve the object already held by the enclosing member.
    GetObject,
    EndObject,
    StartMember(MemberRef),
    EndMember,
    Value(Value),
    Namespace(NamespaceDecl),
}

impl Node {
    /// True for the start of an object scope (`StartObject` or `GetObject`).
    pub fn opens_object(&self) -> bool {
        matches!(self, Self::StartObject(_) | Self::GetObject)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::StartObject(_) => "StartObject",
            Self::GetObject => "GetObject",
            Self::EndObject => "EndObject",
            Self::StartMember(_) => "StartMember",
            Self::EndMember => "EndMember",
            Self::Value(_) => "Value",
            Self::Namespace(_) => "Namespace",
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::StartObject(a), Self::StartObject(b)) => a.same_type(b),
            (Self::StartMember(a), Self::StartMember(b)) => a == b,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Namespace(a), Self::Namespace(b)) => a == b,
            (Self::GetObject, Self::GetObject)
            | (Self::EndObject, Self::EndObject)
            | (Self::EndMember, Self::EndMember) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartObject(t) => write!(f, "SO({t})"),
            Self::GetObject => f.write_str("GO"),
            Self::EndObject => f.write_str("EO"),
            Self::StartMember(m) => write!(f, "SM({m})"),
            Self::EndMember => f.write_str("EM"),
            Self::Value(v) => write!(f, "V({v:?})"),
            Self::Namespace(ns) => write!(f, "NS({}={})", ns.prefix, ns.namespace),
        }
    }
}

/// Sink for construction events.
pub trait NodeWriter {
    fn start_object(&mut self, ty: TypeRef);
    fn get_object(&mut self);
    fn end_object(&mut self);
    fn start_member(&mut self, member: MemberRef);
    fn end_member(&mut self);
    fn value(&mut self, value: Value);
    fn namespace(&mut self, decl: NamespaceDecl);

    /// Dispatches a node to the matching method.
    fn write_node(&mut self, node: Node) {
        match node {
            Node::StartObject(t) => self.start_object(t),
            Node::GetObject => self.get_object(),
            Node::EndObject => self.end_object(),
            Node::StartMember(m) => self.start_member(m),
            Node::EndMember => self.end_member(),
            Node::Value(v) => self.value(v),
            Node::Namespace(ns) => self.namespace(ns),
        }
    }
}

/// Buffered node sequence.
#[derive(Clone, Default, PartialEq)]
pub struct NodeList {
    nodes: VecDeque<Node>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push_back(node);
    }

    pub fn pop_front(&mut self) -> Option<Node> {
        self.nodes.pop_front()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Node> + ExactSizeIterator {
        self.nodes.iter()
    }

    /// Drops everything from `len` on.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Moves all nodes of `other` to the end of this list.
    pub fn append(&mut self, other: &mut NodeList) {
        self.nodes.append(&mut other.nodes);
    }

    pub fn into_vec(self) -> Vec<Node> {
        self.nodes.into()
    }

    /// Checks balanced start/end pairs and legal nesting.
    ///
    /// Objects open at top level or inside a member, members open inside an
    /// object, values and namespace declarations appear inside members (the
    /// latter also at top level).
    pub fn check_well_formed(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Scope {
            Object,
            Member,
        }
        let mut stack: Vec<Scope> = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let top = stack.last().copied();
            let ok = match node {
                Node::StartObject(_) => top != Some(Scope::Object),
                Node::GetObject => top == Some(Scope::Member),
                Node::StartMember(_) => top == Some(Scope::Object),
                Node::EndObject => top == Some(Scope::Object),
                Node::EndMember => top == Some(Scope::Member),
                Node::Value(_) => top == Some(Scope::Member),
                Node::Namespace(_) => top != Some(Scope::Object),
            };
            if !ok {
                return Err(Error::structural(
                    "well-formed node sequence",
                    format!("{} at node {i}", node.short_name()),
                ));
            }
            match node {
                Node::StartObject(_) | Node::GetObject => stack.push(Scope::Object),
                Node::StartMember(_) => stack.push(Scope::Member),
                Node::EndObject | Node::EndMember => {
                    stack.pop();
                }
                _ => {}
            }
        }
        if stack.is_empty() {
            Ok(())
        } else {
            Err(Error::structural("balanced node sequence", format!("{} open scopes", stack.len())))
        }
    }
}

impl NodeWriter for NodeList {
    fn start_object(&mut self, ty: TypeRef) {
        self.push(Node::StartObject(ty));
    }

    fn get_object(&mut self) {
        self.push(Node::GetObject);
    }

    fn end_object(&mut self) {
        self.push(Node::EndObject);
    }

    fn start_member(&mut self, member: MemberRef) {
        self.push(Node::StartMember(member));
    }

    fn end_member(&mut self) {
        self.push(Node::EndMember);
    }

    fn value(&mut self, value: Value) {
        self.push(Node::Value(value));
    }

    fn namespace(&mut self, decl: NamespaceDecl) {
        self.push(Node::Namespace(decl));
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

impl FromIterator<Node> for NodeList {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self { nodes: iter.into_iter().collect() }
    }
}

impl IntoIterator for NodeList {
    type Item = Node;
    type IntoIter = std::collections::vec_deque::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Node;
    type IntoIter = std::collections::vec_deque::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Replays `source` node for node into `sink`.
pub fn transform<'a, W>(source: impl IntoIterator<Item = &'a Node>, sink: &mut W)
where
    W: NodeWriter + ?Sized,
{
    for node in source {
        sink.write_node(node.clone());
    }
}
