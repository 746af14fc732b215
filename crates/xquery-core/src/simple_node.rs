//! Simple in-memory tree implementation for `XdmNode` used in tests and benches.
//!
//! Nodes are `Arc`-backed and immutable once built; parent links are weak and
//! wired up by the builder. A node may carry a typed value, which stands in for
//! a schema type annotation during atomization.
//!
//! ```
//! use xquery_core::simple_node::{elem, text, attr};
//! use xquery_core::XdmNode;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .child(elem("child").attr(attr("world", "yes")))
//!     .build();
//!
//! assert_eq!(root.name().unwrap().local, "root");
//! assert_eq!(root.children().len(), 2);
//! assert_eq!(root.string_value(), "Hello");
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{NodeKind, QName, XdmNode};
use crate::xdm::XdmAtomicValue;

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    typed: Option<Vec<XdmAtomicValue>>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
    cached_text: OnceLock<String>,
}

#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish_non_exhaustive()
    }
}

fn local_name(name: &str) -> QName {
    QName {
        prefix: None,
        local: name.to_string(),
        ns_uri: None,
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: Option<String>, typed: Option<Vec<XdmAtomicValue>>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            typed,
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            cached_text: OnceLock::new(),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }
    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(local_name(name)))
    }
    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Attribute, Some(local_name(name)), Some(value.to_string()), None)
    }
    /// Attribute whose typed value differs from its string value (schema-typed content).
    pub fn typed_attribute(name: &str, value: &str, typed: Vec<XdmAtomicValue>) -> SimpleNode {
        Self::leaf(NodeKind::Attribute, Some(local_name(name)), Some(value.to_string()), Some(typed))
    }
    pub fn text(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Text, None, Some(value.to_string()), None)
    }
    pub fn comment(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Comment, None, Some(value.to_string()), None)
    }
    pub fn pi(target: &str, data: &str) -> SimpleNode {
        Self::leaf(
            NodeKind::ProcessingInstruction,
            Some(local_name(target)),
            Some(data.to_string()),
            None,
        )
    }
    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        Self::leaf(
            NodeKind::Namespace,
            Some(QName {
                prefix: Some(prefix.to_string()),
                local: prefix.to_string(),
                ns_uri: Some(uri.to_string()),
            }),
            Some(uri.to_string()),
            None,
        )
    }

    /// Resolve a namespace prefix by walking the ancestor chain (including self).
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        let mut cur = Some(self.clone());
        while let Some(n) = cur {
            for ns in &n.0.namespaces {
                if ns.0.name.as_ref().and_then(|q| q.prefix.as_deref()) == Some(prefix) {
                    return ns.0.value.clone();
                }
            }
            cur = n.parent();
        }
        None
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    typed: Option<Vec<XdmAtomicValue>>,
    children: Vec<SimpleNode>,
    attrs: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            typed: None,
            children: Vec::new(),
            attrs: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(child.into().into_node());
        self
    }
    pub fn children<I: IntoIterator<Item = SimpleNodeOrBuilder>>(mut self, it: I) -> Self {
        self.children.extend(it.into_iter().map(SimpleNodeOrBuilder::into_node));
        self
    }
    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attrs.push(attr);
        self
    }
    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }
    /// Annotate the element with a typed value, as schema validation would.
    pub fn typed(mut self, values: Vec<XdmAtomicValue>) -> Self {
        self.typed = Some(values);
        self
    }

    pub fn build(self) -> SimpleNode {
        let Self {
            kind,
            name,
            typed,
            children,
            attrs,
            namespaces,
        } = self;
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            for n in attrs.iter().chain(namespaces.iter()).chain(children.iter()) {
                let _ = n.0.parent.set(weak.clone());
            }
            Inner {
                kind,
                name,
                value: None,
                typed,
                parent: OnceLock::new(),
                attributes: attrs,
                namespaces,
                children,
                cached_text: OnceLock::new(),
            }
        });
        SimpleNode(inner)
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl SimpleNodeOrBuilder {
    fn into_node(self) -> SimpleNode {
        match self {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        }
    }
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
pub fn pi(target: &str, data: &str) -> SimpleNode {
    SimpleNode::pi(target, data)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}
pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind.clone()
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
    fn parent(&self) -> Option<Self> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }
    fn children(&self) -> Vec<Self> {
        self.0.children.clone()
    }
    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.clone()
    }
    fn namespaces(&self) -> Vec<Self> {
        self.0.namespaces.clone()
    }
    fn is_typed(&self) -> bool {
        self.0.typed.is_some()
    }
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        match &self.0.typed {
            Some(values) => values.clone(),
            None => match self.0.kind {
                NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                    vec![XdmAtomicValue::String(self.string_value())]
                }
                _ => vec![XdmAtomicValue::UntypedAtomic(self.string_value())],
            },
        }
    }
}
