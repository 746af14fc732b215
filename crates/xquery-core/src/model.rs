use core::cmp::Ordering;

use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
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

/// Compare two nodes by ancestry and stable sibling order (fallback algorithm).
///
/// - If one node is an ancestor of the other, the ancestor precedes the descendant.
/// - Among siblings, attributes come first, then namespaces, then child nodes; within
///   each group the order provided by the adapter is preserved.
/// - Nodes from different roots yield `err:FOER0000`; multi-root adapters must
///   override `XdmNode::compare_document_order`.
pub fn try_compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let len = core::cmp::min(pa.len(), pb.len());
    let mut i = 0usize;
    while i < len && pa[i] == pb[i] {
        i += 1;
    }
    if i == len {
        return Ok(if pa.len() < pb.len() {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    if i == 0 {
        return Err(Error::from_code(
            ErrorCode::FOER0000,
            "document order requires adapter: nodes from different roots",
        ));
    }
    let sibs = ordered_children(&pa[i - 1]);
    let posa = sibs.iter().position(|n| n == &pa[i]);
    let posb = sibs.iter().position(|n| n == &pb[i]);
    Ok(match (posa, posb) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    })
}

fn path_to_root<N: XdmNode>(n: &N) -> Vec<N> {
    let mut p = vec![n.clone()];
    let mut cur = n.clone();
    while let Some(parent) = cur.parent() {
        p.push(parent.clone());
        cur = parent;
    }
    p.reverse();
    p
}

fn ordered_children<N: XdmNode>(parent: &N) -> Vec<N> {
    let mut sibs = parent.attributes();
    sibs.extend(parent.namespaces());
    sibs.extend(parent.children());
    sibs
}

pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn base_uri(&self) -> Option<String> {
        None
    }

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    /// Whether the node carries a schema type annotation other than untyped.
    fn is_typed(&self) -> bool {
        false
    }

    /// Typed value used by atomization.
    ///
    /// Untyped nodes yield one `xs:untypedAtomic` (elements, attributes, text,
    /// documents) or one `xs:string` (comments, processing instructions,
    /// namespaces). Adapters with type annotations override this and may return
    /// any number of values.
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        match self.kind() {
            NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                vec![XdmAtomicValue::String(self.string_value())]
            }
            _ => vec![XdmAtomicValue::UntypedAtomic(self.string_value())],
        }
    }

    /// Default document order comparison uses ancestry and sibling order.
    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        try_compare_by_ancestry(self, other)
    }

    /// Identifier unique to this node within its tree, stable across calls.
    fn generate_id(&self) -> String {
        let path = path_to_root(self);
        let mut id = String::from("d");
        for pair in path.windows(2) {
            let idx = ordered_children(&pair[0])
                .iter()
                .position(|n| n == &pair[1])
                .unwrap_or(0);
            id.push('n');
            id.push_str(&idx.to_string());
        }
        id
    }
}
