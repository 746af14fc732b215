pub mod consts;
pub mod convert;
pub mod engine;
pub mod expr;
pub mod iter;
pub mod model;
pub mod simple_node;
pub mod types;
pub mod xdm;

pub use engine::context::XPathContext;
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, SourceLocation, StaticContext, StaticContextBuilder,
};
pub use expr::{Expr, ExpressionVisitor, compile, compile_with_context, evaluate};
pub use model::{NodeKind, QName, XdmNode};
pub use simple_node::{SimpleNode, SimpleNodeBuilder, attr, doc as simple_doc, elem, ns, text};
pub use types::{AtomicType, Cardinality, ItemType, SequenceType};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
