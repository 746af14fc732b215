//! Static type lattice: cardinalities, item types and the hierarchy oracle.

mod cardinality;
mod hierarchy;
mod item_type;

pub use cardinality::Cardinality;
pub use hierarchy::{TypeHierarchy, TypeRelation};
pub use item_type::{AtomicType, ItemType, NodeKindSet, NodeType, SequenceType};
