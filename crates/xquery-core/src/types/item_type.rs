use core::fmt;

use crate::model::NodeKind;
use crate::types::Cardinality;

/// Built-in atomic types known to the engine.
///
/// `Numeric` is the union of the four numeric primitives and only appears as
/// a static type (no value ever reports it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    UntypedAtomic,
    String,
    Boolean,
    Numeric,
    Decimal,
    Integer,
    Double,
    Float,
    AnyUri,
    QName,
    DateTime,
    Date,
    Time,
    Duration,
    YearMonthDuration,
    DayTimeDuration,
    Base64Binary,
    HexBinary,
}

impl AtomicType {
    /// Primitive ancestor used for comparability and conversion lookups.
    pub fn primitive(self) -> AtomicType {
        match self {
            AtomicType::Integer => AtomicType::Decimal,
            AtomicType::YearMonthDuration | AtomicType::DayTimeDuration => AtomicType::Duration,
            other => other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            AtomicType::Numeric
                | AtomicType::Decimal
                | AtomicType::Integer
                | AtomicType::Double
                | AtomicType::Float
        )
    }

    /// Values of this type may be NaN.
    pub fn may_be_nan(self) -> bool {
        matches!(
            self,
            AtomicType::Double | AtomicType::Float | AtomicType::Numeric | AtomicType::AnyAtomic
        )
    }

    /// Whether `lt`/`gt` are defined on this type.
    pub fn is_ordered(self) -> bool {
        !matches!(
            self,
            AtomicType::QName | AtomicType::Duration | AtomicType::Base64Binary | AtomicType::HexBinary
        )
    }

    /// Namespace-sensitive types cannot be produced from untyped content.
    pub fn is_namespace_sensitive(self) -> bool {
        matches!(self, AtomicType::QName)
    }

    pub fn local_name(self) -> &'static str {
        match self {
            AtomicType::AnyAtomic => "anyAtomicType",
            AtomicType::UntypedAtomic => "untypedAtomic",
            AtomicType::String => "string",
            AtomicType::Boolean => "boolean",
            AtomicType::Numeric => "numeric",
            AtomicType::Decimal => "decimal",
            AtomicType::Integer => "integer",
            AtomicType::Double => "double",
            AtomicType::Float => "float",
            AtomicType::AnyUri => "anyURI",
            AtomicType::QName => "QName",
            AtomicType::DateTime => "dateTime",
            AtomicType::Date => "date",
            AtomicType::Time => "time",
            AtomicType::Duration => "duration",
            AtomicType::YearMonthDuration => "yearMonthDuration",
            AtomicType::DayTimeDuration => "dayTimeDuration",
            AtomicType::Base64Binary => "base64Binary",
            AtomicType::HexBinary => "hexBinary",
        }
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.local_name())
    }
}

bitflags::bitflags! {
    /// Set of node kinds a node type may match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeKindSet: u8 {
        const DOCUMENT = 1 << 0;
        const ELEMENT = 1 << 1;
        const ATTRIBUTE = 1 << 2;
        const TEXT = 1 << 3;
        const COMMENT = 1 << 4;
        const PROCESSING_INSTRUCTION = 1 << 5;
        const NAMESPACE = 1 << 6;
    }
}

impl NodeKindSet {
    /// Kinds whose typed value is always `xs:string`.
    pub const STRING_KINDS: Self = Self::NAMESPACE
        .union(Self::COMMENT)
        .union(Self::PROCESSING_INSTRUCTION);
    /// Kinds whose typed value is always `xs:untypedAtomic`.
    pub const UNTYPED_KINDS: Self = Self::TEXT.union(Self::DOCUMENT);

    pub fn of(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Document => Self::DOCUMENT,
            NodeKind::Element => Self::ELEMENT,
            NodeKind::Attribute => Self::ATTRIBUTE,
            NodeKind::Text => Self::TEXT,
            NodeKind::Comment => Self::COMMENT,
            NodeKind::ProcessingInstruction => Self::PROCESSING_INSTRUCTION,
            NodeKind::Namespace => Self::NAMESPACE,
        }
    }
}

/// Static description of a node item.
///
/// `typed_content` is set when the (schema) type of the matched nodes is known
/// to have simple content of one atomic type, i.e. atomization is single-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeType {
    pub kinds: NodeKindSet,
    pub typed_content: Option<AtomicType>,
}

impl NodeType {
    pub fn any() -> Self {
        Self { kinds: NodeKindSet::all(), typed_content: None }
    }

    pub fn of_kind(kind: &NodeKind) -> Self {
        Self { kinds: NodeKindSet::of(kind), typed_content: None }
    }

    pub fn with_kinds(kinds: NodeKindSet) -> Self {
        Self { kinds, typed_content: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `item()`
    AnyItem,
    Atomic(AtomicType),
    Node(NodeType),
    Function,
    /// Opaque host object wrapped as an item.
    External,
    /// The type of the empty sequence; matches no item.
    Empty,
}

impl ItemType {
    pub const ANY_ATOMIC: ItemType = ItemType::Atomic(AtomicType::AnyAtomic);
    pub const BOOLEAN: ItemType = ItemType::Atomic(AtomicType::Boolean);
    pub const INTEGER: ItemType = ItemType::Atomic(AtomicType::Integer);
    pub const STRING: ItemType = ItemType::Atomic(AtomicType::String);
    pub const UNTYPED_ATOMIC: ItemType = ItemType::Atomic(AtomicType::UntypedAtomic);

    pub fn any_node() -> Self {
        ItemType::Node(NodeType::any())
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, ItemType::Atomic(_))
    }

    pub fn atomic_type(&self) -> Option<AtomicType> {
        match self {
            ItemType::Atomic(t) => Some(*t),
            _ => None,
        }
    }

    /// Atomic type used for comparisons: untyped content compares as a string.
    pub fn comparison_primitive(&self) -> AtomicType {
        match self {
            ItemType::Atomic(AtomicType::UntypedAtomic) => AtomicType::String,
            ItemType::Atomic(t) => t.primitive(),
            _ => AtomicType::AnyAtomic,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::AnyItem => f.write_str("item()"),
            ItemType::Atomic(t) => write!(f, "{t}"),
            ItemType::Node(n) => {
                if n.kinds == NodeKindSet::all() {
                    f.write_str("node()")
                } else if n.kinds == NodeKindSet::ELEMENT {
                    f.write_str("element()")
                } else if n.kinds == NodeKindSet::ATTRIBUTE {
                    f.write_str("attribute()")
                } else if n.kinds == NodeKindSet::TEXT {
                    f.write_str("text()")
                } else if n.kinds == NodeKindSet::DOCUMENT {
                    f.write_str("document-node()")
                } else {
                    f.write_str("node()")
                }
            }
            ItemType::Function => f.write_str("function(*)"),
            ItemType::External => f.write_str("external-object()"),
            ItemType::Empty => f.write_str("empty-sequence()"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item_type: ItemType,
    pub cardinality: Cardinality,
}

impl SequenceType {
    pub const fn new(item_type: ItemType, cardinality: Cardinality) -> Self {
        Self { item_type, cardinality }
    }

    pub const OPTIONAL_ATOMIC: SequenceType =
        SequenceType::new(ItemType::Atomic(AtomicType::AnyAtomic), Cardinality::ZERO_OR_ONE);
    pub const ATOMIC_SEQUENCE: SequenceType =
        SequenceType::new(ItemType::Atomic(AtomicType::AnyAtomic), Cardinality::ZERO_OR_MORE);
    pub const OPTIONAL_INTEGER: SequenceType =
        SequenceType::new(ItemType::Atomic(AtomicType::Integer), Cardinality::ZERO_OR_ONE);
    pub const OPTIONAL_NUMERIC: SequenceType =
        SequenceType::new(ItemType::Atomic(AtomicType::Numeric), Cardinality::ZERO_OR_ONE);
    pub const ANY_SEQUENCE: SequenceType = SequenceType::new(ItemType::AnyItem, Cardinality::ZERO_OR_MORE);
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cardinality == Cardinality::EMPTY {
            return f.write_str("empty-sequence()");
        }
        write!(f, "{}{}", self.item_type, self.cardinality.indicator())
    }
}
