//! Conversion between query values and host values at extension-call boundaries.
//!
//! [`PJConverter`] turns an argument sequence into the [`HostValue`] shape a
//! host function declared for that parameter; [`JPConverter`] turns the host
//! result back into a sequence. Both are resolved once per call site from
//! static types and reused for every call.

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use lru::LruCache;

use crate::engine::runtime::{Error, ErrorCode};
use crate::types::{AtomicType, Cardinality, ItemType, NodeKindSet, NodeType, SequenceType};
use crate::xdm::{ExpandedName, ExternalObject, XdmAtomicValue, XdmItem, XdmSequence};

/// A value on the host side of an extension call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue<N> {
    Null,
    Bool(bool),
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    Char(char),
    F64(f64),
    F32(f32),
    Decimal(f64),
    String(String),
    Url(url::Url),
    QName(ExpandedName),
    List(Vec<HostValue<N>>),
    Array(Vec<HostValue<N>>),
    /// A single query item passed through unchanged.
    Item(XdmItem<N>),
    /// A grounded query sequence.
    Sequence(XdmSequence<N>),
    /// A pull cursor over a grounded query sequence.
    Iterator(HostIter<N>),
    External(ExternalObject),
}

/// Restartable cursor handed to host functions that declared an iterator parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct HostIter<N> {
    items: Arc<[XdmItem<N>]>,
    index: usize,
}

impl<N> HostIter<N> {
    pub fn new(items: Arc<[XdmItem<N>]>) -> Self {
        Self { items, index: 0 }
    }

    /// A cursor over the same items, from the start.
    pub fn restart(&self) -> Self {
        Self::new(self.items.clone())
    }
}

impl<N: Clone> Iterator for HostIter<N> {
    type Item = XdmItem<N>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.index).cloned();
        self.index += 1;
        item
    }
}

/// Host representation requested by an extension function for one parameter
/// (argument direction) or produced for its result (return direction).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostTarget {
    /// Whatever representation fits the value best.
    Any,
    SequenceIterator,
    Item,
    SequenceExtent,
    List(Box<HostTarget>),
    Array(Box<HostTarget>),
    String,
    Char,
    Bool,
    I64,
    I32,
    I16,
    I8,
    F64,
    F32,
    Decimal,
    Url,
    QName,
    Node,
    External,
    Null,
}

/// Declared host signature of an extension function.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionSignature {
    pub params: Vec<HostTarget>,
    pub result: HostTarget,
    /// Pure functions may be hoisted and folded like built-ins.
    pub pure: bool,
}

impl ExtensionSignature {
    pub fn new(params: Vec<HostTarget>, result: HostTarget) -> Self {
        Self {
            params,
            result,
            pure: false,
        }
    }

    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

pub trait ExtensionFunction<N>: Send + Sync {
    fn call(&self, args: Vec<HostValue<N>>) -> Result<HostValue<N>, Error>;
}

impl<N, F> ExtensionFunction<N> for F
where
    F: Fn(Vec<HostValue<N>>) -> Result<HostValue<N>, Error> + Send + Sync,
{
    fn call(&self, args: Vec<HostValue<N>>) -> Result<HostValue<N>, Error> {
        self(args)
    }
}

fn cannot_convert(from: impl std::fmt::Display, to: &HostTarget) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("cannot convert {from} to host {to:?}"))
}

fn overflow(value: i64, to: &str) -> Error {
    Error::from_code(ErrorCode::FOCA0003, format!("value {value} is out of range for {to}"))
}

/// Query-to-host converter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PJConverter {
    ToSequenceIterator,
    Identity,
    ToSequenceExtent,
    ToCollection(Box<PJConverter>),
    ToArray(Box<PJConverter>),
    UnwrapExternalObject,
    StringValueToString,
    StringValueToChar,
    BooleanValueToBoolean,
    IntegerValueToLong,
    IntegerValueToInt,
    IntegerValueToShort,
    IntegerValueToByte,
    IntegerValueToChar,
    NumericValueToDouble,
    NumericValueToFloat,
    NumericValueToDecimal,
    AnyUriValueToUrl,
    QNameValueToQName,
    ToNull,
    /// Resolved from each value's actual item type.
    General(HostTarget),
}

impl PJConverter {
    /// Pick the conversion for values of static type `item_type`/`card` into `target`.
    pub fn allocate(item_type: &ItemType, card: Cardinality, target: &HostTarget) -> Result<Self, Error> {
        use AtomicType as A;
        use HostTarget as H;
        match target {
            H::SequenceIterator => return Ok(PJConverter::ToSequenceIterator),
            H::Item => return Ok(PJConverter::Identity),
            H::SequenceExtent => return Ok(PJConverter::ToSequenceExtent),
            H::List(component) => {
                let each = PJConverter::allocate(item_type, Cardinality::EXACTLY_ONE, component)?;
                return Ok(PJConverter::ToCollection(Box::new(each)));
            }
            H::Array(component) => {
                let each = PJConverter::allocate(item_type, Cardinality::EXACTLY_ONE, component)?;
                return Ok(PJConverter::ToArray(Box::new(each)));
            }
            _ => {}
        }
        if card.allows_many() {
            return Ok(PJConverter::General(target.clone()));
        }
        let conv = match item_type {
            ItemType::Empty => PJConverter::ToNull,
            ItemType::External => match target {
                H::External | H::Any => PJConverter::UnwrapExternalObject,
                _ => return Err(cannot_convert("external object", target)),
            },
            ItemType::Node(_) => match target {
                H::Node | H::Any => PJConverter::Identity,
                H::String => PJConverter::StringValueToString,
                _ => return Err(cannot_convert(item_type, target)),
            },
            ItemType::Function => match target {
                H::Any => PJConverter::Identity,
                _ => return Err(cannot_convert(item_type, target)),
            },
            ItemType::AnyItem => PJConverter::General(target.clone()),
            ItemType::Atomic(t) => match (t, target) {
                (A::AnyAtomic | A::Numeric, _) => PJConverter::General(target.clone()),
                (A::String | A::UntypedAtomic, H::String | H::Any) => PJConverter::StringValueToString,
                (A::String | A::UntypedAtomic, H::Char) => PJConverter::StringValueToChar,
                (A::Boolean, H::Bool | H::Any) => PJConverter::BooleanValueToBoolean,
                (A::Integer, H::I64 | H::Any) => PJConverter::IntegerValueToLong,
                (A::Integer, H::I32) => PJConverter::IntegerValueToInt,
                (A::Integer, H::I16) => PJConverter::IntegerValueToShort,
                (A::Integer, H::I8) => PJConverter::IntegerValueToByte,
                (A::Integer, H::Char) => PJConverter::IntegerValueToChar,
                (A::Decimal, H::Decimal | H::Any) | (A::Integer, H::Decimal) => PJConverter::NumericValueToDecimal,
                (A::Double, H::F64 | H::Any) | (A::Integer | A::Decimal | A::Float, H::F64) => {
                    PJConverter::NumericValueToDouble
                }
                (A::Float, H::F32 | H::Any) | (A::Integer | A::Decimal | A::Double, H::F32) => {
                    PJConverter::NumericValueToFloat
                }
                (A::AnyUri, H::Url) => PJConverter::AnyUriValueToUrl,
                (A::AnyUri, H::String | H::Any) => PJConverter::StringValueToString,
                (A::QName, H::QName | H::Any) => PJConverter::QNameValueToQName,
                (
                    A::Date
                    | A::Time
                    | A::DateTime
                    | A::Duration
                    | A::YearMonthDuration
                    | A::DayTimeDuration
                    | A::Base64Binary
                    | A::HexBinary,
                    H::Any,
                ) => PJConverter::Identity,
                (_, H::String) => PJConverter::StringValueToString,
                _ => return Err(cannot_convert(t, target)),
            },
        };
        Ok(conv)
    }

    pub fn convert<N: Clone>(&self, items: Vec<XdmItem<N>>) -> Result<HostValue<N>, Error> {
        match self {
            PJConverter::ToSequenceIterator => Ok(HostValue::Iterator(HostIter::new(Arc::from(items)))),
            PJConverter::ToSequenceExtent => Ok(HostValue::Sequence(items)),
            PJConverter::Identity => Ok(match items.len() {
                0 => HostValue::Null,
                1 => items.into_iter().next().map_or(HostValue::Null, HostValue::Item),
                _ => HostValue::Sequence(items),
            }),
            PJConverter::ToCollection(each) => Ok(HostValue::List(
                items
                    .into_iter()
                    .map(|i| each.convert(vec![i]))
                    .collect::<Result<_, _>>()?,
            )),
            PJConverter::ToArray(each) => Ok(HostValue::Array(
                items
                    .into_iter()
                    .map(|i| each.convert(vec![i]))
                    .collect::<Result<_, _>>()?,
            )),
            PJConverter::ToNull => Ok(HostValue::Null),
            PJConverter::General(target) => {
                let mut it = items.into_iter();
                let (Some(first), None) = (it.next(), it.next()) else {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        format!("a sequence of more than one item cannot be converted to host {target:?}"),
                    ));
                };
                let actual = item_type_of(&first);
                PJConverter::allocate(&actual, Cardinality::EXACTLY_ONE, target)?.convert(vec![first])
            }
            single => {
                let mut it = items.into_iter();
                match (it.next(), it.next()) {
                    (None, _) => Ok(HostValue::Null),
                    (Some(item), None) => single.convert_item(item),
                    (Some(_), Some(_)) => Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        "a sequence of more than one item is not allowed for a singleton host parameter",
                    )),
                }
            }
        }
    }

    fn convert_item<N: Clone>(&self, item: XdmItem<N>) -> Result<HostValue<N>, Error> {
        use XdmAtomicValue as V;
        let atomic = |item: &XdmItem<N>| item.as_atomic().cloned();
        match self {
            PJConverter::UnwrapExternalObject => match item {
                XdmItem::External(obj) => Ok(HostValue::External(obj)),
                _ => Err(cannot_convert("item", &HostTarget::External)),
            },
            PJConverter::StringValueToString => match &item {
                XdmItem::Node(_) => Err(cannot_convert("node without string accessor", &HostTarget::String)),
                _ => atomic(&item)
                    .map(|a| HostValue::String(a.string_value()))
                    .ok_or_else(|| cannot_convert("item", &HostTarget::String)),
            },
            PJConverter::StringValueToChar => {
                let s = atomic(&item).map(|a| a.string_value()).unwrap_or_default();
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(HostValue::Char(c)),
                    _ => Err(Error::from_code(
                        ErrorCode::FORG0001,
                        format!("cannot convert string {s:?} to a single character"),
                    )),
                }
            }
            PJConverter::BooleanValueToBoolean => match atomic(&item) {
                Some(V::Boolean(b)) => Ok(HostValue::Bool(b)),
                _ => Err(cannot_convert("item", &HostTarget::Bool)),
            },
            PJConverter::IntegerValueToLong => integer(&item).map(HostValue::I64),
            PJConverter::IntegerValueToInt => {
                let v = integer(&item)?;
                i32::try_from(v).map(HostValue::I32).map_err(|_| overflow(v, "i32"))
            }
            PJConverter::IntegerValueToShort => {
                let v = integer(&item)?;
                i16::try_from(v).map(HostValue::I16).map_err(|_| overflow(v, "i16"))
            }
            PJConverter::IntegerValueToByte => {
                let v = integer(&item)?;
                i8::try_from(v).map(HostValue::I8).map_err(|_| overflow(v, "i8"))
            }
            PJConverter::IntegerValueToChar => {
                let v = integer(&item)?;
                u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .map(HostValue::Char)
                    .ok_or_else(|| overflow(v, "char"))
            }
            PJConverter::NumericValueToDouble => numeric(&item).map(HostValue::F64),
            #[allow(clippy::cast_possible_truncation)]
            PJConverter::NumericValueToFloat => numeric(&item).map(|d| HostValue::F32(d as f32)),
            PJConverter::NumericValueToDecimal => numeric(&item).map(HostValue::Decimal),
            PJConverter::AnyUriValueToUrl => match atomic(&item) {
                Some(V::AnyUri(s) | V::String(s)) => Ok(HostValue::Url(url::Url::parse(&s)?)),
                _ => Err(cannot_convert("item", &HostTarget::Url)),
            },
            PJConverter::QNameValueToQName => match atomic(&item) {
                Some(V::QName { ns_uri, local, .. }) => Ok(HostValue::QName(ExpandedName::new(ns_uri, local))),
                _ => Err(cannot_convert("item", &HostTarget::QName)),
            },
            PJConverter::Identity => Ok(HostValue::Item(item)),
            other => other.convert(vec![item]),
        }
    }
}

fn integer<N>(item: &XdmItem<N>) -> Result<i64, Error> {
    match item.as_atomic() {
        Some(XdmAtomicValue::Integer(i)) => Ok(*i),
        _ => Err(cannot_convert("item", &HostTarget::I64)),
    }
}

fn numeric<N>(item: &XdmItem<N>) -> Result<f64, Error> {
    item.as_atomic()
        .and_then(XdmAtomicValue::as_f64)
        .ok_or_else(|| cannot_convert("item", &HostTarget::F64))
}

fn item_type_of<N>(item: &XdmItem<N>) -> ItemType {
    match item {
        XdmItem::Atomic(a) => ItemType::Atomic(a.atomic_type()),
        XdmItem::Node(_) => ItemType::Node(NodeType::any()),
        XdmItem::Function(_) => ItemType::Function,
        XdmItem::External(_) => ItemType::External,
    }
}

/// Host-to-query converter for extension function results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JPConverter {
    FromNull,
    FromBool,
    FromInteger,
    FromChar,
    FromDouble,
    FromFloat,
    FromDecimal,
    FromString,
    FromUrl,
    FromQName,
    FromItems,
    FromNode,
    FromExternal,
    FromList(Box<JPConverter>),
    /// Decided by the runtime shape of the host value.
    General,
}

impl JPConverter {
    pub fn allocate(source: &HostTarget) -> Self {
        use HostTarget as H;
        match source {
            H::Null => JPConverter::FromNull,
            H::Bool => JPConverter::FromBool,
            H::I64 | H::I32 | H::I16 | H::I8 => JPConverter::FromInteger,
            H::Char => JPConverter::FromChar,
            H::F64 => JPConverter::FromDouble,
            H::F32 => JPConverter::FromFloat,
            H::Decimal => JPConverter::FromDecimal,
            H::String => JPConverter::FromString,
            H::Url => JPConverter::FromUrl,
            H::QName => JPConverter::FromQName,
            H::Item | H::SequenceExtent | H::SequenceIterator => JPConverter::FromItems,
            H::Node => JPConverter::FromNode,
            H::External => JPConverter::FromExternal,
            H::List(c) | H::Array(c) => JPConverter::FromList(Box::new(JPConverter::allocate(c))),
            H::Any => JPConverter::General,
        }
    }

    /// Static type of the converted result.
    pub fn sequence_type(&self) -> SequenceType {
        use JPConverter as J;
        let one = |t: AtomicType| SequenceType::new(ItemType::Atomic(t), Cardinality::ZERO_OR_ONE);
        match self {
            J::FromNull => SequenceType::new(ItemType::Empty, Cardinality::EMPTY),
            J::FromBool => one(AtomicType::Boolean),
            J::FromInteger => one(AtomicType::Integer),
            J::FromChar | J::FromString => one(AtomicType::String),
            J::FromDouble => one(AtomicType::Double),
            J::FromFloat => one(AtomicType::Float),
            J::FromDecimal => one(AtomicType::Decimal),
            J::FromUrl => one(AtomicType::AnyUri),
            J::FromQName => one(AtomicType::QName),
            J::FromNode => SequenceType::new(
                ItemType::Node(NodeType::with_kinds(NodeKindSet::all())),
                Cardinality::ZERO_OR_ONE,
            ),
            J::FromExternal => SequenceType::new(ItemType::External, Cardinality::ZERO_OR_ONE),
            J::FromList(each) => SequenceType::new(each.sequence_type().item_type, Cardinality::ZERO_OR_MORE),
            J::FromItems | J::General => SequenceType::ANY_SEQUENCE,
        }
    }

    pub fn convert<N: Clone>(&self, value: HostValue<N>) -> Result<XdmSequence<N>, Error> {
        use HostValue as H;
        use XdmAtomicValue as V;
        let atom = |a: XdmAtomicValue| Ok(vec![XdmItem::Atomic(a)]);
        match (self, value) {
            (_, H::Null) => Ok(Vec::new()),
            (JPConverter::FromList(each), H::List(values) | H::Array(values)) => {
                let mut out = Vec::with_capacity(values.len());
                for v in values {
                    out.extend(each.convert(v)?);
                }
                Ok(out)
            }
            (JPConverter::FromBool | JPConverter::General, H::Bool(b)) => atom(V::Boolean(b)),
            (JPConverter::FromInteger | JPConverter::General, H::I64(i)) => atom(V::Integer(i)),
            (JPConverter::FromInteger | JPConverter::General, H::I32(i)) => atom(V::Integer(i64::from(i))),
            (JPConverter::FromInteger | JPConverter::General, H::I16(i)) => atom(V::Integer(i64::from(i))),
            (JPConverter::FromInteger | JPConverter::General, H::I8(i)) => atom(V::Integer(i64::from(i))),
            (JPConverter::FromChar | JPConverter::General, H::Char(c)) => atom(V::String(c.to_string())),
            (JPConverter::FromDouble | JPConverter::General, H::F64(d)) => atom(V::Double(d)),
            (JPConverter::FromFloat | JPConverter::General, H::F32(f)) => atom(V::Float(f)),
            (JPConverter::FromDecimal | JPConverter::General, H::Decimal(d)) => atom(V::Decimal(d)),
            (JPConverter::FromString | JPConverter::General, H::String(s)) => atom(V::String(s)),
            (JPConverter::FromUrl | JPConverter::General, H::Url(u)) => atom(V::AnyUri(u.to_string())),
            (JPConverter::FromQName | JPConverter::General, H::QName(q)) => atom(V::QName {
                ns_uri: q.ns_uri,
                prefix: None,
                local: q.local,
            }),
            (JPConverter::FromExternal | JPConverter::General, H::External(o)) => Ok(vec![XdmItem::External(o)]),
            (JPConverter::FromItems | JPConverter::FromNode | JPConverter::General, H::Item(i)) => Ok(vec![i]),
            (JPConverter::FromItems | JPConverter::General, H::Sequence(s)) => Ok(s),
            (JPConverter::FromItems | JPConverter::General, H::Iterator(it)) => Ok(it.collect()),
            (JPConverter::General, H::List(values) | H::Array(values)) => {
                let mut out = Vec::with_capacity(values.len());
                for v in values {
                    out.extend(JPConverter::General.convert(v)?);
                }
                Ok(out)
            }
            (conv, other) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("extension function returned {} where {conv:?} was declared", host_kind(&other)),
            )),
        }
    }
}

fn host_kind<N>(v: &HostValue<N>) -> &'static str {
    match v {
        HostValue::Null => "null",
        HostValue::Bool(_) => "bool",
        HostValue::I64(_) | HostValue::I32(_) | HostValue::I16(_) | HostValue::I8(_) => "integer",
        HostValue::Char(_) => "char",
        HostValue::F64(_) | HostValue::F32(_) => "floating point",
        HostValue::Decimal(_) => "decimal",
        HostValue::String(_) => "string",
        HostValue::Url(_) => "url",
        HostValue::QName(_) => "qname",
        HostValue::List(_) | HostValue::Array(_) => "list",
        HostValue::Item(_) => "item",
        HostValue::Sequence(_) | HostValue::Iterator(_) => "sequence",
        HostValue::External(_) => "external object",
    }
}

type ConverterKey = (ItemType, Cardinality, HostTarget);

/// Memo of resolved argument converters keyed by (item type, cardinality, target).
pub struct ConverterCache {
    inner: Mutex<LruCache<ConverterKey, PJConverter>>,
}

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

static GLOBAL_CACHE: LazyLock<ConverterCache> = LazyLock::new(|| ConverterCache::new(CACHE_CAPACITY));

impl ConverterCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Process-wide cache used by extension call sites.
    pub fn global() -> &'static ConverterCache {
        &GLOBAL_CACHE
    }

    pub fn allocate(&self, item_type: &ItemType, card: Cardinality, target: &HostTarget) -> Result<PJConverter, Error> {
        let key = (*item_type, card, target.clone());
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conv) = cache.get(&key) {
            tracing::trace!(%item_type, cardinality = %card, ?target, "converter cache hit");
            return Ok(conv.clone());
        }
        tracing::trace!(%item_type, cardinality = %card, ?target, "converter cache miss");
        let conv = PJConverter::allocate(item_type, card, target)?;
        cache.put(key, conv.clone());
        Ok(conv)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Numeric type codes used by host query APIs, paired with the atomic type
/// they denote. Each code and each type appears once, so lookups work both ways.
pub const TYPE_CODES: [(u16, AtomicType); 18] = [
    (1, AtomicType::AnyAtomic),
    (4, AtomicType::AnyUri),
    (5, AtomicType::Base64Binary),
    (6, AtomicType::Boolean),
    (7, AtomicType::Date),
    (9, AtomicType::Integer),
    (12, AtomicType::DateTime),
    (13, AtomicType::Decimal),
    (14, AtomicType::Double),
    (15, AtomicType::Duration),
    (16, AtomicType::Float),
    (22, AtomicType::HexBinary),
    (24, AtomicType::QName),
    (25, AtomicType::String),
    (26, AtomicType::Time),
    (48, AtomicType::DayTimeDuration),
    (50, AtomicType::UntypedAtomic),
    (51, AtomicType::YearMonthDuration),
];

pub fn atomic_type_for_code(code: u16) -> Option<AtomicType> {
    TYPE_CODES.iter().find(|(c, _)| *c == code).map(|(_, t)| *t)
}

pub fn code_for_atomic_type(t: AtomicType) -> Option<u16> {
    TYPE_CODES.iter().find(|(_, at)| *at == t).map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;

    fn int(i: i64) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn type_code_table_is_bijective() {
        for (code, t) in TYPE_CODES {
            assert_eq!(atomic_type_for_code(code), Some(t));
            assert_eq!(code_for_atomic_type(t), Some(code));
        }
    }

    #[test]
    fn cache_memoizes_per_key() {
        let cache = ConverterCache::new(CACHE_CAPACITY);
        let a = cache.allocate(&ItemType::INTEGER, Cardinality::EXACTLY_ONE, &HostTarget::I32).expect("int");
        let b = cache.allocate(&ItemType::INTEGER, Cardinality::EXACTLY_ONE, &HostTarget::I32).expect("int");
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        cache.allocate(&ItemType::INTEGER, Cardinality::EXACTLY_ONE, &HostTarget::I64).expect("long");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn narrowing_checks_range() {
        let conv = PJConverter::allocate(&ItemType::INTEGER, Cardinality::EXACTLY_ONE, &HostTarget::I8).expect("byte");
        assert_eq!(conv.convert(vec![int(100)]).expect("fits"), HostValue::I8(100));
        let err = conv.convert(vec![int(300)]).expect_err("overflow");
        assert_eq!(err.code_enum(), ErrorCode::FOCA0003);
    }
}
