//! Comparison operators and the atomic comparer used by value and general comparisons.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

use crate::consts::CODEPOINT_URI;
use crate::engine::collation::{CodepointCollation, Collation};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::types::AtomicType;
use crate::xdm::XdmAtomicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// Operator with the opposite truth value: `a op b` == `!(a op.negate() b)`.
    pub fn negate(self) -> Self {
        use ComparisonOp::*;
        match self {
            Eq => Ne,
            Ne => Eq,
            Lt => Ge,
            Ge => Lt,
            Le => Gt,
            Gt => Le,
        }
    }

    /// Operator to use when the operands are swapped: `a op b` == `b op.inverse() a`.
    pub fn inverse(self) -> Self {
        use ComparisonOp::*;
        match self {
            Lt => Gt,
            Gt => Lt,
            Le => Ge,
            Ge => Le,
            other => other,
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }

    pub fn test(self, ord: Ordering) -> bool {
        use ComparisonOp::*;
        match self {
            Eq => ord == Ordering::Equal,
            Ne => ord != Ordering::Equal,
            Lt => ord == Ordering::Less,
            Le => ord != Ordering::Greater,
            Gt => ord == Ordering::Greater,
            Ge => ord != Ordering::Less,
        }
    }

    /// Keyword of the value comparison form.
    pub fn value_token(self) -> &'static str {
        use ComparisonOp::*;
        match self {
            Eq => "eq",
            Ne => "ne",
            Lt => "lt",
            Le => "le",
            Gt => "gt",
            Ge => "ge",
        }
    }

    /// Symbol of the general comparison form.
    pub fn general_token(self) -> &'static str {
        use ComparisonOp::*;
        match self {
            Eq => "=",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value_token())
    }
}

/// Statically resolved comparison strategy: the collation URI to use for
/// string-like operands. Bound to a dynamic context before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicComparer {
    pub collation: String,
}

impl AtomicComparer {
    pub fn new(collation: impl Into<String>) -> Self {
        Self {
            collation: collation.into(),
        }
    }

    pub fn codepoint() -> Self {
        Self::new(CODEPOINT_URI)
    }

    pub fn is_codepoint(&self) -> bool {
        self.collation == CODEPOINT_URI
    }

    pub fn bind<N>(&self, dyn_ctx: &DynamicContext<N>) -> Result<BoundComparer, Error> {
        let collation: Arc<dyn Collation> = if self.is_codepoint() {
            Arc::new(CodepointCollation)
        } else {
            dyn_ctx.collations.resolve(&self.collation)?
        };
        Ok(BoundComparer {
            collation,
            implicit_tz: dyn_ctx.implicit_timezone(),
        })
    }
}

/// Comparer bound to a collation instance and the implicit timezone.
#[derive(Clone)]
pub struct BoundComparer {
    collation: Arc<dyn Collation>,
    implicit_tz: FixedOffset,
}

impl fmt::Debug for BoundComparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundComparer")
            .field("implicit_tz", &self.implicit_tz)
            .finish_non_exhaustive()
    }
}

fn incomparable(a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("cannot compare {} with {}", a.atomic_type(), b.atomic_type()),
    )
}

fn unordered(t: AtomicType, op: ComparisonOp) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("operator {op} is not defined on {t}"))
}

impl BoundComparer {
    /// Codepoint comparer for folding constants at compile time. Values whose
    /// comparison depends on the implicit timezone must not be folded with it.
    pub(crate) fn static_codepoint() -> Self {
        Self {
            collation: Arc::new(CodepointCollation),
            implicit_tz: Utc.fix(),
        }
    }

    /// `a op b` under value comparison rules. Untyped operands compare as strings.
    pub fn compare(&self, a: &XdmAtomicValue, op: ComparisonOp, b: &XdmAtomicValue) -> Result<bool, Error> {
        let a = untyped_to_string(a);
        let b = untyped_to_string(b);
        if a.is_nan() || b.is_nan() {
            if a.as_f64().is_some() && b.as_f64().is_some() {
                return Ok(op == ComparisonOp::Ne);
            }
            return Err(incomparable(&a, &b));
        }
        match self.ordering(&a, op, &b)? {
            Some(ord) => Ok(op.test(ord)),
            None => Ok(op == ComparisonOp::Ne),
        }
    }

    /// Total order used by the comparison, `None` when unordered (NaN).
    fn ordering(&self, a: &XdmAtomicValue, op: ComparisonOp, b: &XdmAtomicValue) -> Result<Option<Ordering>, Error> {
        use XdmAtomicValue as V;
        match (a, b) {
            (V::Integer(x), V::Integer(y)) => Ok(Some(x.cmp(y))),
            (x, y) if x.as_f64().is_some() && y.as_f64().is_some() => {
                let (Some(fx), Some(fy)) = (x.as_f64(), y.as_f64()) else {
                    return Ok(None);
                };
                Ok(fx.partial_cmp(&fy))
            }
            (V::String(x) | V::AnyUri(x), V::String(y) | V::AnyUri(y)) => Ok(Some(if op.is_ordering() {
                self.collation.compare(x, y)
            } else {
                self.collation.key(x).cmp(&self.collation.key(y))
            })),
            (V::Boolean(x), V::Boolean(y)) => Ok(Some(x.cmp(y))),
            (V::DateTime(x), V::DateTime(y)) => Ok(Some(x.cmp(y))),
            (V::Date { date: d1, tz: t1 }, V::Date { date: d2, tz: t2 }) => {
                let x = self.instant(d1.and_time(NaiveTime::MIN), *t1);
                let y = self.instant(d2.and_time(NaiveTime::MIN), *t2);
                Ok(Some(x.cmp(&y)))
            }
            (V::Time { time: t1, tz: z1 }, V::Time { time: t2, tz: z2 }) => {
                // times compare on a common reference date
                let day = chrono::NaiveDate::from_ymd_opt(1972, 12, 31).unwrap_or_default();
                let x = self.instant(day.and_time(*t1), *z1);
                let y = self.instant(day.and_time(*t2), *z2);
                Ok(Some(x.cmp(&y)))
            }
            (V::YearMonthDuration(x), V::YearMonthDuration(y)) => Ok(Some(x.cmp(y))),
            (V::DayTimeDuration(x), V::DayTimeDuration(y)) => Ok(Some(x.cmp(y))),
            (V::YearMonthDuration(x), V::DayTimeDuration(y)) | (V::DayTimeDuration(y), V::YearMonthDuration(x)) => {
                if op.is_ordering() {
                    return Err(unordered(AtomicType::Duration, op));
                }
                let equal = *x == 0 && *y == 0;
                Ok(Some(if equal { Ordering::Equal } else { Ordering::Less }))
            }
            (
                V::QName {
                    ns_uri: n1, local: l1, ..
                },
                V::QName {
                    ns_uri: n2, local: l2, ..
                },
            ) => {
                if op.is_ordering() {
                    return Err(unordered(AtomicType::QName, op));
                }
                Ok(Some(if n1 == n2 && l1 == l2 { Ordering::Equal } else { Ordering::Less }))
            }
            (V::HexBinary(x), V::HexBinary(y)) => {
                if op.is_ordering() {
                    return Err(unordered(AtomicType::HexBinary, op));
                }
                Ok(Some(if x.eq_ignore_ascii_case(y) { Ordering::Equal } else { Ordering::Less }))
            }
            (V::Base64Binary(x), V::Base64Binary(y)) => {
                if op.is_ordering() {
                    return Err(unordered(AtomicType::Base64Binary, op));
                }
                Ok(Some(if x == y { Ordering::Equal } else { Ordering::Less }))
            }
            _ => Err(incomparable(a, b)),
        }
    }

    fn instant(&self, naive: NaiveDateTime, tz: Option<FixedOffset>) -> NaiveDateTime {
        let offset = tz.unwrap_or(self.implicit_tz);
        offset
            .from_local_datetime(&naive)
            .single()
            .map_or(naive, |dt| dt.naive_utc())
    }
}

fn untyped_to_string(v: &XdmAtomicValue) -> XdmAtomicValue {
    match v {
        XdmAtomicValue::UntypedAtomic(s) => XdmAtomicValue::String(s.clone()),
        other => other.clone(),
    }
}
