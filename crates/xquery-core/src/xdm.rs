use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use core::fmt;
use std::any::Any;
use std::sync::Arc;

use crate::types::AtomicType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    /// Name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Atomic values of the XDM subset handled by the engine.
///
/// Decimal is stored as `f64`; binary types keep their lexical form.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    Integer(i64),
    Decimal(f64),
    Double(f64),
    Float(f32),
    AnyUri(String),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    UntypedAtomic(String),
    DateTime(DateTime<FixedOffset>),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    /// Total months.
    YearMonthDuration(i32),
    /// Total milliseconds.
    DayTimeDuration(i64),
    Base64Binary(String),
    HexBinary(String),
}

impl XdmAtomicValue {
    pub fn atomic_type(&self) -> AtomicType {
        match self {
            XdmAtomicValue::Boolean(_) => AtomicType::Boolean,
            XdmAtomicValue::String(_) => AtomicType::String,
            XdmAtomicValue::Integer(_) => AtomicType::Integer,
            XdmAtomicValue::Decimal(_) => AtomicType::Decimal,
            XdmAtomicValue::Double(_) => AtomicType::Double,
            XdmAtomicValue::Float(_) => AtomicType::Float,
            XdmAtomicValue::AnyUri(_) => AtomicType::AnyUri,
            XdmAtomicValue::QName { .. } => AtomicType::QName,
            XdmAtomicValue::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            XdmAtomicValue::DateTime(_) => AtomicType::DateTime,
            XdmAtomicValue::Date { .. } => AtomicType::Date,
            XdmAtomicValue::Time { .. } => AtomicType::Time,
            XdmAtomicValue::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            XdmAtomicValue::DayTimeDuration(_) => AtomicType::DayTimeDuration,
            XdmAtomicValue::Base64Binary(_) => AtomicType::Base64Binary,
            XdmAtomicValue::HexBinary(_) => AtomicType::HexBinary,
        }
    }

    pub fn is_nan(&self) -> bool {
        match self {
            XdmAtomicValue::Double(d) | XdmAtomicValue::Decimal(d) => d.is_nan(),
            XdmAtomicValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric value as `f64`, `None` for non-numeric values.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            XdmAtomicValue::Integer(i) => Some(*i as f64),
            XdmAtomicValue::Decimal(d) | XdmAtomicValue::Double(d) => Some(*d),
            XdmAtomicValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    /// Canonical lexical representation (the result of `fn:string`).
    pub fn string_value(&self) -> String {
        match self {
            XdmAtomicValue::Boolean(b) => b.to_string(),
            XdmAtomicValue::String(s)
            | XdmAtomicValue::AnyUri(s)
            | XdmAtomicValue::UntypedAtomic(s)
            | XdmAtomicValue::Base64Binary(s)
            | XdmAtomicValue::HexBinary(s) => s.clone(),
            XdmAtomicValue::Integer(i) => i.to_string(),
            XdmAtomicValue::Decimal(d) => format_decimal(*d),
            XdmAtomicValue::Double(d) => format_double(*d),
            XdmAtomicValue::Float(f) => format_double(f64::from(*f)),
            XdmAtomicValue::QName { prefix, local, .. } => match prefix {
                Some(p) if !p.is_empty() => format!("{p}:{local}"),
                _ => local.clone(),
            },
            XdmAtomicValue::DateTime(dt) => dt.to_rfc3339(),
            XdmAtomicValue::Date { date, tz } => format!("{}{}", date.format("%Y-%m-%d"), format_tz(*tz)),
            XdmAtomicValue::Time { time, tz } => format!("{}{}", time.format("%H:%M:%S"), format_tz(*tz)),
            XdmAtomicValue::YearMonthDuration(months) => format_year_month(*months),
            XdmAtomicValue::DayTimeDuration(ms) => format_day_time(*ms),
        }
    }
}

fn format_tz(tz: Option<FixedOffset>) -> String {
    match tz {
        None => String::new(),
        Some(off) if off.local_minus_utc() == 0 => "Z".to_string(),
        Some(off) => {
            let secs = off.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            format!("{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_decimal(d: f64) -> String {
    if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{d}")
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else if d == 0.0 {
        if d.is_sign_negative() { "-0".to_string() } else { "0".to_string() }
    } else if d.fract() == 0.0 && d.abs() < 1e6 {
        format!("{}", d as i64)
    } else if (1e-6..1e6).contains(&d.abs()) {
        format!("{d}")
    } else {
        format!("{d:E}")
    }
}

fn format_year_month(months: i32) -> String {
    let sign = if months < 0 { "-" } else { "" };
    let m = months.unsigned_abs();
    match (m / 12, m % 12) {
        (0, mm) => format!("{sign}P{mm}M"),
        (y, 0) => format!("{sign}P{y}Y"),
        (y, mm) => format!("{sign}P{y}Y{mm}M"),
    }
}

fn format_day_time(ms: i64) -> String {
    if ms == 0 {
        return "PT0S".to_string();
    }
    let sign = if ms < 0 { "-" } else { "" };
    let ms = ms.unsigned_abs();
    let days = ms / 86_400_000;
    let hours = (ms % 86_400_000) / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let millis = ms % 60_000;
    let mut out = format!("{sign}P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || millis > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if millis > 0 {
            if millis % 1000 == 0 {
                out.push_str(&format!("{}S", millis / 1000));
            } else {
                out.push_str(&format!("{}.{:03}S", millis / 1000, millis % 1000));
            }
        }
    }
    out
}

/// A function value. Only its identity matters to the expression core: it
/// cannot be atomized or compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionItem {
    pub name: Option<ExpandedName>,
    pub arity: usize,
}

/// Opaque host value carried through a query as an item.
#[derive(Clone)]
pub struct ExternalObject(pub Arc<dyn Any + Send + Sync>);

impl ExternalObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for ExternalObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ExternalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExternalObject(..)")
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
    Function(FunctionItem),
    External(ExternalObject),
}

impl<N> XdmItem<N> {
    pub fn as_atomic(&self) -> Option<&XdmAtomicValue> {
        match self {
            XdmItem::Atomic(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            XdmItem::Node(n) => Some(n),
            _ => None,
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{:?}", a),
            XdmItem::Function(func) => match &func.name {
                Some(n) => write!(f, "{n}#{}", func.arity),
                None => write!(f, "function#{}", func.arity),
            },
            XdmItem::External(_) => write!(f, "<external>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_lexical_forms() {
        assert_eq!(XdmAtomicValue::Double(f64::NAN).string_value(), "NaN");
        assert_eq!(XdmAtomicValue::Double(4.0).string_value(), "4");
        assert_eq!(XdmAtomicValue::Double(f64::NEG_INFINITY).string_value(), "-INF");
    }

    #[test]
    fn duration_lexical_forms() {
        assert_eq!(XdmAtomicValue::YearMonthDuration(14).string_value(), "P1Y2M");
        assert_eq!(XdmAtomicValue::DayTimeDuration(90_061_500).string_value(), "P1DT1H1M1.500S");
    }
}
