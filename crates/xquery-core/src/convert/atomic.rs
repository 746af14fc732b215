//! Atomic-to-atomic conversion (casting and function-conversion rules).
//!
//! A [`Converter`] is resolved once from a (source, target) type pair through
//! [`ConversionRules::converter`] and then applied per item. Sources whose
//! actual type is only known at runtime use the `Untyped` or `General`
//! variants, which pick the concrete conversion item by item.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

use crate::engine::runtime::{Error, ErrorCode};
use crate::types::{AtomicType, TypeHierarchy};
use crate::xdm::XdmAtomicValue;

/// Why a single value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid(value: &str, target: AtomicType) -> Self {
        Self::new(ErrorCode::FORG0001, format!("invalid lexical value {value:?} for {target}"))
    }
}

impl From<ValidationFailure> for Error {
    fn from(f: ValidationFailure) -> Self {
        Error::from_code(f.code, f.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    Identity,
    ToString,
    ToUntypedAtomic,
    /// Parse the string value into the target type.
    FromString(AtomicType),
    /// Numeric or boolean source to a numeric target.
    ToNumeric(AtomicType),
    ToBoolean,
    DateTimeToDate,
    DateTimeToTime,
    DateToDateTime,
    Base64ToHex,
    HexToBase64,
    /// Converts `xs:untypedAtomic` items with the inner converter, passes others through.
    Untyped(Box<Converter>),
    /// Rejects `xs:untypedAtomic` items (target is namespace-sensitive).
    UntypedRejector(AtomicType),
    /// Resolves the conversion per item from its actual type.
    General(AtomicType),
}

/// Registry of conversions between primitive types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRules {
    th: TypeHierarchy,
}

impl ConversionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter from `source` to `target`, or `None` when no value of the
    /// source type can be converted.
    pub fn converter(&self, source: AtomicType, target: AtomicType) -> Option<Converter> {
        use AtomicType as T;
        if source == target || target == T::AnyAtomic {
            return Some(Converter::Identity);
        }
        if source == T::AnyAtomic || (source == T::Numeric && !target.is_numeric()) {
            return Some(Converter::General(target));
        }
        if target == T::Numeric && source.is_numeric() {
            return Some(Converter::Identity);
        }
        if self.th.atomic_subtype(source, target) && target == T::Duration {
            return Some(Converter::Identity);
        }
        match (source, target) {
            (_, T::String) => Some(Converter::ToString),
            (_, T::UntypedAtomic) => Some(Converter::ToUntypedAtomic),
            (T::String | T::UntypedAtomic, t) if t.is_namespace_sensitive() => None,
            (T::String | T::UntypedAtomic, t) => Some(Converter::FromString(t)),
            (s, t) if (s.is_numeric() || s == T::Boolean) && t.is_numeric() => Some(Converter::ToNumeric(t)),
            (s, T::Boolean) if s.is_numeric() => Some(Converter::ToBoolean),
            (T::DateTime, T::Date) => Some(Converter::DateTimeToDate),
            (T::DateTime, T::Time) => Some(Converter::DateTimeToTime),
            (T::Date, T::DateTime) => Some(Converter::DateToDateTime),
            (T::Base64Binary, T::HexBinary) => Some(Converter::Base64ToHex),
            (T::HexBinary, T::Base64Binary) => Some(Converter::HexToBase64),
            _ => None,
        }
    }

    /// Converter applied to items statically typed `xs:untypedAtomic` or
    /// `xs:anyAtomicType` when the required type is `target`.
    pub fn untyped_converter(&self, target: AtomicType) -> Converter {
        if target.is_namespace_sensitive() {
            return Converter::UntypedRejector(target);
        }
        let inner = match target {
            // function conversion rules: untyped to numeric goes through xs:double
            AtomicType::Numeric => Converter::FromString(AtomicType::Double),
            t => Converter::FromString(t),
        };
        Converter::Untyped(Box::new(inner))
    }
}

impl Converter {
    pub fn convert(&self, value: XdmAtomicValue) -> Result<XdmAtomicValue, ValidationFailure> {
        use XdmAtomicValue as V;
        match self {
            Converter::Identity => Ok(value),
            Converter::ToString => Ok(V::String(value.string_value())),
            Converter::ToUntypedAtomic => Ok(V::UntypedAtomic(value.string_value())),
            Converter::FromString(target) => parse_lexical(&value.string_value(), *target),
            Converter::ToNumeric(target) => to_numeric(&value, *target),
            Converter::ToBoolean => match value.as_f64() {
                Some(d) => Ok(V::Boolean(!(d == 0.0 || d.is_nan()))),
                None => Err(unconvertible(&value, AtomicType::Boolean)),
            },
            Converter::DateTimeToDate => match value {
                V::DateTime(dt) => Ok(V::Date {
                    date: dt.date_naive(),
                    tz: Some(*dt.offset()),
                }),
                other => Err(unconvertible(&other, AtomicType::Date)),
            },
            Converter::DateTimeToTime => match value {
                V::DateTime(dt) => Ok(V::Time {
                    time: dt.time(),
                    tz: Some(*dt.offset()),
                }),
                other => Err(unconvertible(&other, AtomicType::Time)),
            },
            Converter::DateToDateTime => match value {
                V::Date { date, tz } => {
                    let offset = tz.unwrap_or_else(utc);
                    let naive = date.and_time(NaiveTime::MIN);
                    naive
                        .and_local_timezone(offset)
                        .single()
                        .map(V::DateTime)
                        .ok_or_else(|| ValidationFailure::invalid(&date.to_string(), AtomicType::DateTime))
                }
                other => Err(unconvertible(&other, AtomicType::DateTime)),
            },
            Converter::Base64ToHex => match value {
                V::Base64Binary(s) => {
                    let bytes = BASE64
                        .decode(s.as_bytes())
                        .map_err(|_| ValidationFailure::invalid(&s, AtomicType::Base64Binary))?;
                    Ok(V::HexBinary(bytes.iter().map(|b| format!("{b:02X}")).collect()))
                }
                other => Err(unconvertible(&other, AtomicType::HexBinary)),
            },
            Converter::HexToBase64 => match value {
                V::HexBinary(s) => Ok(V::Base64Binary(BASE64.encode(decode_hex(&s)?))),
                other => Err(unconvertible(&other, AtomicType::Base64Binary)),
            },
            Converter::Untyped(inner) => match value {
                V::UntypedAtomic(_) => inner.convert(value),
                other => Ok(other),
            },
            Converter::UntypedRejector(target) => match value {
                V::UntypedAtomic(s) => Err(ValidationFailure::new(
                    ErrorCode::XPTY0117,
                    format!("cannot convert untypedAtomic {s:?} to namespace-sensitive type {target}"),
                )),
                other => Ok(other),
            },
            Converter::General(target) => {
                let source = value.atomic_type();
                match ConversionRules::new().converter(source, *target) {
                    Some(Converter::General(_)) | None => Err(unconvertible(&value, *target)),
                    Some(c) => c.convert(value),
                }
            }
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn unconvertible(value: &XdmAtomicValue, target: AtomicType) -> ValidationFailure {
    ValidationFailure::new(
        ErrorCode::XPTY0004,
        format!("cannot convert {} to {target}", value.atomic_type()),
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_numeric(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, ValidationFailure> {
    use XdmAtomicValue as V;
    let d = match value {
        V::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => other.as_f64().ok_or_else(|| unconvertible(other, target))?,
    };
    match target {
        AtomicType::Integer => {
            if let V::Integer(i) = value {
                return Ok(V::Integer(*i));
            }
            if d.is_nan() || d.is_infinite() {
                return Err(ValidationFailure::new(
                    ErrorCode::FOCA0002,
                    format!("cannot convert {} to xs:integer", value.string_value()),
                ));
            }
            let t = d.trunc();
            if t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(ValidationFailure::new(
                    ErrorCode::FOCA0003,
                    format!("{} is out of range for xs:integer", value.string_value()),
                ));
            }
            Ok(V::Integer(t as i64))
        }
        AtomicType::Decimal => {
            if d.is_nan() || d.is_infinite() {
                return Err(ValidationFailure::new(
                    ErrorCode::FOCA0002,
                    format!("cannot convert {} to xs:decimal", value.string_value()),
                ));
            }
            Ok(V::Decimal(d))
        }
        AtomicType::Float => Ok(V::Float(d as f32)),
        _ => Ok(V::Double(d)),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ValidationFailure> {
    let bytes = s.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(ValidationFailure::invalid(s, AtomicType::HexBinary));
    }
    bytes
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| ValidationFailure::invalid(s, AtomicType::HexBinary))
        })
        .collect()
}

fn split_timezone(s: &str) -> Result<(&str, Option<FixedOffset>), ()> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Ok((rest, Some(utc())));
    }
    if s.len() > 6 && s.is_char_boundary(s.len() - 6) {
        let (head, tail) = s.split_at(s.len() - 6);
        let tb = tail.as_bytes();
        if (tb[0] == b'+' || tb[0] == b'-') && tb[3] == b':' {
            let hours: i32 = tail[1..3].parse().map_err(|_| ())?;
            let minutes: i32 = tail[4..6].parse().map_err(|_| ())?;
            if hours > 14 || minutes > 59 {
                return Err(());
            }
            let secs = (hours * 3600 + minutes * 60) * if tb[0] == b'-' { -1 } else { 1 };
            return FixedOffset::east_opt(secs).map(|o| (head, Some(o))).ok_or(());
        }
    }
    Ok((s, None))
}

fn parse_duration_fields(body: &str, designators: &[char]) -> Option<Vec<(char, f64)>> {
    let mut out = Vec::new();
    let mut num = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() || c == '.' {
            num.push(c);
        } else if designators.contains(&c) && !num.is_empty() {
            out.push((c, num.parse().ok()?));
            num.clear();
        } else {
            return None;
        }
    }
    (num.is_empty() && !out.is_empty()).then_some(out)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_year_month(s: &str) -> Option<i32> {
    let (neg, rest) = s.strip_prefix('-').map_or((false, s), |r| (true, r));
    let body = rest.strip_prefix('P')?;
    let mut months = 0i64;
    for (d, v) in parse_duration_fields(body, &['Y', 'M'])? {
        if v.fract() != 0.0 {
            return None;
        }
        months += match d {
            'Y' => v as i64 * 12,
            _ => v as i64,
        };
    }
    i32::try_from(if neg { -months } else { months }).ok()
}

#[allow(clippy::cast_possible_truncation)]
fn parse_day_time(s: &str) -> Option<i64> {
    let (neg, rest) = s.strip_prefix('-').map_or((false, s), |r| (true, r));
    let body = rest.strip_prefix('P')?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };
    let mut ms = 0f64;
    if !date_part.is_empty() {
        for (_, v) in parse_duration_fields(date_part, &['D'])? {
            ms += v * 86_400_000.0;
        }
    }
    if let Some(t) = time_part {
        for (d, v) in parse_duration_fields(t, &['H', 'M', 'S'])? {
            ms += v * match d {
                'H' => 3_600_000.0,
                'M' => 60_000.0,
                _ => 1000.0,
            };
        }
    }
    if date_part.is_empty() && time_part.is_none() {
        return None;
    }
    let ms = ms.round() as i64;
    Some(if neg { -ms } else { ms })
}

/// Cast a lexical form to `target`, whitespace-collapsed first.
pub fn parse_lexical(raw: &str, target: AtomicType) -> Result<XdmAtomicValue, ValidationFailure> {
    use AtomicType as T;
    use XdmAtomicValue as V;
    let s = raw.trim();
    let bad = || ValidationFailure::invalid(raw, target);
    match target {
        T::String | T::AnyAtomic => Ok(V::String(raw.to_string())),
        T::UntypedAtomic => Ok(V::UntypedAtomic(raw.to_string())),
        T::AnyUri => Ok(V::AnyUri(s.to_string())),
        T::Boolean => match s {
            "true" | "1" => Ok(V::Boolean(true)),
            "false" | "0" => Ok(V::Boolean(false)),
            _ => Err(bad()),
        },
        T::Integer => s.strip_prefix('+').unwrap_or(s).parse().map(V::Integer).map_err(|_| bad()),
        T::Decimal => {
            if s.is_empty() || s.contains(['e', 'E']) || s.chars().any(char::is_alphabetic) {
                return Err(bad());
            }
            s.parse().map(V::Decimal).map_err(|_| bad())
        }
        T::Double | T::Numeric | T::Float => {
            let d = match s {
                "INF" | "+INF" => f64::INFINITY,
                "-INF" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                _ if s.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') => return Err(bad()),
                _ => s.parse().map_err(|_| bad())?,
            };
            #[allow(clippy::cast_possible_truncation)]
            Ok(if target == T::Float { V::Float(d as f32) } else { V::Double(d) })
        }
        T::Date => {
            let (body, tz) = split_timezone(s).map_err(|()| bad())?;
            let date = NaiveDate::parse_from_str(body, "%Y-%m-%d").map_err(|_| bad())?;
            Ok(V::Date { date, tz })
        }
        T::Time => {
            let (body, tz) = split_timezone(s).map_err(|()| bad())?;
            let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f").map_err(|_| bad())?;
            Ok(V::Time { time, tz })
        }
        T::DateTime => {
            let (body, tz) = split_timezone(s).map_err(|()| bad())?;
            let naive = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| bad())?;
            // values without a timezone are taken as UTC; the implicit timezone is applied by comparers
            let offset = tz.unwrap_or_else(utc);
            let dt: DateTime<FixedOffset> = naive.and_local_timezone(offset).single().ok_or_else(bad)?;
            Ok(V::DateTime(dt))
        }
        T::YearMonthDuration => parse_year_month(s).map(V::YearMonthDuration).ok_or_else(bad),
        T::DayTimeDuration | T::Duration => parse_day_time(s).map(V::DayTimeDuration).ok_or_else(bad),
        T::Base64Binary => {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64.decode(compact.as_bytes()).map_err(|_| bad())?;
            Ok(V::Base64Binary(compact))
        }
        T::HexBinary => {
            decode_hex(s)?;
            Ok(V::HexBinary(s.to_ascii_uppercase()))
        }
        T::QName => Err(ValidationFailure::new(
            ErrorCode::XPTY0117,
            format!("cannot cast {raw:?} to xs:QName without namespace context"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_integer() {
        let c = ConversionRules::new().converter(AtomicType::String, AtomicType::Integer).expect("converter");
        assert_eq!(c.convert(XdmAtomicValue::String(" 42 ".into())), Ok(XdmAtomicValue::Integer(42)));
        let err = c.convert(XdmAtomicValue::String("4x".into())).expect_err("invalid");
        assert_eq!(err.code, ErrorCode::FORG0001);
    }

    #[test]
    fn untyped_converter_passes_typed_values() {
        let c = ConversionRules::new().untyped_converter(AtomicType::Integer);
        assert_eq!(c.convert(XdmAtomicValue::Boolean(true)), Ok(XdmAtomicValue::Boolean(true)));
        assert_eq!(c.convert(XdmAtomicValue::UntypedAtomic("7".into())), Ok(XdmAtomicValue::Integer(7)));
    }

    #[test]
    fn untyped_to_qname_is_rejected() {
        let c = ConversionRules::new().untyped_converter(AtomicType::QName);
        let err = c.convert(XdmAtomicValue::UntypedAtomic("a:b".into())).expect_err("rejected");
        assert_eq!(err.code, ErrorCode::XPTY0117);
    }

    #[test]
    fn no_converter_between_unrelated_types() {
        assert!(ConversionRules::new().converter(AtomicType::Date, AtomicType::Boolean).is_none());
    }

    #[test]
    fn durations_parse() {
        assert_eq!(parse_lexical("P1Y2M", AtomicType::YearMonthDuration), Ok(XdmAtomicValue::YearMonthDuration(14)));
        assert_eq!(parse_lexical("-PT1.5S", AtomicType::DayTimeDuration), Ok(XdmAtomicValue::DayTimeDuration(-1500)));
    }

    #[test]
    fn binary_recoding() {
        let c = ConversionRules::new().converter(AtomicType::HexBinary, AtomicType::Base64Binary).expect("converter");
        assert_eq!(
            c.convert(XdmAtomicValue::HexBinary("48690A".into())),
            Ok(XdmAtomicValue::Base64Binary("SGkK".into()))
        );
    }
}
