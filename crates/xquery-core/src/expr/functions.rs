//! Calls to the built-in function library.

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::logic::literal_ebv;
use crate::expr::{Atomizer, Expr, ExpressionVisitor, Literal, LiteralValue, static_type_check};
use crate::iter::{
    self, BoxedIter, IterProps, SubsequenceIterator, TailIterator, count_items, first_item, get_atomizing_iterator,
    materialize, single_item,
};
use crate::model::XdmNode;
use crate::types::{AtomicType, Cardinality, ItemType, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemFunction {
    Count,
    Empty,
    Exists,
    Boolean,
    Not,
    String,
    StringLength,
    Subsequence,
    GenerateId,
    Reverse,
    Data,
    True,
    False,
}

impl SystemFunction {
    pub fn name(self) -> &'static str {
        match self {
            SystemFunction::Count => "count",
            SystemFunction::Empty => "empty",
            SystemFunction::Exists => "exists",
            SystemFunction::Boolean => "boolean",
            SystemFunction::Not => "not",
            SystemFunction::String => "string",
            SystemFunction::StringLength => "string-length",
            SystemFunction::Subsequence => "subsequence",
            SystemFunction::GenerateId => "generate-id",
            SystemFunction::Reverse => "reverse",
            SystemFunction::Data => "data",
            SystemFunction::True => "true",
            SystemFunction::False => "false",
        }
    }

    /// Resolve a local name in the `fn` namespace.
    pub fn from_name(local: &str) -> Option<Self> {
        Some(match local {
            "count" => SystemFunction::Count,
            "empty" => SystemFunction::Empty,
            "exists" => SystemFunction::Exists,
            "boolean" => SystemFunction::Boolean,
            "not" => SystemFunction::Not,
            "string" => SystemFunction::String,
            "string-length" => SystemFunction::StringLength,
            "subsequence" => SystemFunction::Subsequence,
            "generate-id" => SystemFunction::GenerateId,
            "reverse" => SystemFunction::Reverse,
            "data" => SystemFunction::Data,
            "true" => SystemFunction::True,
            "false" => SystemFunction::False,
            _ => return None,
        })
    }

    /// Whether the zero-argument form reads the context item.
    pub fn uses_context_item(self) -> bool {
        matches!(
            self,
            SystemFunction::String | SystemFunction::StringLength | SystemFunction::GenerateId | SystemFunction::Data
        )
    }

    fn arity(self) -> (usize, usize) {
        match self {
            SystemFunction::True | SystemFunction::False => (0, 0),
            SystemFunction::String
            | SystemFunction::StringLength
            | SystemFunction::GenerateId
            | SystemFunction::Data => (0, 1),
            SystemFunction::Subsequence => (2, 3),
            _ => (1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemCall {
    pub function: SystemFunction,
    pub args: Vec<Expr>,
    pub loc: Option<SourceLocation>,
}

impl SystemCall {
    pub fn new(function: SystemFunction, args: Vec<Expr>) -> Self {
        Self {
            function,
            args,
            loc: None,
        }
    }

    fn arg(&self, i: usize) -> Result<&Expr, Error> {
        self.args.get(i).ok_or_else(|| {
            Error::from_code(
                ErrorCode::XPST0017,
                format!("fn:{} called without argument {}", self.function.name(), i + 1),
            )
        })
    }

    pub fn item_type(&self) -> ItemType {
        match self.function {
            SystemFunction::Count | SystemFunction::StringLength => ItemType::INTEGER,
            SystemFunction::String | SystemFunction::GenerateId => ItemType::STRING,
            SystemFunction::Subsequence | SystemFunction::Reverse => {
                self.args.first().map_or(ItemType::Empty, Expr::item_type)
            }
            SystemFunction::Data => ItemType::ANY_ATOMIC,
            _ => ItemType::BOOLEAN,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self.function {
            SystemFunction::Subsequence => self
                .args
                .first()
                .map_or(Cardinality::EMPTY, |a| a.cardinality() | Cardinality::ALLOWS_ZERO),
            SystemFunction::Reverse => self.args.first().map_or(Cardinality::EMPTY, Expr::cardinality),
            SystemFunction::Data => Cardinality::ZERO_OR_MORE,
            _ => Cardinality::EXACTLY_ONE,
        }
    }

    /// Context-item defaults and functions with a direct expression form.
    pub(crate) fn simplify(mut self) -> Result<Expr, Error> {
        if self.args.is_empty() && self.function.uses_context_item() {
            self.args.push(Expr::context_item());
        }
        match (self.function, self.args.len()) {
            (SystemFunction::True, 0) => Ok(Expr::boolean(true)),
            (SystemFunction::False, 0) => Ok(Expr::boolean(false)),
            (SystemFunction::Data, 1) => {
                let mut atomizer = Atomizer::new(self.args.remove(0));
                atomizer.loc = atomizer.loc.or(self.loc);
                Ok(Expr::Atomizer(atomizer))
            }
            _ => Ok(Expr::Call(self)),
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let (min, max) = self.function.arity();
        if self.args.len() < min || self.args.len() > max {
            return Err(Error::static_err(
                ErrorCode::XPST0017,
                format!(
                    "function fn:{}#{} is not defined",
                    self.function.name(),
                    self.args.len()
                ),
                self.loc,
            ));
        }
        let name = self.function.name();
        let role = |i: usize| format!("{} argument of fn:{name}", ordinal(i));
        let mut args = Vec::with_capacity(self.args.len());
        for (i, arg) in self.args.into_iter().enumerate() {
            let arg = arg.type_check(v)?;
            let required = match (self.function, i) {
                (SystemFunction::StringLength, 0) => Some(SequenceType::new(ItemType::STRING, Cardinality::ZERO_OR_ONE)),
                (SystemFunction::String, 0) => Some(SequenceType::new(ItemType::AnyItem, Cardinality::ZERO_OR_ONE)),
                (SystemFunction::GenerateId, 0) => {
                    Some(SequenceType::new(ItemType::any_node(), Cardinality::ZERO_OR_ONE))
                }
                (SystemFunction::Subsequence, 1 | 2) => Some(SequenceType::new(
                    ItemType::Atomic(AtomicType::Double),
                    Cardinality::EXACTLY_ONE,
                )),
                _ => None,
            };
            args.push(match required {
                Some(required) => static_type_check(arg, required, &role(i), v)?,
                None => arg,
            });
        }
        Ok(Expr::Call(SystemCall { args, ..self }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let args = self
            .args
            .into_iter()
            .map(|a| a.optimize(v))
            .collect::<Result<Vec<_>, _>>()?;
        let call = SystemCall { args, ..self };
        if let Some(folded) = call.fold_constant() {
            let out = Expr::atomics(folded);
            v.trace("call-constant", &Expr::Call(call), &out);
            return Ok(out);
        }
        match call.rewrite() {
            Some((rule, out)) => {
                v.trace(rule, &Expr::Call(call), &out);
                out.optimize(v)
            }
            None => Ok(Expr::Call(call)),
        }
    }

    /// Compile-time result when every argument is a literal and the call cannot fail.
    fn fold_constant(&self) -> Option<Vec<XdmAtomicValue>> {
        let lits = self.args.iter().map(Expr::as_literal).collect::<Option<Vec<&Literal>>>()?;
        let first = lits.first();
        let boolean = |b: bool| Some(vec![XdmAtomicValue::Boolean(b)]);
        match self.function {
            SystemFunction::Count => Some(vec![XdmAtomicValue::Integer(i64::try_from(first?.len()).ok()?)]),
            SystemFunction::Empty => boolean(first?.is_empty()),
            SystemFunction::Exists => boolean(!first?.is_empty()),
            SystemFunction::Boolean => boolean(literal_ebv(self.args.first()?)?),
            SystemFunction::Not => boolean(!literal_ebv(self.args.first()?)?),
            SystemFunction::String => {
                let lit = first?;
                if lit.is_empty() {
                    return Some(vec![XdmAtomicValue::String(String::new())]);
                }
                Some(vec![XdmAtomicValue::String(lit.single()?.string_value())])
            }
            SystemFunction::StringLength => {
                let lit = first?;
                let n = if lit.is_empty() {
                    0
                } else {
                    match lit.single()? {
                        XdmAtomicValue::String(s) => s.chars().count(),
                        _ => return None,
                    }
                };
                Some(vec![XdmAtomicValue::Integer(i64::try_from(n).ok()?)])
            }
            SystemFunction::Reverse => match &first?.value {
                LiteralValue::Atomics(values) => Some(values.iter().rev().cloned().collect()),
                LiteralValue::Range { .. } => None,
            },
            SystemFunction::Subsequence => {
                let LiteralValue::Atomics(values) = &first?.value else {
                    return None;
                };
                let start = lits.get(1)?.single()?.as_f64()?;
                let length = match lits.get(2) {
                    Some(l) => Some(l.single()?.as_f64()?),
                    None => None,
                };
                let window = Window::new(start, length);
                Some(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| window.contains(i + 1))
                        .map(|(_, v)| v.clone())
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Cheaper equivalent forms; `None` when nothing applies.
    fn rewrite(&self) -> Option<(&'static str, Expr)> {
        let arg = self.args.first()?;
        match self.function {
            SystemFunction::Not => {
                if let Expr::ValueComparison(vc) = arg
                    && let Some(negated) = vc.negate()
                {
                    return Some(("not-comparison", Expr::ValueComparison(negated)));
                }
                if let Some(inner) = arg.as_call(SystemFunction::Not) {
                    return Some(("not-not", Expr::call(SystemFunction::Boolean, inner.to_vec())));
                }
                if let Some(inner) = arg.as_call(SystemFunction::Empty) {
                    return Some(("not-empty", Expr::call(SystemFunction::Exists, inner.to_vec())));
                }
                if let Some(inner) = arg.as_call(SystemFunction::Exists) {
                    return Some(("not-exists", Expr::call(SystemFunction::Empty, inner.to_vec())));
                }
                None
            }
            SystemFunction::Boolean => {
                if arg.item_type() == ItemType::BOOLEAN && arg.cardinality().is_exactly_one() {
                    return Some(("boolean-redundant", arg.clone()));
                }
                None
            }
            SystemFunction::Reverse if arg.cardinality().at_most_one() => Some(("reverse-singleton", arg.clone())),
            _ => None,
        }
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        match self.function {
            SystemFunction::Subsequence => self.subsequence(ctx),
            SystemFunction::Reverse => {
                let base = self.arg(0)?.iterate(ctx)?;
                if base.properties().contains(IterProps::REVERSIBLE)
                    && let Some(reversed) = base.reverse()
                {
                    return Ok(reversed);
                }
                let mut items = materialize(base)?;
                items.reverse();
                Ok(iter::from_vec(items))
            }
            SystemFunction::Data => get_atomizing_iterator(self.arg(0)?.iterate(ctx)?).map_err(|e| e.at(self.loc)),
            _ => Ok(iter::optional(self.evaluate_item(ctx)?)),
        }
    }

    fn subsequence<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let numeric = |i: usize| -> Result<Option<f64>, Error> {
            let Some(arg) = self.args.get(i) else {
                return Ok(None);
            };
            match arg.evaluate_atomic(ctx)? {
                Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                    Error::from_code(
                        ErrorCode::XPTY0004,
                        format!("{} argument of fn:subsequence must be numeric", ordinal(i)),
                    )
                    .at(self.loc)
                }),
                None => Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("{} argument of fn:subsequence must not be empty", ordinal(i)),
                )
                .at(self.loc)),
            }
        };
        let start = numeric(1)?.unwrap_or(f64::NAN);
        let window = Window::new(start, numeric(2)?);
        let Some(first) = window.first else {
            return Ok(iter::empty());
        };
        let base = self.arg(0)?.iterate(ctx)?;
        Ok(match window.limit {
            None => Box::new(TailIterator::new(base, first)),
            Some(0) => iter::empty(),
            Some(limit) => Box::new(SubsequenceIterator::new(base, first, Some(limit))),
        })
    }

    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        let boolean = |b: bool| Some(XdmItem::Atomic(XdmAtomicValue::Boolean(b)));
        let string = |s: String| Some(XdmItem::Atomic(XdmAtomicValue::String(s)));
        match self.function {
            SystemFunction::True => Ok(boolean(true)),
            SystemFunction::False => Ok(boolean(false)),
            SystemFunction::Count => {
                let n = count_items(self.arg(0)?.iterate(ctx)?)?;
                let n = i64::try_from(n).map_err(|_| Error::from_code(ErrorCode::FOAR0002, "count overflow"))?;
                Ok(Some(XdmItem::Atomic(XdmAtomicValue::Integer(n))))
            }
            SystemFunction::Empty => Ok(boolean(first_item(self.arg(0)?.iterate(ctx)?)?.is_none())),
            SystemFunction::Exists => Ok(boolean(first_item(self.arg(0)?.iterate(ctx)?)?.is_some())),
            SystemFunction::Boolean => Ok(boolean(self.arg(0)?.effective_boolean_value(ctx)?)),
            SystemFunction::Not => Ok(boolean(!self.arg(0)?.effective_boolean_value(ctx)?)),
            SystemFunction::String => match self.arg(0)?.evaluate_item(ctx)? {
                None => Ok(string(String::new())),
                Some(XdmItem::Atomic(a)) => Ok(string(a.string_value())),
                Some(XdmItem::Node(n)) => Ok(string(n.string_value())),
                Some(_) => Err(Error::from_code(
                    ErrorCode::FOTY0013,
                    "fn:string is not defined for a function item or external object",
                )
                .at(self.loc)),
            },
            SystemFunction::StringLength => {
                let n = self
                    .arg(0)?
                    .evaluate_atomic(ctx)?
                    .map_or(0, |v| v.string_value().chars().count());
                let n = i64::try_from(n).map_err(|_| Error::from_code(ErrorCode::FOAR0002, "string too long"))?;
                Ok(Some(XdmItem::Atomic(XdmAtomicValue::Integer(n))))
            }
            SystemFunction::GenerateId => match self.arg(0)?.evaluate_item(ctx)? {
                None => Ok(string(String::new())),
                Some(XdmItem::Node(n)) => Ok(string(n.generate_id())),
                Some(_) => Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    "the argument of fn:generate-id must be a node",
                )
                .at(self.loc)),
            },
            SystemFunction::Subsequence | SystemFunction::Reverse | SystemFunction::Data => {
                single_item(self.iterate(ctx)?)
            }
        }
    }
}

fn ordinal(i: usize) -> &'static str {
    match i {
        0 => "first",
        1 => "second",
        2 => "third",
        _ => "an",
    }
}

/// 1-based positions selected by `subsequence($s, start, length)`.
///
/// Positions `p` with `round(start) <= p < round(start) + round(length)`;
/// rounding is half towards positive infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    /// First selected position, `None` when nothing is selected.
    first: Option<usize>,
    /// Number of positions from `first`, `None` when unbounded.
    limit: Option<usize>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
impl Window {
    fn new(start: f64, length: Option<f64>) -> Self {
        const NOTHING: Window = Window { first: None, limit: None };
        let round = |x: f64| (x + 0.5).floor();
        let s = round(start);
        if s.is_nan() || s == f64::INFINITY {
            return NOTHING;
        }
        let first = s.max(1.0);
        if first >= usize::MAX as f64 {
            return NOTHING;
        }
        let Some(length) = length else {
            return Window {
                first: Some(first as usize),
                limit: None,
            };
        };
        let end = s + round(length);
        if end.is_nan() || end <= first {
            return NOTHING;
        }
        let limit = if end.is_infinite() || end - first >= usize::MAX as f64 {
            None
        } else {
            Some((end - first) as usize)
        };
        Window {
            first: Some(first as usize),
            limit,
        }
    }

    fn contains(self, position: usize) -> bool {
        match self.first {
            None => false,
            Some(first) => position >= first && self.limit.is_none_or(|l| position - first < l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain(2.0, Some(3.0), Some(2), Some(3))]
    #[case::rounds_half_up(1.5, Some(2.5), Some(2), Some(3))]
    #[case::negative_start(-1.0, Some(3.0), Some(1), Some(1))]
    #[case::no_length(3.2, None, Some(3), None)]
    #[case::nan_start(f64::NAN, Some(3.0), None, None)]
    #[case::infinite_length(2.0, Some(f64::INFINITY), Some(2), None)]
    #[case::minus_infinity_plus_infinity(f64::NEG_INFINITY, Some(f64::INFINITY), None, None)]
    #[case::zero_length(4.0, Some(0.0), None, None)]
    fn subsequence_window(
        #[case] start: f64,
        #[case] length: Option<f64>,
        #[case] first: Option<usize>,
        #[case] limit: Option<usize>,
    ) {
        assert_eq!(Window::new(start, length), Window { first, limit });
    }

    #[test]
    fn zero_argument_forms_take_the_context_item() {
        let out = SystemCall::new(SystemFunction::StringLength, vec![]).simplify().expect("simplify");
        let Expr::Call(call) = out else {
            panic!("expected a call, got {out:?}");
        };
        assert!(matches!(call.args.as_slice(), [Expr::ContextItem(_)]));
    }

    #[test]
    fn literal_calls_fold() {
        let call = SystemCall::new(
            SystemFunction::Subsequence,
            vec![
                Expr::atomics((1..=5).map(XdmAtomicValue::Integer).collect()),
                Expr::double(2.0),
                Expr::double(2.0),
            ],
        );
        assert_eq!(
            call.fold_constant(),
            Some(vec![XdmAtomicValue::Integer(2), XdmAtomicValue::Integer(3)])
        );
        let count = SystemCall::new(SystemFunction::Count, vec![Expr::Literal(Literal::range(1, 1000))]);
        assert_eq!(count.fold_constant(), Some(vec![XdmAtomicValue::Integer(1000)]));
    }

    #[test]
    fn not_of_empty_becomes_exists() {
        let x = Expr::external_var(crate::xdm::ExpandedName::local("x"));
        let call = SystemCall::new(SystemFunction::Not, vec![Expr::call(SystemFunction::Empty, vec![x.clone()])]);
        let (rule, out) = call.rewrite().expect("rewrite");
        assert_eq!(rule, "not-empty");
        assert_eq!(out, Expr::call(SystemFunction::Exists, vec![x]));
    }
}
