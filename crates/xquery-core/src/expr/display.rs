//! Query-like rendering of expression trees, used in traces and messages.

use core::fmt;

use itertools::Itertools;

use super::{Expr, IdentityOp, LiteralValue, LogicalOp, VarTarget};
use crate::xdm::XdmAtomicValue;

fn write_atomic(f: &mut fmt::Formatter<'_>, v: &XdmAtomicValue) -> fmt::Result {
    match v {
        XdmAtomicValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
        XdmAtomicValue::Integer(_) | XdmAtomicValue::Decimal(_) | XdmAtomicValue::Double(_) => {
            f.write_str(&v.string_value())
        }
        XdmAtomicValue::Boolean(b) => write!(f, "{b}()"),
        other => write!(f, "{}(\"{}\")", other.atomic_type(), other.string_value()),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    write!(f, "{}", items.iter().format(", "))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(l) => match &l.value {
                LiteralValue::Range { start, end } => write!(f, "({start} to {end})"),
                LiteralValue::Atomics(values) if values.len() == 1 => write_atomic(f, &values[0]),
                LiteralValue::Atomics(values) => {
                    f.write_str("(")?;
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write_atomic(f, v)?;
                    }
                    f.write_str(")")
                }
            },
            Expr::VarRef(v) => match v.target {
                VarTarget::Local(slot) => write!(f, "${}:{}", v.name, slot.index()),
                VarTarget::External => write!(f, "${}", v.name),
            },
            Expr::ContextItem(_) => f.write_str("."),
            Expr::Position => f.write_str("position()"),
            Expr::Last => f.write_str("last()"),
            Expr::IsLast(c) => write!(f, "is-last({})", c.condition),
            Expr::Axis(a) => write!(f, "{a}"),
            Expr::Slash(p) => write!(f, "{}/{}", p.start, p.step),
            Expr::SimpleStep(p) => write!(f, "{}!{}", p.start, p.step),
            Expr::Filter(x) => write!(f, "{}[{}]", x.base, x.predicate),
            Expr::FirstItem(e) => write!(f, "{e}[1]"),
            Expr::LastItem(e) => write!(f, "{e}[last()]"),
            Expr::Tail(t) => write!(f, "tail({}, {})", t.base, t.start),
            Expr::Block(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Expr::Range(r) => write!(f, "({} to {})", r.start, r.end),
            Expr::ValueComparison(c) => write!(f, "({} {} {})", c.left, c.op.value_token(), c.right),
            Expr::GeneralComparison(c) => write!(f, "({} {} {})", c.left, c.op.general_token(), c.right),
            Expr::CompareToInteger(c) => write!(f, "({} {} {})", c.operand, c.op.value_token(), c.value),
            Expr::Identity(c) => {
                let op = match c.op {
                    IdentityOp::Is => "is",
                    IdentityOp::Precedes => "<<",
                    IdentityOp::Follows => ">>",
                };
                write!(f, "({} {op} {})", c.left, c.right)
            }
            Expr::Intersect(i) => write!(f, "({} intersect {})", i.left, i.right),
            Expr::Logical(l) => {
                let op = match l.op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                write!(f, "({} {op} {})", l.left, l.right)
            }
            Expr::Choose(c) => write!(f, "if ({}) then {} else {}", c.condition, c.then, c.otherwise),
            Expr::For(x) => write!(f, "for {} in {} return {}", x.var, x.sequence, x.action),
            Expr::Let(x) => write!(f, "let {} := {} return {}", x.var, x.sequence, x.action),
            Expr::Atomizer(a) => write!(f, "data({})", a.operand),
            Expr::Convert(c) => write!(f, "convert({}, {})", c.operand, c.target),
            Expr::UntypedConvert(c) => write!(f, "convert-untyped({}, {})", c.operand, c.target),
            Expr::CardinalityCheck(c) => write!(f, "check-{}({})", c.required.indicator(), c.operand),
            Expr::Arithmetic(a) => write!(f, "({} {} {})", a.left, a.op, a.right),
            Expr::Call(c) => {
                write!(f, "{}(", c.function.name())?;
                write_list(f, &c.args)?;
                f.write_str(")")
            }
            Expr::Extension(c) => {
                write!(f, "{}(", c.name)?;
                write_list(f, &c.args)?;
                f.write_str(")")
            }
        }
    }
}
