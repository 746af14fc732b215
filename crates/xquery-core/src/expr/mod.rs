//! Expression tree: static typing, rewrites and lazy evaluation.
//!
//! `Expr` is a closed sum over expression kinds. Compilation runs three pure
//! passes, each consuming a tree and returning its replacement:
//! [`Expr::simplify`] (local folding), [`Expr::type_check`] (static types,
//! implicit atomization and cardinality checks, static errors) and
//! [`Expr::optimize`] (rewrites into cheaper equivalent forms). Evaluation
//! either pulls items through [`Expr::iterate`] or computes a single item via
//! [`Expr::evaluate_item`].

use bitflags::bitflags;
use smallvec::{SmallVec, smallvec};

use crate::engine::context::{SlotId, XPathContext};
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::iter::{self, BoxedIter};
use crate::model::XdmNode;
use crate::types::{Cardinality, ItemType, SequenceType, TypeHierarchy};
use crate::xdm::{XdmAtomicValue, XdmItem};

pub mod arithmetic;
pub mod atomizer;
pub mod compare;
pub mod conversion;
mod display;
pub mod extension;
pub mod flwor;
pub mod functions;
pub mod general_comparison;
pub mod identity;
pub mod literal;
pub mod logic;
pub mod path;
pub mod range;
pub mod value_comparison;
pub mod variables;
pub mod visitor;

pub use arithmetic::{ArithmeticExpr, ArithmeticOp};
pub use atomizer::Atomizer;
pub use compare::{AtomicComparer, BoundComparer, ComparisonOp};
pub use conversion::{AtomicSequenceConverter, CardinalityChecker, UntypedAtomicConverter, static_type_check};
pub use extension::ExtensionCall;
pub use flwor::{ForExpr, LetExpr};
pub use functions::{SystemCall, SystemFunction};
pub use general_comparison::GeneralComparison;
pub use identity::{IdentityComparison, IdentityOp, IntersectExpr};
pub use literal::{Literal, LiteralValue};
pub use logic::{ChooseExpr, LogicalExpr, LogicalOp};
pub use path::{Axis, AxisStep, ContextItemExpr, FilterExpr, IsLastExpr, NodeTest, PathExpr, TailExpr};
pub use range::RangeExpr;
pub use value_comparison::{CompareToIntegerConstant, ValueComparison};
pub use variables::{VarBinding, VarTarget, VariableRef};
pub use visitor::{ExpressionVisitor, compile, compile_with_context, evaluate};

bitflags! {
    /// Static properties derived from an expression and its operands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpecialProps: u8 {
        /// Evaluating twice yields identical nodes; safe to hoist or share.
        const NON_CREATIVE = 1;
        /// Reads the context item.
        const CONTEXT_DEPENDENT = 1 << 1;
        /// Reads the context position.
        const POSITION_DEPENDENT = 1 << 2;
        /// Reads the context size.
        const LAST_DEPENDENT = 1 << 3;
        /// Nodes in document order without duplicates.
        const ORDERED_NODESET = 1 << 4;
    }
}

impl SpecialProps {
    pub const FOCUS_DEPENDENT: Self = Self::CONTEXT_DEPENDENT
        .union(Self::POSITION_DEPENDENT)
        .union(Self::LAST_DEPENDENT);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VarRef(VariableRef),
    ContextItem(ContextItemExpr),
    Position,
    Last,
    IsLast(IsLastExpr),
    Axis(AxisStep),
    Slash(PathExpr),
    SimpleStep(PathExpr),
    Filter(FilterExpr),
    FirstItem(Box<Expr>),
    LastItem(Box<Expr>),
    Tail(TailExpr),
    Block(Vec<Expr>),
    Range(RangeExpr),
    ValueComparison(ValueComparison),
    GeneralComparison(GeneralComparison),
    CompareToInteger(CompareToIntegerConstant),
    Identity(IdentityComparison),
    Intersect(IntersectExpr),
    Logical(LogicalExpr),
    Choose(ChooseExpr),
    For(ForExpr),
    Let(LetExpr),
    Atomizer(Atomizer),
    Convert(AtomicSequenceConverter),
    UntypedConvert(UntypedAtomicConverter),
    CardinalityCheck(CardinalityChecker),
    Arithmetic(ArithmeticExpr),
    Call(SystemCall),
    Extension(ExtensionCall),
}

// Constructors used by the parser front end and by rewrites.
impl Expr {
    pub fn empty() -> Self {
        Expr::Literal(Literal::empty())
    }

    pub fn atomic(value: XdmAtomicValue) -> Self {
        Expr::Literal(Literal::atomics(vec![value]))
    }

    pub fn atomics(values: Vec<XdmAtomicValue>) -> Self {
        Expr::Literal(Literal::atomics(values))
    }

    pub fn integer(i: i64) -> Self {
        Self::atomic(XdmAtomicValue::Integer(i))
    }

    pub fn double(d: f64) -> Self {
        Self::atomic(XdmAtomicValue::Double(d))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::atomic(XdmAtomicValue::String(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Self::atomic(XdmAtomicValue::Boolean(b))
    }

    pub fn var(binding: &VarBinding) -> Self {
        Expr::VarRef(VariableRef::local(binding))
    }

    pub fn external_var(name: crate::xdm::ExpandedName) -> Self {
        Expr::VarRef(VariableRef::external(name))
    }

    pub fn context_item() -> Self {
        Expr::ContextItem(ContextItemExpr::default())
    }

    pub fn axis(axis: Axis, test: NodeTest) -> Self {
        Expr::Axis(AxisStep { axis, test })
    }

    pub fn path(start: Expr, step: Expr) -> Self {
        Expr::Slash(PathExpr::new(start, step))
    }

    pub fn filter(base: Expr, predicate: Expr) -> Self {
        Expr::Filter(FilterExpr::new(base, predicate))
    }

    pub fn sequence(items: Vec<Expr>) -> Self {
        Expr::Block(items)
    }

    pub fn range(start: Expr, end: Expr) -> Self {
        Expr::Range(RangeExpr::new(start, end))
    }

    pub fn value_compare(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Expr::ValueComparison(ValueComparison::new(left, op, right))
    }

    pub fn general_compare(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Expr::GeneralComparison(GeneralComparison::new(left, op, right))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Logical(LogicalExpr::new(LogicalOp::And, left, right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Logical(LogicalExpr::new(LogicalOp::Or, left, right))
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Choose(ChooseExpr::new(condition, then, otherwise))
    }

    pub fn for_in(var: VarBinding, sequence: Expr, action: Expr) -> Self {
        Expr::For(ForExpr::new(var, sequence, action))
    }

    pub fn let_in(var: VarBinding, sequence: Expr, action: Expr) -> Self {
        Expr::Let(LetExpr::new(var, sequence, action))
    }

    pub fn arithmetic(left: Expr, op: ArithmeticOp, right: Expr) -> Self {
        Expr::Arithmetic(ArithmeticExpr::new(left, op, right))
    }

    pub fn call(function: SystemFunction, args: Vec<Expr>) -> Self {
        Expr::Call(SystemCall::new(function, args))
    }

    pub fn atomize(operand: Expr) -> Self {
        Expr::Atomizer(Atomizer::new(operand))
    }

    pub fn identity(left: Expr, op: IdentityOp, right: Expr) -> Self {
        Expr::Identity(IdentityComparison::new(left, op, right))
    }

    pub fn intersect(left: Expr, right: Expr) -> Self {
        Expr::Intersect(IntersectExpr::new(left, right))
    }

    pub fn tail(base: Expr, start: usize) -> Self {
        Expr::Tail(TailExpr {
            base: Box::new(base),
            start,
        })
    }

    pub fn extension(name: crate::xdm::ExpandedName, args: Vec<Expr>) -> Self {
        Expr::Extension(ExtensionCall::new(name, args))
    }

    /// Attach a source location to expressions that report errors.
    #[must_use]
    pub fn at(mut self, loc: SourceLocation) -> Self {
        match &mut self {
            Expr::VarRef(e) => e.loc = Some(loc),
            Expr::ValueComparison(e) => e.loc = Some(loc),
            Expr::GeneralComparison(e) => e.loc = Some(loc),
            Expr::Atomizer(e) => e.loc = Some(loc),
            Expr::Arithmetic(e) => e.loc = Some(loc),
            Expr::Call(e) => e.loc = Some(loc),
            Expr::Extension(e) => e.loc = Some(loc),
            Expr::CardinalityCheck(e) => e.loc = Some(loc),
            Expr::Convert(e) => e.loc = Some(loc),
            Expr::Range(e) => e.loc = Some(loc),
            _ => {}
        }
        self
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Expr::VarRef(e) => e.loc,
            Expr::ValueComparison(e) => e.loc,
            Expr::GeneralComparison(e) => e.loc,
            Expr::Atomizer(e) => e.loc,
            Expr::Arithmetic(e) => e.loc,
            Expr::Call(e) => e.loc,
            Expr::Extension(e) => e.loc,
            Expr::CardinalityCheck(e) => e.loc,
            Expr::Convert(e) => e.loc,
            Expr::Range(e) => e.loc,
            _ => None,
        }
    }
}

// Tree traversal and static queries.
impl Expr {
    pub fn children(&self) -> SmallVec<[&Expr; 4]> {
        match self {
            Expr::Literal(_)
            | Expr::VarRef(_)
            | Expr::ContextItem(_)
            | Expr::Position
            | Expr::Last
            | Expr::IsLast(_)
            | Expr::Axis(_) => SmallVec::new(),
            Expr::Slash(p) | Expr::SimpleStep(p) => smallvec![&*p.start, &*p.step],
            Expr::Filter(f) => smallvec![&*f.base, &*f.predicate],
            Expr::FirstItem(e) | Expr::LastItem(e) => smallvec![&**e],
            Expr::Tail(t) => smallvec![&*t.base],
            Expr::Block(items) => items.iter().collect(),
            Expr::Range(r) => smallvec![&*r.start, &*r.end],
            Expr::ValueComparison(c) => smallvec![&*c.left, &*c.right],
            Expr::GeneralComparison(c) => smallvec![&*c.left, &*c.right],
            Expr::CompareToInteger(c) => smallvec![&*c.operand],
            Expr::Identity(c) => smallvec![&*c.left, &*c.right],
            Expr::Intersect(c) => smallvec![&*c.left, &*c.right],
            Expr::Logical(l) => smallvec![&*l.left, &*l.right],
            Expr::Choose(c) => smallvec![&*c.condition, &*c.then, &*c.otherwise],
            Expr::For(f) => smallvec![&*f.sequence, &*f.action],
            Expr::Let(l) => smallvec![&*l.sequence, &*l.action],
            Expr::Atomizer(a) => smallvec![&*a.operand],
            Expr::Convert(c) => smallvec![&*c.operand],
            Expr::UntypedConvert(c) => smallvec![&*c.operand],
            Expr::CardinalityCheck(c) => smallvec![&*c.operand],
            Expr::Arithmetic(a) => smallvec![&*a.left, &*a.right],
            Expr::Call(c) => c.args.iter().collect(),
            Expr::Extension(c) => c.args.iter().collect(),
        }
    }

    pub fn children_mut(&mut self) -> SmallVec<[&mut Expr; 4]> {
        match self {
            Expr::Literal(_)
            | Expr::VarRef(_)
            | Expr::ContextItem(_)
            | Expr::Position
            | Expr::Last
            | Expr::IsLast(_)
            | Expr::Axis(_) => SmallVec::new(),
            Expr::Slash(p) | Expr::SimpleStep(p) => smallvec![&mut *p.start, &mut *p.step],
            Expr::Filter(f) => smallvec![&mut *f.base, &mut *f.predicate],
            Expr::FirstItem(e) | Expr::LastItem(e) => smallvec![&mut **e],
            Expr::Tail(t) => smallvec![&mut *t.base],
            Expr::Block(items) => items.iter_mut().collect(),
            Expr::Range(r) => smallvec![&mut *r.start, &mut *r.end],
            Expr::ValueComparison(c) => smallvec![&mut *c.left, &mut *c.right],
            Expr::GeneralComparison(c) => smallvec![&mut *c.left, &mut *c.right],
            Expr::CompareToInteger(c) => smallvec![&mut *c.operand],
            Expr::Identity(c) => smallvec![&mut *c.left, &mut *c.right],
            Expr::Intersect(c) => smallvec![&mut *c.left, &mut *c.right],
            Expr::Logical(l) => smallvec![&mut *l.left, &mut *l.right],
            Expr::Choose(c) => smallvec![&mut *c.condition, &mut *c.then, &mut *c.otherwise],
            Expr::For(f) => smallvec![&mut *f.sequence, &mut *f.action],
            Expr::Let(l) => smallvec![&mut *l.sequence, &mut *l.action],
            Expr::Atomizer(a) => smallvec![&mut *a.operand],
            Expr::Convert(c) => smallvec![&mut *c.operand],
            Expr::UntypedConvert(c) => smallvec![&mut *c.operand],
            Expr::CardinalityCheck(c) => smallvec![&mut *c.operand],
            Expr::Arithmetic(a) => smallvec![&mut *a.left, &mut *a.right],
            Expr::Call(c) => c.args.iter_mut().collect(),
            Expr::Extension(c) => c.args.iter_mut().collect(),
        }
    }

    /// Replace every operand with `f(operand)`.
    pub fn try_map_children(mut self, f: &mut dyn FnMut(Expr) -> Result<Expr, Error>) -> Result<Expr, Error> {
        for child in self.children_mut() {
            let taken = std::mem::replace(child, Expr::empty());
            *child = f(taken)?;
        }
        Ok(self)
    }

    /// Operands evaluated with a focus other than this expression's own.
    pub(crate) fn focus_setting_child(&self, index: usize) -> bool {
        matches!(
            (self, index),
            (Expr::Slash(_) | Expr::SimpleStep(_) | Expr::Filter(_), 1)
        )
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            Expr::Literal(l) => l.item_type(),
            Expr::VarRef(v) => v.static_type.item_type,
            Expr::ContextItem(c) => c.static_type,
            Expr::Position | Expr::Last => ItemType::INTEGER,
            Expr::IsLast(_)
            | Expr::ValueComparison(_)
            | Expr::GeneralComparison(_)
            | Expr::CompareToInteger(_)
            | Expr::Identity(_)
            | Expr::Logical(_) => ItemType::BOOLEAN,
            Expr::Axis(a) => a.item_type(),
            Expr::Slash(p) | Expr::SimpleStep(p) => p.step.item_type(),
            Expr::Filter(f) => f.base.item_type(),
            Expr::FirstItem(e) | Expr::LastItem(e) => e.item_type(),
            Expr::Tail(t) => t.base.item_type(),
            Expr::Block(items) => {
                let th = TypeHierarchy;
                items
                    .iter()
                    .filter(|e| !e.cardinality().is_empty_only())
                    .map(Expr::item_type)
                    .reduce(|a, b| th.common_super_type(&a, &b))
                    .unwrap_or(ItemType::Empty)
            }
            Expr::Range(_) => ItemType::INTEGER,
            Expr::Intersect(i) => i.left.item_type(),
            Expr::Choose(c) => c.item_type(),
            Expr::For(f) => f.action.item_type(),
            Expr::Let(l) => l.action.item_type(),
            Expr::Atomizer(a) => a.item_type(),
            Expr::Convert(c) => ItemType::Atomic(c.target),
            Expr::UntypedConvert(c) => c.item_type(),
            Expr::CardinalityCheck(c) => c.operand.item_type(),
            Expr::Arithmetic(a) => a.item_type(),
            Expr::Call(c) => c.item_type(),
            Expr::Extension(c) => c.result_type().item_type,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Expr::Literal(l) => l.cardinality(),
            Expr::VarRef(v) => v.static_type.cardinality,
            Expr::ContextItem(_) | Expr::Position | Expr::Last | Expr::IsLast(_) => Cardinality::EXACTLY_ONE,
            Expr::GeneralComparison(_) | Expr::CompareToInteger(_) | Expr::Logical(_) => Cardinality::EXACTLY_ONE,
            Expr::ValueComparison(c) => c.cardinality(),
            Expr::Identity(c) => c.cardinality(),
            Expr::Axis(a) => a.cardinality(),
            Expr::Slash(p) | Expr::SimpleStep(p) => p.cardinality(),
            Expr::Filter(f) => f.cardinality(),
            Expr::FirstItem(e) | Expr::LastItem(e) => {
                if e.cardinality().allows_zero() {
                    Cardinality::ZERO_OR_ONE
                } else {
                    Cardinality::EXACTLY_ONE
                }
            }
            Expr::Tail(t) => t.cardinality(),
            Expr::Block(items) => items
                .iter()
                .map(Expr::cardinality)
                .fold(Cardinality::EMPTY, Cardinality::sum),
            Expr::Range(_) => Cardinality::ZERO_OR_MORE,
            Expr::Intersect(i) => i.cardinality(),
            Expr::Choose(c) => c.then.cardinality() | c.otherwise.cardinality(),
            Expr::For(f) => f.cardinality(),
            Expr::Let(l) => l.action.cardinality(),
            Expr::Atomizer(a) => a.cardinality(),
            Expr::Convert(c) => c.operand.cardinality(),
            Expr::UntypedConvert(c) => c.operand.cardinality(),
            Expr::CardinalityCheck(c) => c.operand.cardinality() & c.required,
            Expr::Arithmetic(a) => a.cardinality(),
            Expr::Call(c) => c.cardinality(),
            Expr::Extension(c) => c.result_type().cardinality,
        }
    }

    pub fn sequence_type(&self) -> SequenceType {
        SequenceType::new(self.item_type(), self.cardinality())
    }

    pub fn special_properties(&self) -> SpecialProps {
        let own = match self {
            Expr::ContextItem(_) | Expr::Axis(_) => SpecialProps::CONTEXT_DEPENDENT,
            Expr::Position => SpecialProps::POSITION_DEPENDENT,
            Expr::Last => SpecialProps::LAST_DEPENDENT,
            Expr::IsLast(_) => SpecialProps::POSITION_DEPENDENT | SpecialProps::LAST_DEPENDENT,
            Expr::Call(c) if c.args.is_empty() && c.function.uses_context_item() => SpecialProps::CONTEXT_DEPENDENT,
            _ => SpecialProps::empty(),
        };
        let mut props = own | SpecialProps::NON_CREATIVE;
        for (i, child) in self.children().into_iter().enumerate() {
            let cp = child.special_properties();
            if !cp.contains(SpecialProps::NON_CREATIVE) {
                props.remove(SpecialProps::NON_CREATIVE);
            }
            if !self.focus_setting_child(i) {
                props |= cp & SpecialProps::FOCUS_DEPENDENT;
            }
        }
        if let Expr::Extension(c) = self
            && !c.is_pure()
        {
            props.remove(SpecialProps::NON_CREATIVE);
        }
        let ordered = match self {
            Expr::Axis(_) | Expr::Slash(_) | Expr::SimpleStep(_) | Expr::Intersect(_) => true,
            Expr::Filter(f) => f.base.special_properties().contains(SpecialProps::ORDERED_NODESET),
            Expr::FirstItem(e) | Expr::LastItem(e) => matches!(e.item_type(), ItemType::Node(_)),
            Expr::Tail(t) => t.base.special_properties().contains(SpecialProps::ORDERED_NODESET),
            Expr::ContextItem(c) => matches!(c.static_type, ItemType::Node(_)),
            _ => false,
        };
        if ordered && matches!(self.item_type(), ItemType::Node(_)) {
            props |= SpecialProps::ORDERED_NODESET;
        }
        props
    }

    pub fn depends_on_focus(&self) -> bool {
        self.special_properties().intersects(SpecialProps::FOCUS_DEPENDENT)
    }

    pub fn is_non_creative(&self) -> bool {
        self.special_properties().contains(SpecialProps::NON_CREATIVE)
    }

    pub fn references_slot(&self, slot: SlotId) -> bool {
        self.count_references(slot) > 0
    }

    /// Syntactic references to `slot` in this tree.
    pub fn count_references(&self, slot: SlotId) -> usize {
        match self {
            Expr::VarRef(v) if v.target == VarTarget::Local(slot) => 1,
            _ => self.children().iter().map(|c| c.count_references(slot)).sum(),
        }
    }

    /// Slots of every `for`/`let` bound inside this tree.
    pub fn bound_slots(&self, out: &mut Vec<SlotId>) {
        match self {
            Expr::For(f) => out.push(f.var.slot),
            Expr::Let(l) => out.push(l.var.slot),
            _ => {}
        }
        for c in self.children() {
            c.bound_slots(out);
        }
    }

    /// Record the static type of references to `slot`.
    pub(crate) fn bind_variable_type(&mut self, slot: SlotId, ty: SequenceType) {
        if let Expr::VarRef(v) = self
            && v.target == VarTarget::Local(slot)
        {
            v.static_type = ty;
            return;
        }
        for c in self.children_mut() {
            c.bind_variable_type(slot, ty);
        }
    }

    /// Replace references to `slot` by copies of `replacement`.
    pub(crate) fn replace_variable(self, slot: SlotId, replacement: &Expr) -> Result<Expr, Error> {
        match self {
            Expr::VarRef(v) if v.target == VarTarget::Local(slot) => Ok(replacement.clone()),
            other => other.try_map_children(&mut |c| c.replace_variable(slot, replacement)),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_empty_literal(&self) -> bool {
        self.as_literal().is_some_and(Literal::is_empty)
    }

    pub fn as_single_atomic(&self) -> Option<&XdmAtomicValue> {
        self.as_literal().and_then(Literal::single)
    }

    pub fn as_integer_literal(&self) -> Option<i64> {
        match self.as_single_atomic()? {
            XdmAtomicValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean_literal(&self) -> Option<bool> {
        match self.as_single_atomic()? {
            XdmAtomicValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Arguments of a call to `function`, if this is one.
    pub fn as_call(&self, function: SystemFunction) -> Option<&[Expr]> {
        match self {
            Expr::Call(c) if c.function == function => Some(&c.args),
            _ => None,
        }
    }
}

// Compilation passes.
impl Expr {
    /// Local folding that needs no type information.
    pub fn simplify(self) -> Result<Expr, Error> {
        let expr = self.try_map_children(&mut Expr::simplify)?;
        match expr {
            Expr::Block(items) => Ok(logic::simplify_block(items)),
            Expr::Call(c) => c.simplify(),
            Expr::Logical(l) => Ok(l.simplify()),
            Expr::Choose(c) => Ok(c.simplify()),
            Expr::Arithmetic(a) => Ok(a.simplify()),
            other => Ok(other),
        }
    }

    pub fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        match self {
            Expr::Literal(_) | Expr::Position | Expr::Last | Expr::IsLast(_) => Ok(self),
            Expr::VarRef(r) => r.type_check(v),
            Expr::ContextItem(mut c) => {
                c.static_type = v.context_item_type.unwrap_or(ItemType::AnyItem);
                Ok(Expr::ContextItem(c))
            }
            Expr::Axis(a) => a.type_check(v),
            Expr::Slash(p) => p.type_check(v),
            Expr::SimpleStep(p) => p.type_check_simple(v),
            Expr::Filter(f) => f.type_check(v),
            Expr::Range(r) => r.type_check(v),
            Expr::ValueComparison(c) => c.type_check(v),
            Expr::GeneralComparison(c) => c.type_check(v),
            Expr::Identity(c) => c.type_check(v),
            Expr::Intersect(c) => c.type_check(v),
            Expr::Logical(l) => l.type_check(v),
            Expr::For(f) => f.type_check(v),
            Expr::Let(l) => l.type_check(v),
            Expr::Atomizer(a) => a.type_check(v),
            Expr::Arithmetic(a) => a.type_check(v),
            Expr::Call(c) => c.type_check(v),
            Expr::Extension(c) => c.type_check(v),
            other => other.try_map_children(&mut |c| c.type_check(v)),
        }
    }

    pub fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        match self {
            Expr::Literal(_) | Expr::VarRef(_) | Expr::ContextItem(_) | Expr::Position | Expr::Last => Ok(self),
            Expr::Slash(p) => p.optimize(v),
            Expr::SimpleStep(p) => p.optimize_simple(v),
            Expr::Filter(f) => f.optimize(v),
            Expr::Block(items) => {
                let items = items.into_iter().map(|e| e.optimize(v)).collect::<Result<Vec<_>, _>>()?;
                Ok(logic::simplify_block(items))
            }
            Expr::Range(r) => r.optimize(v),
            Expr::ValueComparison(c) => c.optimize(v),
            Expr::GeneralComparison(c) => c.optimize(v),
            Expr::Identity(c) => c.optimize(v),
            Expr::Intersect(c) => c.optimize(v),
            Expr::Logical(l) => l.optimize(v),
            Expr::Choose(c) => c.optimize(v),
            Expr::For(f) => f.optimize(v),
            Expr::Let(l) => l.optimize(v),
            Expr::Atomizer(a) => a.optimize(v),
            Expr::Convert(c) => c.optimize(v),
            Expr::UntypedConvert(c) => c.optimize(v),
            Expr::CardinalityCheck(c) => c.optimize(v),
            Expr::Arithmetic(a) => a.optimize(v),
            Expr::Call(c) => c.optimize(v),
            other => other.try_map_children(&mut |c| c.optimize(v)),
        }
    }
}

// Evaluation.
impl Expr {
    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        match self {
            Expr::Literal(l) => Ok(l.iterate()),
            Expr::VarRef(r) => r.iterate(ctx),
            Expr::Axis(a) => a.iterate(ctx),
            Expr::Slash(p) => p.iterate(ctx),
            Expr::SimpleStep(p) => p.iterate_simple(ctx),
            Expr::Filter(f) => f.iterate(ctx),
            Expr::Tail(t) => Ok(Box::new(iter::TailIterator::new(t.base.iterate(ctx)?, t.start))),
            Expr::Block(items) => Ok(Box::new(logic::BlockIterator::new(items, ctx.clone()))),
            Expr::Range(r) => r.iterate(ctx),
            Expr::Intersect(i) => i.iterate(ctx),
            Expr::Choose(c) => c.iterate(ctx),
            Expr::For(f) => f.iterate(ctx),
            Expr::Let(l) => l.iterate(ctx),
            Expr::Atomizer(a) => a.iterate(ctx),
            Expr::Convert(c) => c.iterate(ctx),
            Expr::UntypedConvert(c) => c.iterate(ctx),
            Expr::CardinalityCheck(c) => c.iterate(ctx),
            Expr::Call(c) => c.iterate(ctx),
            Expr::Extension(c) => c.iterate(ctx),
            _ => Ok(iter::optional(self.evaluate_item(ctx)?)),
        }
    }

    /// Evaluate an expression whose static cardinality is at most one.
    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        let boolean = |b: bool| Some(XdmItem::Atomic(XdmAtomicValue::Boolean(b)));
        match self {
            Expr::Literal(l) => Ok(l.single().cloned().map(XdmItem::Atomic)),
            Expr::ContextItem(_) => ctx.context_item().cloned().map(Some),
            Expr::Position => Ok(Some(integer_item(ctx.position()?))),
            Expr::Last => Ok(Some(integer_item(ctx.last()?))),
            Expr::IsLast(c) => Ok(boolean((ctx.position()? == ctx.last()?) == c.condition)),
            Expr::FirstItem(e) => iter::first_item(e.iterate(ctx)?),
            Expr::LastItem(e) => iter::last_item(e.iterate(ctx)?),
            Expr::ValueComparison(c) => c.evaluate_item(ctx),
            Expr::GeneralComparison(c) => c.evaluate(ctx).map(boolean),
            Expr::CompareToInteger(c) => c.evaluate(ctx).map(boolean),
            Expr::Identity(c) => c.evaluate_item(ctx),
            Expr::Logical(l) => l.evaluate(ctx).map(boolean),
            Expr::Choose(c) => c.evaluate_item(ctx),
            Expr::Arithmetic(a) => a.evaluate_item(ctx),
            Expr::Call(c) => c.evaluate_item(ctx),
            _ => iter::single_item(self.iterate(ctx)?),
        }
    }

    pub fn effective_boolean_value<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<bool, Error> {
        match self {
            Expr::ValueComparison(c) => Ok(matches!(
                c.evaluate_item(ctx)?,
                Some(XdmItem::Atomic(XdmAtomicValue::Boolean(true)))
            )),
            Expr::GeneralComparison(c) => c.evaluate(ctx),
            Expr::CompareToInteger(c) => c.evaluate(ctx),
            Expr::Logical(l) => l.evaluate(ctx),
            _ => effective_boolean_value(self.iterate(ctx)?),
        }
    }

    /// Evaluate to at most one atomic value; nodes are atomized.
    pub(crate) fn evaluate_atomic<'a, N: XdmNode>(
        &'a self,
        ctx: &XPathContext<'a, N>,
    ) -> Result<Option<XdmAtomicValue>, Error> {
        match self.evaluate_item(ctx)? {
            None => Ok(None),
            Some(XdmItem::Atomic(a)) => Ok(Some(a)),
            Some(item) => {
                let mut values = iter::atomize_item(item)?.into_iter();
                match (values.next(), values.next()) {
                    (first, None) => Ok(first),
                    _ => Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        "a sequence of more than one item is not allowed here",
                    )),
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn integer_item<N>(n: usize) -> XdmItem<N> {
    XdmItem::Atomic(XdmAtomicValue::Integer(n as i64))
}

/// Effective boolean value of a sequence.
pub fn effective_boolean_value<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<bool, Error> {
    let Some(first) = it.next_item().transpose()? else {
        return Ok(false);
    };
    if let XdmItem::Node(_) = first {
        it.close();
        return Ok(true);
    }
    if it.next_item().transpose()?.is_some() {
        return Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of two or more items starting with an atomic value",
        ));
    }
    match first {
        XdmItem::Atomic(a) => atomic_ebv(&a),
        _ => Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a function item or external object",
        )),
    }
}

/// Effective boolean value of a single atomic value.
pub(crate) fn atomic_ebv(value: &XdmAtomicValue) -> Result<bool, Error> {
    use XdmAtomicValue as V;
    match value {
        V::Boolean(b) => Ok(*b),
        V::String(s) | V::UntypedAtomic(s) | V::AnyUri(s) => Ok(!s.is_empty()),
        V::Integer(i) => Ok(*i != 0),
        V::Decimal(d) | V::Double(d) => Ok(*d != 0.0 && !d.is_nan()),
        V::Float(f) => Ok(*f != 0.0 && !f.is_nan()),
        other => Err(Error::from_code(
            ErrorCode::FORG0006,
            format!("effective boolean value is not defined for {}", other.atomic_type()),
        )),
    }
}
