//! Variable bindings and references.

use core::fmt;

use crate::engine::context::{SlotId, XPathContext};
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Expr, ExpressionVisitor};
use crate::iter::{BoxedIter, ListIterator};
use crate::model::XdmNode;
use crate::types::SequenceType;
use crate::xdm::ExpandedName;

/// Declaration site of a `for` or `let` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBinding {
    pub name: ExpandedName,
    pub slot: SlotId,
}

impl VarBinding {
    /// New binding with a slot of its own.
    pub fn new(local: impl Into<String>) -> Self {
        Self::named(ExpandedName::local(local))
    }

    pub fn named(name: ExpandedName) -> Self {
        Self {
            name,
            slot: SlotId::fresh(),
        }
    }
}

impl fmt::Display for VarBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarTarget {
    Local(SlotId),
    /// Supplied through the dynamic context by name.
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: ExpandedName,
    pub target: VarTarget,
    pub static_type: SequenceType,
    pub loc: Option<SourceLocation>,
}

impl VariableRef {
    pub fn local(binding: &VarBinding) -> Self {
        Self {
            name: binding.name.clone(),
            target: VarTarget::Local(binding.slot),
            static_type: SequenceType::ANY_SEQUENCE,
            loc: None,
        }
    }

    pub fn external(name: ExpandedName) -> Self {
        Self {
            name,
            target: VarTarget::External,
            static_type: SequenceType::ANY_SEQUENCE,
            loc: None,
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        if self.target == VarTarget::External && !v.static_ctx.in_scope_variables.contains(&self.name) {
            return Err(Error::static_err(
                ErrorCode::XPST0008,
                format!("variable ${} has not been declared", self.name),
                self.loc,
            ));
        }
        Ok(Expr::VarRef(self))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let value = match self.target {
            VarTarget::Local(slot) => ctx.local(slot),
            VarTarget::External => ctx.external_variable(&self.name),
        }
        .map_err(|e| e.at(self.loc))?;
        Ok(Box::new(ListIterator::new(value)))
    }
}
