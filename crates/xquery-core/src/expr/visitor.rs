//! Compilation driver shared by the type-check and optimize passes.

use std::sync::OnceLock;

use crate::convert::ConversionRules;
use crate::engine::context::XPathContext;
use crate::engine::runtime::{DynamicContext, Error, SourceLocation, StaticContext};
use crate::expr::Expr;
use crate::iter::materialize;
use crate::model::XdmNode;
use crate::types::{ItemType, TypeHierarchy};
use crate::xdm::XdmSequence;

static DEFAULT_STATIC_CONTEXT: OnceLock<StaticContext> = OnceLock::new();

fn default_static_ctx() -> &'static StaticContext {
    DEFAULT_STATIC_CONTEXT.get_or_init(StaticContext::default)
}

/// Static information threaded through `type_check` and `optimize`.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionVisitor<'s> {
    pub static_ctx: &'s StaticContext,
    pub th: TypeHierarchy,
    pub rules: ConversionRules,
    /// Static type of the context item; `None` when it is known to be absent.
    pub context_item_type: Option<ItemType>,
}

impl<'s> ExpressionVisitor<'s> {
    pub fn new(static_ctx: &'s StaticContext) -> Self {
        Self {
            static_ctx,
            th: TypeHierarchy,
            rules: ConversionRules::new(),
            context_item_type: Some(ItemType::AnyItem),
        }
    }

    /// Visitor for operands evaluated with a new focus of the given item type.
    #[must_use]
    pub fn with_context_item(&self, item_type: ItemType) -> Self {
        Self {
            context_item_type: Some(item_type),
            ..*self
        }
    }

    /// Single reporting point for optimizer rewrites.
    pub fn trace(&self, rule: &str, before: &Expr, after: &Expr) {
        tracing::debug!(
            target: "xquery_core::optimizer",
            rule,
            before = %before,
            after = %after,
            "rewrite"
        );
    }

    /// Report a failure that static analysis proved will happen if the
    /// expression is ever evaluated with a non-empty operand.
    pub fn warn(&self, message: &str, loc: Option<SourceLocation>) {
        match loc {
            Some(loc) => tracing::warn!(target: "xquery_core::optimizer", %loc, "{message}"),
            None => tracing::warn!(target: "xquery_core::optimizer", "{message}"),
        }
    }
}

/// Compile using a lazily initialized default `StaticContext`.
pub fn compile(expr: Expr) -> Result<Expr, Error> {
    compile_with_context(expr, default_static_ctx())
}

/// Run simplify, type check and (unless disabled) optimize.
pub fn compile_with_context(expr: Expr, static_ctx: &StaticContext) -> Result<Expr, Error> {
    let v = ExpressionVisitor::new(static_ctx);
    let checked = expr.simplify()?.type_check(&v)?;
    if static_ctx.optimize {
        checked.optimize(&v)
    } else {
        Ok(checked)
    }
}

/// Evaluate a compiled expression to a materialized sequence.
pub fn evaluate<N: XdmNode>(expr: &Expr, dyn_ctx: &DynamicContext<N>) -> Result<XdmSequence<N>, Error> {
    let ctx = XPathContext::new(dyn_ctx);
    materialize(expr.iterate(&ctx)?)
}
