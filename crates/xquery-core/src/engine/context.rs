//! Evaluation context: focus, local variable slots and the borrowed dynamic context.
//!
//! A context is cheap to clone. Iterators and mapping functions that outlive
//! the call that created them hold their own copy of the frame; cloning never
//! shares mutable state except the memo cell of a lazily bound variable,
//! whose value is the same for every holder.

use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;

use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::expr::Expr;
use crate::iter::materialize;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmItem};

/// Identifies the storage slot of a `for`/`let` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

static NEXT_SLOT: AtomicU32 = AtomicU32::new(1);

impl SlotId {
    /// Allocate a slot number never handed out before in this process.
    pub fn fresh() -> Self {
        SlotId(NEXT_SLOT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Grounded value of a variable.
pub type SlotValue<N> = Arc<[XdmItem<N>]>;

struct LazyBinding<'a, N> {
    expr: &'a Expr,
    ctx: XPathContext<'a, N>,
    cell: OnceCell<Result<SlotValue<N>, Error>>,
}

#[derive(Clone)]
enum Slot<'a, N> {
    Ready(SlotValue<N>),
    Lazy(Rc<LazyBinding<'a, N>>),
}

#[derive(Debug, Clone)]
pub struct Focus<N> {
    pub item: XdmItem<N>,
    pub position: usize,
    /// Context size, only computed when a focus-dependent expression needs `last()`.
    pub size: Option<usize>,
}

pub struct XPathContext<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    focus: Option<Focus<N>>,
    locals: SmallVec<[(SlotId, Slot<'a, N>); 8]>,
}

impl<N: Clone> Clone for XPathContext<'_, N> {
    fn clone(&self) -> Self {
        Self {
            dyn_ctx: self.dyn_ctx,
            focus: self.focus.clone(),
            locals: self.locals.clone(),
        }
    }
}

impl<'a, N: XdmNode> XPathContext<'a, N> {
    /// Top-level context; the focus is the dynamic context's context item, if any.
    pub fn new(dyn_ctx: &'a DynamicContext<N>) -> Self {
        let focus = dyn_ctx.context_item.clone().map(|item| Focus {
            item,
            position: 1,
            size: Some(1),
        });
        Self {
            dyn_ctx,
            focus,
            locals: SmallVec::new(),
        }
    }

    pub fn focus(&self) -> Option<&Focus<N>> {
        self.focus.as_ref()
    }

    pub fn set_focus(&mut self, item: XdmItem<N>, position: usize, size: Option<usize>) {
        self.focus = Some(Focus { item, position, size });
    }

    pub fn context_item(&self) -> Result<&XdmItem<N>, Error> {
        self.focus
            .as_ref()
            .map(|f| &f.item)
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is undefined"))
    }

    pub fn position(&self) -> Result<usize, Error> {
        self.focus
            .as_ref()
            .map(|f| f.position)
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context position is undefined"))
    }

    pub fn last(&self) -> Result<usize, Error> {
        match &self.focus {
            Some(Focus { size: Some(n), .. }) => Ok(*n),
            Some(_) => Err(Error::from_code(ErrorCode::XPDY0002, "context size is not available")),
            None => Err(Error::from_code(ErrorCode::XPDY0002, "context size is undefined")),
        }
    }

    fn slot_index(&self, slot: SlotId) -> Option<usize> {
        self.locals.iter().rposition(|(s, _)| *s == slot)
    }

    pub fn set_local(&mut self, slot: SlotId, value: SlotValue<N>) {
        match self.slot_index(slot) {
            Some(i) => self.locals[i].1 = Slot::Ready(value),
            None => self.locals.push((slot, Slot::Ready(value))),
        }
    }

    /// Bind a single item, the common case inside a `for` loop.
    pub fn set_local_item(&mut self, slot: SlotId, item: XdmItem<N>) {
        self.set_local(slot, Arc::from(vec![item]));
    }

    /// Bind `expr` for evaluation on first use, against `outer`.
    pub fn bind_lazy(&mut self, slot: SlotId, expr: &'a Expr, outer: XPathContext<'a, N>) {
        let lazy = Slot::Lazy(Rc::new(LazyBinding {
            expr,
            ctx: outer,
            cell: OnceCell::new(),
        }));
        match self.slot_index(slot) {
            Some(i) => self.locals[i].1 = lazy,
            None => self.locals.push((slot, lazy)),
        }
    }

    pub fn local(&self, slot: SlotId) -> Result<SlotValue<N>, Error> {
        let Some(i) = self.slot_index(slot) else {
            return Err(Error::from_code(
                ErrorCode::XPDY0002,
                format!("variable slot {} is not bound", slot.index()),
            ));
        };
        match &self.locals[i].1 {
            Slot::Ready(v) => Ok(v.clone()),
            Slot::Lazy(binding) => binding
                .cell
                .get_or_init(|| {
                    let it = binding.expr.iterate(&binding.ctx)?;
                    Ok(Arc::from(materialize(it)?))
                })
                .clone(),
        }
    }

    pub fn external_variable(&self, name: &ExpandedName) -> Result<SlotValue<N>, Error> {
        self.dyn_ctx
            .variables
            .get(name)
            .map(|v| Arc::from(v.clone()))
            .ok_or_else(|| Error::from_code(ErrorCode::XPST0008, format!("variable ${name} has no value")))
    }
}
