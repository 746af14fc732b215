//! Calls to host-registered extension functions.

use crate::convert::{ConverterCache, HostTarget, JPConverter, PJConverter};
use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Expr, ExpressionVisitor};
use crate::iter::{self, BoxedIter, materialize};
use crate::model::XdmNode;
use crate::types::SequenceType;
use crate::xdm::ExpandedName;

/// Call site of an extension function. Converters are resolved during type
/// checking from the arguments' static types and the declared signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionCall {
    pub name: ExpandedName,
    pub args: Vec<Expr>,
    pub arg_converters: Vec<PJConverter>,
    pub result: Option<JPConverter>,
    pub pure: bool,
    pub loc: Option<SourceLocation>,
}

impl ExtensionCall {
    pub fn new(name: ExpandedName, args: Vec<Expr>) -> Self {
        Self {
            name,
            args,
            arg_converters: Vec::new(),
            result: None,
            pure: false,
            loc: None,
        }
    }

    pub fn result_type(&self) -> SequenceType {
        self.result
            .as_ref()
            .map_or(SequenceType::ANY_SEQUENCE, JPConverter::sequence_type)
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    fn unknown(&self, detail: &str) -> Error {
        Error::static_err(
            ErrorCode::XPST0017,
            format!("extension function {}#{} {detail}", self.name, self.args.len()),
            self.loc,
        )
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let Some(signature) = v.static_ctx.extensions.get(&self.name) else {
            return Err(self.unknown("is not declared"));
        };
        if signature.arity() != self.args.len() {
            return Err(self.unknown(&format!("does not match the declared arity {}", signature.arity())));
        }
        let args = self
            .args
            .into_iter()
            .map(|a| a.type_check(v))
            .collect::<Result<Vec<_>, _>>()?;
        let cache = ConverterCache::global();
        let arg_converters = args
            .iter()
            .zip(&signature.params)
            .map(|(a, target)| cache.allocate(&a.item_type(), a.cardinality(), target))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.at(self.loc))?;
        Ok(Expr::Extension(ExtensionCall {
            name: self.name,
            args,
            arg_converters,
            result: Some(JPConverter::allocate(&signature.result)),
            pure: signature.pure,
            loc: self.loc,
        }))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let Some(function) = ctx.dyn_ctx.extensions.get(&self.name) else {
            return Err(Error::from_code(
                ErrorCode::XPST0017,
                format!("no implementation bound for extension function {}", self.name),
            )
            .at(self.loc));
        };
        let general = PJConverter::General(HostTarget::Any);
        let mut values = Vec::with_capacity(self.args.len());
        for (i, arg) in self.args.iter().enumerate() {
            let converter = self.arg_converters.get(i).unwrap_or(&general);
            let items = materialize(arg.iterate(ctx)?)?;
            values.push(converter.convert(items).map_err(|e| e.at(self.loc))?);
        }
        tracing::trace!(function = %self.name, arity = values.len(), "extension call");
        let value = function.call(values).map_err(|e| e.at(self.loc))?;
        let out = match &self.result {
            Some(converter) => converter.convert(value),
            None => JPConverter::General.convert(value),
        }
        .map_err(|e| e.at(self.loc))?;
        Ok(iter::from_vec(out))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::convert::{ExtensionFunction, ExtensionSignature, HostValue};
    use crate::engine::runtime::{DynamicContextBuilder, StaticContextBuilder};
    use crate::expr::{compile_with_context, evaluate};
    use crate::simple_node::SimpleNode;
    use crate::xdm::{XdmAtomicValue, XdmItem};

    fn twice() -> Arc<dyn ExtensionFunction<SimpleNode>> {
        Arc::new(|args: Vec<HostValue<SimpleNode>>| match args.as_slice() {
            [HostValue::I64(i)] => Ok(HostValue::I64(i * 2)),
            other => Err(Error::from_code(ErrorCode::XPTY0004, format!("unexpected arguments {other:?}"))),
        })
    }

    fn name() -> ExpandedName {
        ExpandedName::local("twice")
    }

    #[test]
    fn declared_function_is_called_through_converters() {
        let sc = StaticContextBuilder::new()
            .with_extension(name(), ExtensionSignature::new(vec![HostTarget::I64], HostTarget::I64).pure())
            .build();
        let call = compile_with_context(Expr::extension(name(), vec![Expr::integer(21)]), &sc).expect("compile");
        let Expr::Extension(ext) = &call else {
            panic!("expected an extension call, got {call:?}");
        };
        assert!(ext.is_pure());
        assert_eq!(ext.result_type().item_type, crate::types::ItemType::INTEGER);

        let dc = DynamicContextBuilder::new().with_extension(name(), twice()).build();
        assert_eq!(
            evaluate(&call, &dc).expect("evaluate"),
            vec![XdmItem::Atomic(XdmAtomicValue::Integer(42))]
        );
    }

    #[test]
    fn undeclared_or_wrong_arity_is_a_static_error() {
        let sc = StaticContextBuilder::new()
            .with_extension(name(), ExtensionSignature::new(vec![HostTarget::I64], HostTarget::I64))
            .build();
        for e in [
            Expr::extension(ExpandedName::local("nope"), vec![]),
            Expr::extension(name(), vec![Expr::integer(1), Expr::integer(2)]),
        ] {
            let err = compile_with_context(e, &sc).expect_err("static error");
            assert_eq!(err.code_enum(), ErrorCode::XPST0017);
            assert!(err.is_static());
        }
    }

    #[test]
    fn missing_binding_fails_at_run_time() {
        let sc = StaticContextBuilder::new()
            .with_extension(name(), ExtensionSignature::new(vec![HostTarget::I64], HostTarget::I64))
            .build();
        let call = compile_with_context(Expr::extension(name(), vec![Expr::integer(1)]), &sc).expect("compile");
        let dc = DynamicContextBuilder::<SimpleNode>::new().build();
        let err = evaluate(&call, &dc).expect_err("unbound");
        assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    }
}
