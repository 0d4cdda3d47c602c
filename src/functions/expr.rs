use super::{Args, CallContext, FuncError, Function, Param};
use crate::{ast::Node, evaluator::Evaluator};

const EXPR_PARAMS: &[Param] = &[Param::required("expression"), Param::required("key")];

/// `expr(expression, key)`: evaluate an arithmetic, comparison or logical
/// expression over the record and store the result.
pub struct Expr;

impl Function for Expr {
    fn name(&self) -> &'static str {
        "expr"
    }

    fn params(&self) -> &'static [Param] {
        EXPR_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Evaluate `expression` (e.g. a.second*10+(2+3)*5) and store the result under `key`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let expression = args.node(0)?;
        if !matches!(expression, Node::BinaryOp { .. } | Node::Paren(_)) {
            return Err(FuncError::ArgType {
                function: "expr",
                param: "expression",
                expected: "a binary expression",
                found: expression.kind(),
            });
        }
        let key = args.key(1)?;

        let result = Evaluator::new(&*ctx.record).calc(expression)?;
        ctx.record.set(key, result);
        Ok(())
    }
}
