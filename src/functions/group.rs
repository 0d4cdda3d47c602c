use super::{literal_value, Args, CallContext, FuncError, Function, Param};
use crate::ast::Node;

const GROUP_BETWEEN_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("range"),
    Param::required("value"),
    Param::optional("new_key"),
];

const GROUP_IN_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("set"),
    Param::required("value"),
    Param::optional("new_key"),
];

/// `group_between(key, [lo, hi], value, [new_key])`
///
/// Tags rather than filters: a value outside the range leaves the record as
/// it is.
pub struct GroupBetween;

impl Function for GroupBetween {
    fn name(&self) -> &'static str {
        "group_between"
    }

    fn params(&self) -> &'static [Param] {
        GROUP_BETWEEN_PARAMS
    }

    fn summary(&self) -> &'static str {
        "If the number in `key` lies in [lo, hi] (inclusive), set `new_key` (default `key`) to `value`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let (lo, hi) = range_bounds(args.list(1)?)?;
        let value = args.literal(2)?;
        let new_key = args.opt_key(3)?.unwrap_or_else(|| key.clone());

        let current = ctx.value(&key)?;
        let in_range = current
            .as_f64()
            .is_some_and(|n| n >= lo && n <= hi);

        if in_range {
            ctx.record.set(new_key, value);
        }
        Ok(())
    }
}

fn range_bounds(items: &[Node]) -> Result<(f64, f64), FuncError> {
    let number = |node: &Node| match node {
        Node::Integer(n) => Some(*n as f64),
        Node::Float(n) => Some(*n),
        _ => None,
    };

    let [lo, hi] = items else {
        return Err(FuncError::invalid(
            "group_between",
            format!("range must have exactly 2 numbers, got {}", items.len()),
        ));
    };

    match (number(lo), number(hi)) {
        (Some(lo), Some(hi)) if lo <= hi => Ok((lo, hi)),
        (Some(lo), Some(hi)) => Err(FuncError::invalid(
            "group_between",
            format!("range start {} is greater than end {}", lo, hi),
        )),
        _ => Err(FuncError::invalid(
            "group_between",
            format!("range [{}, {}] must contain number literals", lo, hi),
        )),
    }
}

/// `group_in(key, [v1, v2, ...], value, [new_key])`
///
/// Set members are literals, or keys whose current values are used.
pub struct GroupIn;

impl Function for GroupIn {
    fn name(&self) -> &'static str {
        "group_in"
    }

    fn params(&self) -> &'static [Param] {
        GROUP_IN_PARAMS
    }

    fn summary(&self) -> &'static str {
        "If the value of `key` equals a member of `set`, set `new_key` (default `key`) to `value`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let set = args.list(1)?;
        let value = args.literal(2)?;
        let new_key = args.opt_key(3)?.unwrap_or_else(|| key.clone());

        let mut members = Vec::with_capacity(set.len());
        for node in set {
            let member = match literal_value(node) {
                Some(v) => v,
                None if node.is_key_ref() => {
                    let name = node.to_string();
                    ctx.value(&name)?.clone()
                }
                None => {
                    return Err(FuncError::invalid(
                        "group_in",
                        format!("set member `{}` must be a literal or a key", node),
                    ));
                }
            };
            members.push(member);
        }

        let current = ctx.value(&key)?;
        if members.iter().any(|m| m == current) {
            ctx.record.set(new_key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert_eq!(
            range_bounds(&[Node::Integer(200), Node::Integer(299)]).unwrap(),
            (200.0, 299.0)
        );
        assert!(range_bounds(&[Node::Integer(2), Node::Integer(1)]).is_err());
        assert!(range_bounds(&[Node::Integer(2)]).is_err());
        assert!(range_bounds(&[Node::String("a".into()), Node::Integer(1)]).is_err());
    }
}
