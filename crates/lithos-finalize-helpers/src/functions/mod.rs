// SPDX-License-Identifier: Apache-2.0 OR MIT
#[cfg(test)]
use lithos_finalize_engine::EvalContext;
use lithos_finalize_engine::{Error, FunctionRegistryBuilder};
use serde_json::Value;

mod flow;
pub(crate) mod indent;
pub(crate) mod literal;
pub(crate) mod naming;

pub fn install_all(builder: &mut FunctionRegistryBuilder, indent_unit: &str) {
    indent::register(builder, indent_unit);
    naming::register(builder);
    literal::register(builder);
    flow::register(builder);
}

pub(crate) fn expect_min_args(name: &'static str, args: &[Value], min: usize) -> Result<(), Error> {
    if args.len() < min {
        return Err(Error::render(
            format!(
                "{name} expected at least {min} arguments, got {}",
                args.len()
            ),
            None,
        ));
    }
    Ok(())
}

pub(crate) fn expect_exact_args(
    name: &'static str,
    args: &[Value],
    expected: usize,
) -> Result<(), Error> {
    if args.len() != expected {
        return Err(Error::render(
            format!(
                "{name} expected {expected} argument{}, got {}",
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
            None,
        ));
    }
    Ok(())
}

pub(crate) fn expect_string(
    name: &'static str,
    value: &Value,
    position: usize,
) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::render(
            format!("{name} argument {position} must be coercible to string, got {value:?}"),
            None,
        )),
    }
}

pub(crate) fn expect_i64(name: &'static str, value: &Value, position: usize) -> Result<i64, Error> {
    value.as_i64().ok_or_else(|| {
        Error::render(
            format!("{name} argument {position} must be an integer, got {value:?}"),
            None,
        )
    })
}

pub(crate) fn expect_usize(
    name: &'static str,
    value: &Value,
    position: usize,
) -> Result<usize, Error> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            Error::render(
                format!("{name} argument {position} must be a non-negative integer, got {value:?}"),
                None,
            )
        })
}

#[cfg(test)]
pub(crate) fn empty_context() -> EvalContext {
    EvalContext::new(Value::Null, FunctionRegistryBuilder::new().build())
}
