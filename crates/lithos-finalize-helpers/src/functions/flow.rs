// SPDX-License-Identifier: Apache-2.0 OR MIT
use lithos_finalize_engine::{is_truthy, value_to_string, Error, EvalContext, FunctionRegistryBuilder};
use serde_json::{json, Value};

use super::{expect_exact_args, expect_i64, expect_min_args};

pub fn register(builder: &mut FunctionRegistryBuilder) {
    builder
        .register("add", add)
        .register("print", print)
        .register("eq", eq)
        .register("not", not);
}

pub fn add(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    expect_exact_args("add", args, 2)?;
    let left = expect_i64("add", &args[0], 1)?;
    let right = expect_i64("add", &args[1], 2)?;
    let sum = left
        .checked_add(right)
        .ok_or_else(|| Error::render(format!("add overflows: {left} + {right}"), None))?;
    Ok(json!(sum))
}

/// Concatenates operands, adding a space between two operands when neither
/// is a string.
pub fn print(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    let mut out = String::new();
    for (idx, value) in args.iter().enumerate() {
        if idx > 0 && !value.is_string() && !args[idx - 1].is_string() {
            out.push(' ');
        }
        out.push_str(&value_to_string(value));
    }
    Ok(Value::String(out))
}

/// True when the first operand equals any of the others.
pub fn eq(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    expect_min_args("eq", args, 2)?;
    let first = &args[0];
    Ok(Value::Bool(
        args[1..].iter().any(|other| values_equal(first, other)),
    ))
}

pub fn not(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    expect_exact_args("not", args, 1)?;
    Ok(Value::Bool(!is_truthy(&args[0])))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l == r,
            _ => l.as_f64() == r.as_f64(),
        },
        _ => left == right,
    }
}
