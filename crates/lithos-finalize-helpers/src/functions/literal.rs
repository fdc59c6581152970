// SPDX-License-Identifier: Apache-2.0 OR MIT
use lithos_finalize_engine::{Error, EvalContext, FunctionRegistryBuilder};
use serde_json::{Number, Value};
use thiserror::Error;

use super::expect_exact_args;

/// Reasons a default value cannot be written as a Go literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("{kind} values have no literal form")]
    Unsupported { kind: &'static str },
    #[error("integer {0} does not fit in int64")]
    OutOfRange(u64),
}

/// Formats a scalar default value as a Go literal.
///
/// Booleans and integers print as-is, floats always carry a `.` or an
/// exponent so the literal keeps its float type, and strings are
/// double-quoted with Go escapes. Null, arrays and objects are rejected.
pub fn format_default(value: &Value) -> Result<String, LiteralError> {
    match value {
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => format_number(number),
        Value::String(text) => Ok(quote(text)),
        Value::Null => Err(LiteralError::Unsupported { kind: "null" }),
        Value::Array(_) => Err(LiteralError::Unsupported { kind: "array" }),
        Value::Object(_) => Err(LiteralError::Unsupported { kind: "object" }),
    }
}

fn format_number(number: &Number) -> Result<String, LiteralError> {
    if let Some(int) = number.as_i64() {
        return Ok(int.to_string());
    }
    if let Some(uint) = number.as_u64() {
        return Err(LiteralError::OutOfRange(uint));
    }
    // Debug output is the shortest round-tripping form and keeps `.0`.
    number
        .as_f64()
        .map(|float| format!("{float:?}"))
        .ok_or(LiteralError::Unsupported { kind: "number" })
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || c == '\u{feff}' => {
                out.push_str(&format!("\\u{:04x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn register(builder: &mut FunctionRegistryBuilder) {
    builder.register("literal", literal);
}

fn literal(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    expect_exact_args("literal", args, 1)?;
    format_default(&args[0])
        .map(Value::String)
        .map_err(|err| Error::render_with_source(format!("literal: {err}"), err))
}
