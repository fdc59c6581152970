// SPDX-License-Identifier: Apache-2.0 OR MIT
use lithos_finalize_engine::FunctionRegistryBuilder;
use serde_json::Value;

use super::{expect_exact_args, expect_usize};

/// Indentation unit of generated Go code.
pub const DEFAULT_INDENT: &str = "\t";

/// Returns `unit` repeated `depth` times.
pub fn tabs(depth: usize, unit: &str) -> String {
    unit.repeat(depth)
}

pub fn register(builder: &mut FunctionRegistryBuilder, indent_unit: &str) {
    let unit = indent_unit.to_string();
    builder.register("tabs", move |_ctx, args| {
        expect_exact_args("tabs", args, 1)?;
        let depth = expect_usize("tabs", &args[0], 1)?;
        Ok(Value::String(tabs(depth, &unit)))
    });
}
