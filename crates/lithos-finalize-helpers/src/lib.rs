// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Helpers that finalizer templates call while emitting Go code.
//!
//! Each helper exists twice: as a plain Rust function ([`tabs`], [`goify`],
//! [`format_default`]) and as a template helper installed by
//! [`install_finalizer_helpers`]. The registered set is `tabs`, `goify`,
//! `literal`, `add`, `print`, `eq` and `not`.

use lithos_finalize_engine::{FunctionRegistry, FunctionRegistryBuilder};

mod functions;

pub use functions::indent::{tabs, DEFAULT_INDENT};
pub use functions::literal::{format_default, LiteralError};
pub use functions::naming::goify;

/// Registers the finalizer helpers into an existing builder. `indent_unit`
/// is the text `tabs` repeats once per depth level.
pub fn install_finalizer_helpers(builder: &mut FunctionRegistryBuilder, indent_unit: &str) {
    functions::install_all(builder, indent_unit);
}

/// Returns a registry holding only the finalizer helpers.
pub fn finalizer_helpers(indent_unit: &str) -> FunctionRegistry {
    let mut builder = FunctionRegistryBuilder::new();
    install_finalizer_helpers(&mut builder, indent_unit);
    builder.build()
}
