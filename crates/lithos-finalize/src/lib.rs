#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Generates Go statements that fill unset optional fields with the defaults
//! declared in a schema.
//!
//! ```
//! use lithos_finalize::{recursive_finalizer, Attribute, ObjectAttribute, Primitive};
//!
//! let schema: Attribute = ObjectAttribute::new()
//!     .field_with_default("retries", Primitive::Integer, 3)
//!     .into();
//! let code = recursive_finalizer(&schema, "cfg", 1).unwrap();
//! assert!(code.contains("cfg.Retries = &defaultRetries"));
//! ```
//!
//! Output is produced by three templates rendered with
//! [`lithos_finalize_engine`]. Swapping them through [`FinalizerConfig`]
//! changes the emitted syntax while the traversal stays the same.

mod config;
mod error;
mod finalizer;
pub mod schema;
pub mod templates;

pub use config::{FinalizerConfig, TemplateSources};
pub use error::Error;
pub use finalizer::{finalizer, recursive_finalizer, Finalizer};
pub use schema::{
    AliasAttribute, ArrayAttribute, Attribute, ObjectAttribute, Primitive, PrimitiveAttribute,
};
