// SPDX-License-Identifier: Apache-2.0 OR MIT
use lithos_finalize_engine::Error as EngineError;
use thiserror::Error;

/// Failures raised while building a finalizer or synthesizing code.
///
/// Every variant is fatal: schema input is deterministic, so retrying cannot
/// change the outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// A finalizer template failed to compile or render.
    #[error("finalizer template error: {0}")]
    Template(#[from] EngineError),
    /// The default registry names a field the object does not declare.
    #[error("default registered for unknown field \"{field}\"")]
    UnknownDefault { field: String },
    /// The default value cannot be emitted for this field.
    #[error("unsupported default for field \"{field}\": {reason}")]
    UnsupportedDefault { field: String, reason: String },
    /// The field name contains no identifier characters.
    #[error("field name \"{field}\" does not produce an identifier")]
    InvalidFieldName { field: String },
    /// Two fields of one object map to the same identifier.
    #[error("fields \"{first}\" and \"{second}\" both map to identifier {ident}")]
    IdentifierCollision {
        first: String,
        second: String,
        ident: String,
    },
    #[error("invalid finalizer config: {0}")]
    Config(String),
    #[error("invalid schema document: {0}")]
    Schema(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Converts an engine error raised while rendering, recovering a
    /// finalizer error that a nested `finalize` call attached as its source.
    pub(crate) fn from_render(err: EngineError) -> Self {
        let (bare, source) = err.into_source();
        match source {
            Some(source) => match source.downcast::<Error>() {
                Ok(inner) => *inner,
                Err(source) => Error::Template(bare.with_source(source)),
            },
            None => Error::Template(bare),
        }
    }
}
