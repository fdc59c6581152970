// SPDX-License-Identifier: Apache-2.0 OR MIT
use crate::ast::Span;
use thiserror::Error;

/// Boxed cause attached to an engine error.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the template engine.
///
/// Parse errors are template defects and surface once, when a template is
/// compiled. Render errors carry an optional source so that a helper can hand
/// a foreign error back through the evaluator without losing its type; see
/// [`Error::render_with_source`] and [`Error::into_source`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        span: Option<Span>,
    },
    #[error("render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        span: Option<Span>,
    },
}

impl Error {
    pub fn parse(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Parse {
            message: message.into(),
            source: None,
            span,
        }
    }

    pub fn parse_with_span(message: impl Into<String>, span: Span) -> Self {
        Self::parse(message, Some(span))
    }

    pub fn render(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Render {
            message: message.into(),
            source: None,
            span,
        }
    }

    pub fn render_with_span(message: impl Into<String>, span: Span) -> Self {
        Self::render(message, Some(span))
    }

    /// Wraps an error raised by a helper so callers can recover it later.
    pub fn render_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Render {
            message: message.into(),
            source: Some(Box::new(source)),
            span: None,
        }
    }

    /// Location in the template source, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse { span, .. } | Error::Render { span, .. } => *span,
        }
    }

    /// Replaces the attached source.
    pub fn with_source(self, source: BoxedSource) -> Self {
        match self {
            Error::Parse { message, span, .. } => Error::Parse {
                message,
                source: Some(source),
                span,
            },
            Error::Render { message, span, .. } => Error::Render {
                message,
                source: Some(source),
                span,
            },
        }
    }

    /// Splits off the attached source, returning the error without it.
    pub fn into_source(self) -> (Self, Option<BoxedSource>) {
        match self {
            Error::Parse {
                message,
                source,
                span,
            } => (
                Error::Parse {
                    message,
                    source: None,
                    span,
                },
                source,
            ),
            Error::Render {
                message,
                source,
                span,
            } => (
                Error::Render {
                    message,
                    source: None,
                    span,
                },
                source,
            ),
        }
    }
}
