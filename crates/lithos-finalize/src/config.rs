// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fs;
use std::path::Path;

use lithos_finalize_helpers::DEFAULT_INDENT;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::templates;

/// Output settings of a [`Finalizer`](crate::Finalizer).
///
/// Missing keys take the Go defaults, unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinalizerConfig {
    /// Text repeated once per depth level.
    pub indent: String,
    /// Loop variables are named `<element_prefix><depth>`.
    pub element_prefix: String,
    /// Default holders are named `<default_prefix><Field>`.
    pub default_prefix: String,
    pub templates: TemplateSources,
}

/// Template sources, one per emitted construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSources {
    pub assignment: String,
    pub object_guard: String,
    pub array_loop: String,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT.to_string(),
            element_prefix: "e".to_string(),
            default_prefix: "default".to_string(),
            templates: TemplateSources::default(),
        }
    }
}

impl Default for TemplateSources {
    fn default() -> Self {
        Self {
            assignment: templates::ASSIGNMENT.to_string(),
            object_guard: templates::OBJECT_GUARD.to_string(),
            array_loop: templates::ARRAY_LOOP.to_string(),
        }
    }
}

impl FinalizerConfig {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(input).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks that prefixes form identifiers that cannot shadow each other and
    /// that the indent unit is whitespace.
    pub fn validate(&self) -> Result<(), Error> {
        for (key, prefix) in [
            ("element_prefix", &self.element_prefix),
            ("default_prefix", &self.default_prefix),
        ] {
            if !is_identifier(prefix) {
                return Err(Error::Config(format!(
                    "{key} must be an identifier, got {prefix:?}"
                )));
            }
        }
        if self.element_prefix.starts_with(&self.default_prefix)
            || self.default_prefix.starts_with(&self.element_prefix)
        {
            return Err(Error::Config(format!(
                "element_prefix {:?} and default_prefix {:?} overlap",
                self.element_prefix, self.default_prefix
            )));
        }
        if !self.indent.chars().all(char::is_whitespace) {
            return Err(Error::Config(format!(
                "indent must be whitespace, got {:?}",
                self.indent
            )));
        }
        Ok(())
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
