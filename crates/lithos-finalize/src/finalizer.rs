// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use lithos_finalize_engine::{Error as EngineError, FunctionRegistry, FunctionRegistryBuilder, Template};
use lithos_finalize_helpers::{format_default, goify, install_finalizer_helpers};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::config::FinalizerConfig;
use crate::error::Error;
use crate::schema::{ArrayAttribute, Attribute, ObjectAttribute};

/// Synthesizes Go statements that assign schema defaults to unset fields.
///
/// The array-loop template obtains its loop body by calling the `finalize`
/// helper, which re-enters [`Finalizer::synthesize`] through a weak handle to
/// the finalizer that owns the template.
pub struct Finalizer {
    config: FinalizerConfig,
    assignment: Template,
    object_guard: Template,
    array_loop: Template,
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("config", &self.config)
            .finish()
    }
}

static FINALIZER: Lazy<Arc<Finalizer>> = Lazy::new(|| {
    Finalizer::new(FinalizerConfig::default())
        .unwrap_or_else(|err| panic!("built-in finalizer templates are broken: {err}"))
});

/// Process-wide finalizer using the default Go output, compiled on first use.
pub fn finalizer() -> &'static Arc<Finalizer> {
    &FINALIZER
}

/// Synthesizes finalization code with the process-wide finalizer.
pub fn recursive_finalizer(
    attribute: &Attribute,
    target: &str,
    depth: usize,
) -> Result<String, Error> {
    finalizer().synthesize(attribute, target, depth)
}

impl Finalizer {
    /// Compiles the configured templates and binds their helper table.
    ///
    /// Fails when the config is invalid, a template does not parse, or a
    /// template calls a helper that is not registered.
    pub fn new(config: FinalizerConfig) -> Result<Arc<Self>, Error> {
        config.validate()?;
        let assignment = Template::parse_str("assignment", &config.templates.assignment)?;
        let object_guard = Template::parse_str("object_guard", &config.templates.object_guard)?;
        let array_loop = Template::parse_str("array_loop", &config.templates.array_loop)?;

        let finalizer = Arc::new_cyclic(move |weak: &Weak<Finalizer>| {
            let functions = helper_table(&config.indent, weak.clone());
            let bind = |template: Template| {
                template
                    .with_functions(functions.clone())
                    .with_strict_fields(true)
            };
            Finalizer {
                assignment: bind(assignment),
                object_guard: bind(object_guard),
                array_loop: bind(array_loop),
                config,
            }
        });

        for template in finalizer.templates() {
            let analysis = template.analyze();
            let unknown = analysis.unknown_functions();
            if !unknown.is_empty() {
                return Err(Error::Template(EngineError::parse(
                    format!(
                        "template {} calls unregistered helpers: {}",
                        template.name(),
                        unknown.join(", ")
                    ),
                    None,
                )));
            }
        }

        tracing::debug!(
            indent = ?finalizer.config.indent,
            element_prefix = %finalizer.config.element_prefix,
            default_prefix = %finalizer.config.default_prefix,
            "compiled finalizer templates"
        );
        Ok(finalizer)
    }

    pub fn config(&self) -> &FinalizerConfig {
        &self.config
    }

    fn templates(&self) -> [&Template; 3] {
        [&self.assignment, &self.object_guard, &self.array_loop]
    }

    /// Returns the statements that finalize the value at `target`, indented
    /// for `depth`. The result is empty when nothing below `attribute`
    /// declares a default.
    pub fn synthesize(
        &self,
        attribute: &Attribute,
        target: &str,
        depth: usize,
    ) -> Result<String, Error> {
        self.synthesize_at(attribute, target, depth, depth)
    }

    /// `depth` counts nesting levels and names loop variables; `indent` is
    /// the indentation level of the emitted statements. They differ below
    /// array fields, whose loops are not wrapped in a guard block.
    fn synthesize_at(
        &self,
        attribute: &Attribute,
        target: &str,
        depth: usize,
        indent: usize,
    ) -> Result<String, Error> {
        tracing::trace!(target_path = target, depth, indent, "synthesizing finalizer");
        match attribute.unwrap_alias() {
            Attribute::Object(object) => {
                self.synthesize_object(attribute, object, target, depth, indent)
            }
            Attribute::Array(array) => {
                reject_defaults(attribute)?;
                self.synthesize_array(array, target, depth, indent)
            }
            Attribute::Primitive(_) | Attribute::Alias(_) => {
                reject_defaults(attribute)?;
                Ok(String::new())
            }
        }
    }

    /// `registry` is the attribute as passed in, before alias unwrapping, so
    /// defaults registered on an alias apply.
    fn synthesize_object(
        &self,
        registry: &Attribute,
        object: &ObjectAttribute,
        target: &str,
        depth: usize,
        indent: usize,
    ) -> Result<String, Error> {
        if let Some(field) = registry
            .default_names()
            .into_iter()
            .find(|name| !object.fields.contains_key(*name))
        {
            return Err(Error::UnknownDefault {
                field: field.to_string(),
            });
        }

        let mut idents: BTreeMap<String, &str> = BTreeMap::new();
        let mut statements = Vec::new();
        for (name, child) in &object.fields {
            let ident = goify(name);
            if ident.is_empty() {
                return Err(Error::InvalidFieldName {
                    field: name.clone(),
                });
            }
            if let Some(first) = idents.insert(ident.clone(), name.as_str()) {
                return Err(Error::IdentifierCollision {
                    first: first.to_string(),
                    second: name.clone(),
                    ident,
                });
            }

            if let Some(default) = registry.default_for(name) {
                statements.push(self.assign_default(name, child, default, target, depth, indent)?);
            }

            let child_target = format!("{target}.{ident}");
            if child.is_object() {
                let nested = self.synthesize_at(child, &child_target, depth + 1, indent + 1)?;
                if nested.is_empty() {
                    continue;
                }
                let context = json!({
                    "depth": depth,
                    "indent": indent,
                    "target": target,
                    "field": name,
                    "body": nested,
                });
                statements.push(render(&self.object_guard, &context)?);
            } else {
                let nested = self.synthesize_at(child, &child_target, depth + 1, indent)?;
                if !nested.is_empty() {
                    statements.push(nested);
                }
            }
        }
        Ok(statements.join("\n"))
    }

    fn assign_default(
        &self,
        name: &str,
        child: &Attribute,
        default: &Value,
        target: &str,
        depth: usize,
        indent: usize,
    ) -> Result<String, Error> {
        let unsupported = |reason: String| Error::UnsupportedDefault {
            field: name.to_string(),
            reason,
        };
        format_default(default).map_err(|err| unsupported(err.to_string()))?;
        let Attribute::Primitive(primitive) = child.unwrap_alias() else {
            return Err(unsupported("field is not a primitive".to_string()));
        };
        let value = primitive
            .primitive
            .normalize_default(default)
            .ok_or_else(|| unsupported(format!("{default} is not a valid {}", primitive.primitive)))?;

        let context = json!({
            "depth": depth,
            "indent": indent,
            "target": target,
            "field": name,
            "default": value,
            "default_prefix": self.config.default_prefix,
        });
        render(&self.assignment, &context)
    }

    fn synthesize_array(
        &self,
        array: &ArrayAttribute,
        target: &str,
        depth: usize,
        indent: usize,
    ) -> Result<String, Error> {
        let context = json!({
            "depth": depth,
            "indent": indent,
            "target": target,
            "elem": serde_json::to_value(&*array.elem)?,
            "element_prefix": self.config.element_prefix,
        });
        render(&self.array_loop, &context)
    }
}

/// Defaults only attach to object fields; any left on an alias of an array
/// or primitive name fields that do not exist.
fn reject_defaults(attribute: &Attribute) -> Result<(), Error> {
    match attribute.default_names().into_iter().next() {
        Some(field) => Err(Error::UnknownDefault {
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

fn render(template: &Template, context: &Value) -> Result<String, Error> {
    template.render(context).map_err(Error::from_render)
}

/// Finalizer helpers plus `finalize ELEM TARGET DEPTH [INDENT]`, which
/// synthesizes code for the attribute `ELEM` (as JSON) through `finalizer`.
/// `INDENT` defaults to `DEPTH`.
fn helper_table(indent: &str, finalizer: Weak<Finalizer>) -> FunctionRegistry {
    let mut builder = FunctionRegistryBuilder::new();
    install_finalizer_helpers(&mut builder, indent);
    builder.register("finalize", move |_ctx, args| {
        let (elem, target, depth, indent) = match args {
            [elem, target, depth] => (elem, target, depth, depth),
            [elem, target, depth, indent] => (elem, target, depth, indent),
            _ => {
                return Err(EngineError::render(
                    format!("finalize expected 3 or 4 arguments, got {}", args.len()),
                    None,
                ))
            }
        };
        let finalizer = finalizer
            .upgrade()
            .ok_or_else(|| EngineError::render("finalizer dropped during rendering", None))?;
        let attribute: Attribute = serde_json::from_value(elem.clone()).map_err(|err| {
            EngineError::render_with_source("finalize argument 1 must be an attribute", Error::Schema(err))
        })?;
        let target = target.as_str().ok_or_else(|| {
            EngineError::render(format!("finalize argument 2 must be a string, got {target}"), None)
        })?;
        let depth = level_arg(depth, 3)?;
        let indent = level_arg(indent, 4)?;
        finalizer
            .synthesize_at(&attribute, target, depth, indent)
            .map(Value::String)
            .map_err(|err| EngineError::render_with_source("finalize failed", err))
    });
    builder.build()
}

fn level_arg(value: &Value, position: usize) -> Result<usize, EngineError> {
    value
        .as_u64()
        .and_then(|level| usize::try_from(level).ok())
        .ok_or_else(|| {
            EngineError::render(
                format!("finalize argument {position} must be a non-negative integer, got {value}"),
                None,
            )
        })
}
