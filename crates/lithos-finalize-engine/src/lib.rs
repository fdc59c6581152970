#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Minimal Go `text/template`-style engine used to emit finalizer source code.
//!
//! The language covers text with `{{ }}` actions, `{{-`/`-}}` trim markers,
//! comments, pipelines, variables, `if`/`else if`/`else` and `range`. Helpers
//! come from a [`FunctionRegistry`] supplied by the caller; the engine itself
//! ships no built-in functions.

pub mod analyze;
pub mod ast;
mod error;
pub mod lexer;
mod parser;
mod runtime;
pub mod telemetry;

pub use analyze::{
    analyze_template, ControlKind, ControlUsage, FunctionCall, FunctionSource, TemplateAnalysis,
    VariableAccess, VariableKind,
};
pub use ast::{
    ActionNode, Ast, BindingKind, Block, Command, CommentNode, ElseIfBranch, Expression, IfNode,
    Node, Pipeline, PipelineDeclarations, RangeNode, Span, TextNode,
};
pub use error::{BoxedSource, Error};
pub use lexer::{literal_value, Keyword, Token, TokenKind};
pub use runtime::{
    is_truthy, parse_number, value_to_string, EvalContext, Function, FunctionRegistry,
    FunctionRegistryBuilder,
};

use serde_json::{Number, Value};
use std::fmt;
use std::time::Instant;

/// Parsed template with associated AST and original source.
#[derive(Clone)]
pub struct Template {
    name: String,
    source: String,
    ast: Ast,
    functions: FunctionRegistry,
    strict_fields: bool,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("strict_fields", &self.strict_fields)
            .finish()
    }
}

impl Template {
    /// Parses template source into an AST representation.
    pub fn parse_str(name: &str, source: &str) -> Result<Self, Error> {
        Self::parse_with_functions(name, source, FunctionRegistry::empty())
    }

    /// Parses template source and associates it with a registry of functions.
    pub fn parse_with_functions(
        name: &str,
        source: &str,
        functions: FunctionRegistry,
    ) -> Result<Self, Error> {
        let ast = parser::parse_template(name, source)?;
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            ast,
            functions,
            strict_fields: false,
        })
    }

    /// Returns the registry backing this template.
    pub fn functions(&self) -> FunctionRegistry {
        self.functions.clone()
    }

    pub fn set_functions(&mut self, functions: FunctionRegistry) {
        self.functions = functions;
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// When enabled, reading a key an object does not contain is a render
    /// error instead of producing an empty value.
    pub fn with_strict_fields(mut self, strict: bool) -> Self {
        self.strict_fields = strict;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Runs structural analysis over the template and returns helper usage metadata.
    pub fn analyze(&self) -> TemplateAnalysis {
        let analysis = analyze::analyze_template(&self.ast, Some(&self.functions));
        telemetry::record_analyze(&self.name, analysis.unknown_functions().len());
        analysis
    }

    /// Renders the template against the provided data.
    pub fn render(&self, data: &Value) -> Result<String, Error> {
        let started = Instant::now();
        let mut ctx = EvalContext::new(data.clone(), self.functions.clone())
            .with_strict_fields(self.strict_fields);
        let mut output = String::new();
        let result = Self::render_block(&mut ctx, &self.ast.root, &mut output);
        telemetry::record_render(&self.name, started.elapsed(), result.is_ok());
        result.map(|()| output)
    }

    fn render_block(ctx: &mut EvalContext, block: &Block, output: &mut String) -> Result<(), Error> {
        for node in &block.nodes {
            match node {
                Node::Text(text) => output.push_str(&text.text),
                Node::Comment(_) => {}
                Node::Action(action) => {
                    let value = ctx.eval_pipeline(&action.pipeline)?;
                    ctx.apply_bindings(&action.pipeline, &value)?;
                    if action.pipeline.declarations.is_none() {
                        output.push_str(&value_to_string(&value));
                    }
                }
                Node::If(if_node) => {
                    ctx.push_variables();
                    let result = Self::render_if(ctx, if_node, output);
                    ctx.pop_variables();
                    result?;
                }
                Node::Range(range_node) => {
                    ctx.push_variables();
                    let result = Self::render_range(ctx, range_node, output);
                    ctx.pop_variables();
                    result?;
                }
            }
        }
        Ok(())
    }

    fn render_if(ctx: &mut EvalContext, node: &IfNode, output: &mut String) -> Result<(), Error> {
        let value = ctx.eval_pipeline(&node.pipeline)?;
        ctx.apply_bindings(&node.pipeline, &value)?;
        if is_truthy(&value) {
            return Self::render_scoped(ctx, &node.then_block, output);
        }
        for branch in &node.else_if_branches {
            let branch_value = ctx.eval_pipeline(&branch.pipeline)?;
            ctx.apply_bindings(&branch.pipeline, &branch_value)?;
            if is_truthy(&branch_value) {
                return Self::render_scoped(ctx, &branch.block, output);
            }
        }
        match &node.else_block {
            Some(else_block) => Self::render_scoped(ctx, else_block, output),
            None => Ok(()),
        }
    }

    fn render_range(
        ctx: &mut EvalContext,
        node: &RangeNode,
        output: &mut String,
    ) -> Result<(), Error> {
        let items: Vec<(Value, Value)> = match ctx.eval_pipeline(&node.pipeline)? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::Number(Number::from(index as u64)), item))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(key, item)| (Value::String(key), item))
                .collect(),
            _ => Vec::new(),
        };

        if items.is_empty() {
            return match &node.else_block {
                Some(else_block) => Self::render_scoped(ctx, else_block, output),
                None => Ok(()),
            };
        }

        for (key, item) in items {
            ctx.push_variables();
            ctx.push_dot(item.clone());
            let result = ctx
                .assign_range_bindings(&node.pipeline, key, item)
                .and_then(|()| Self::render_block(ctx, &node.then_block, output));
            ctx.pop_dot();
            ctx.pop_variables();
            result?;
        }
        Ok(())
    }

    fn render_scoped(ctx: &mut EvalContext, block: &Block, output: &mut String) -> Result<(), Error> {
        ctx.push_variables();
        let result = Self::render_block(ctx, block, output);
        ctx.pop_variables();
        result
    }
}

/// Parses and renders `source` in one step.
pub fn render_once(
    name: &str,
    source: &str,
    data: &Value,
    functions: FunctionRegistry,
) -> Result<String, Error> {
    Template::parse_with_functions(name, source, functions)?.render(data)
}
