// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Static inspection of parsed templates: which helpers are called, which
//! context paths are read and which control structures appear.
use std::collections::HashSet;

use crate::ast::{ActionNode, Ast, Block, Command, Expression, IfNode, Node, Pipeline, RangeNode, Span};
use crate::runtime::FunctionRegistry;

pub fn analyze_template(ast: &Ast, registry: Option<&FunctionRegistry>) -> TemplateAnalysis {
    let mut analyzer = Analyzer::new(registry);
    analyzer.walk_block(&ast.root);
    analyzer.finish()
}

#[derive(Debug, Clone)]
pub struct TemplateAnalysis {
    pub variables: Vec<VariableAccess>,
    pub functions: Vec<FunctionCall>,
    pub controls: Vec<ControlUsage>,
}

impl TemplateAnalysis {
    /// Names of called helpers missing from the registry, deduplicated and
    /// in first-use order.
    pub fn unknown_functions(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.functions
            .iter()
            .filter(|call| call.source == FunctionSource::Unknown)
            .map(|call| call.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct VariableAccess {
    pub path: String,
    pub span: Span,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Dot,
    Dollar,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub span: Span,
    pub source: FunctionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionSource {
    Registered,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ControlUsage {
    pub kind: ControlKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    If,
    ElseIf,
    Range,
}

struct Analyzer<'a> {
    registry: Option<&'a FunctionRegistry>,
    variables: Vec<VariableAccess>,
    functions: Vec<FunctionCall>,
    controls: Vec<ControlUsage>,
    seen_vars: HashSet<(String, Span)>,
}

impl<'a> Analyzer<'a> {
    fn new(registry: Option<&'a FunctionRegistry>) -> Self {
        Self {
            registry,
            variables: Vec::new(),
            functions: Vec::new(),
            controls: Vec::new(),
            seen_vars: HashSet::new(),
        }
    }

    fn finish(self) -> TemplateAnalysis {
        TemplateAnalysis {
            variables: self.variables,
            functions: self.functions,
            controls: self.controls,
        }
    }

    fn walk_block(&mut self, block: &Block) {
        for node in &block.nodes {
            match node {
                Node::Action(action) => self.visit_action(action),
                Node::If(if_node) => self.visit_if(if_node),
                Node::Range(range_node) => self.visit_range(range_node),
                Node::Text(_) | Node::Comment(_) => {}
            }
        }
    }

    fn visit_action(&mut self, action: &ActionNode) {
        self.visit_pipeline(&action.pipeline);
    }

    fn visit_if(&mut self, node: &IfNode) {
        self.controls.push(ControlUsage {
            kind: ControlKind::If,
            span: node.span,
        });
        self.visit_pipeline(&node.pipeline);
        self.walk_block(&node.then_block);
        for branch in &node.else_if_branches {
            self.controls.push(ControlUsage {
                kind: ControlKind::ElseIf,
                span: branch.span,
            });
            self.visit_pipeline(&branch.pipeline);
            self.walk_block(&branch.block);
        }
        if let Some(else_block) = &node.else_block {
            self.walk_block(else_block);
        }
    }

    fn visit_range(&mut self, node: &RangeNode) {
        self.controls.push(ControlUsage {
            kind: ControlKind::Range,
            span: node.span,
        });
        self.visit_pipeline(&node.pipeline);
        self.walk_block(&node.then_block);
        if let Some(else_block) = &node.else_block {
            self.walk_block(else_block);
        }
    }

    fn visit_pipeline(&mut self, pipeline: &Pipeline) {
        for command in &pipeline.commands {
            self.visit_command(command);
        }
    }

    fn visit_command(&mut self, command: &Command) {
        if let Expression::Identifier(name) = &command.target {
            self.record_function(name.clone(), command.span);
        } else {
            self.collect_expr(&command.target, command.span);
        }
        for arg in &command.args {
            self.collect_expr(arg, command.span);
        }
    }

    fn collect_expr(&mut self, expr: &Expression, span: Span) {
        match expr {
            Expression::Identifier(name) => self.record_function(name.clone(), span),
            Expression::Field(parts) => {
                let kind = match parts.first() {
                    Some(first) if first.starts_with('$') => VariableKind::Dollar,
                    _ => VariableKind::Dot,
                };
                self.record_variable(field_path(parts), span, kind);
            }
            Expression::Variable(name) => {
                self.record_variable(name.clone(), span, VariableKind::Dollar);
            }
            Expression::PipelineExpr(pipeline) => self.visit_pipeline(pipeline),
            Expression::StringLiteral(_)
            | Expression::NumberLiteral(_)
            | Expression::BoolLiteral(_)
            | Expression::Nil => {}
        }
    }

    fn record_variable(&mut self, path: String, span: Span, kind: VariableKind) {
        if self.seen_vars.insert((path.clone(), span)) {
            self.variables.push(VariableAccess { path, span, kind });
        }
    }

    fn record_function(&mut self, name: String, span: Span) {
        let source = if self.registry.is_some_and(|reg| reg.contains(&name)) {
            FunctionSource::Registered
        } else {
            FunctionSource::Unknown
        };
        self.functions.push(FunctionCall { name, span, source });
    }
}

fn field_path(parts: &[String]) -> String {
    match parts.first() {
        None => ".".to_string(),
        Some(first) if first.starts_with('$') => parts.join("."),
        Some(_) => format!(".{}", parts.join(".")),
    }
}
