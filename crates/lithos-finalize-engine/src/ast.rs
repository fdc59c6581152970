// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

/// Byte offsets into the original template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Root AST structure for a parsed template.
#[derive(Debug, Clone)]
pub struct Ast {
    pub name: String,
    pub root: Block,
}

impl Ast {
    pub fn new(name: impl Into<String>, root: Block) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }
}

/// A sequential list of nodes.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node types recognised by the parser.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Node {
    Text(TextNode),
    Action(ActionNode),
    Comment(CommentNode),
    If(IfNode),
    Range(RangeNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(node) => node.span,
            Node::Action(node) => node.span,
            Node::Comment(node) => node.span,
            Node::If(node) => node.span,
            Node::Range(node) => node.span,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(node) => write!(f, "Text({:?})", node.text),
            Node::Action(node) => write!(f, "Action({:?})", node.source),
            Node::Comment(_) => write!(f, "Comment"),
            Node::If(_) => write!(f, "If"),
            Node::Range(_) => write!(f, "Range"),
        }
    }
}

/// Raw text literal.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub span: Span,
    pub text: String,
}

impl TextNode {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// `{{ pipeline }}` with its trimmed source text.
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub span: Span,
    pub source: String,
    pub pipeline: Pipeline,
}

impl ActionNode {
    pub fn new(span: Span, source: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            span,
            source: source.into(),
            pipeline,
        }
    }
}

/// `{{/* comment */}}`
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub span: Span,
    pub text: String,
}

impl CommentNode {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// `{{if}} … {{else if}} … {{else}} … {{end}}`
#[derive(Debug, Clone)]
pub struct IfNode {
    pub span: Span,
    pub pipeline: Pipeline,
    pub then_block: Block,
    pub else_if_branches: Vec<ElseIfBranch>,
    pub else_block: Option<Block>,
}

/// One `{{else if pipeline}}` arm.
#[derive(Debug, Clone)]
pub struct ElseIfBranch {
    pub span: Span,
    pub pipeline: Pipeline,
    pub block: Block,
}

/// `{{range}} … {{else}} … {{end}}`
#[derive(Debug, Clone)]
pub struct RangeNode {
    pub span: Span,
    pub pipeline: Pipeline,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

/// A complete pipeline inside an action.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub declarations: Option<PipelineDeclarations>,
    pub commands: Vec<Command>,
}

impl Pipeline {
    pub fn new(declarations: Option<PipelineDeclarations>, commands: Vec<Command>) -> Self {
        Self {
            declarations,
            commands,
        }
    }
}

/// Variables bound by a pipeline (`{{$x := …}}`, `{{range $i, $v := …}}`).
#[derive(Debug, Clone)]
pub struct PipelineDeclarations {
    pub kind: BindingKind,
    pub variables: Vec<String>,
}

impl PipelineDeclarations {
    pub fn new(kind: BindingKind, variables: Vec<String>) -> Self {
        Self { kind, variables }
    }
}

/// `:=` introduces a variable in the current scope, `=` updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Declare,
    Assign,
}

/// Individual command in a pipeline.
#[derive(Debug, Clone)]
pub struct Command {
    pub span: Span,
    pub target: Expression,
    pub args: Vec<Expression>,
}

impl Command {
    pub fn new(span: Span, target: Expression, args: Vec<Expression>) -> Self {
        Self { span, target, args }
    }
}

/// Expression node.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Expression {
    Identifier(String),
    /// `.a.b`, or `$x.a.b` when the first segment starts with `$`.
    Field(Vec<String>),
    Variable(String),
    PipelineExpr(Box<Pipeline>),
    StringLiteral(String),
    NumberLiteral(String),
    BoolLiteral(bool),
    Nil,
}
