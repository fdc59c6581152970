// SPDX-License-Identifier: Apache-2.0 OR MIT
use crate::ast::{
    ActionNode, Ast, BindingKind, Block, Command, CommentNode, ElseIfBranch, Expression, IfNode,
    Node, Pipeline, PipelineDeclarations, RangeNode, Span, TextNode,
};
use crate::error::Error;
use crate::lexer::{self, Keyword, Token, TokenKind};

/// Parses template source into an [`Ast`].
///
/// The source is scanned once, alternating between literal text and `{{ … }}`
/// actions. Open `if`/`range` frames live on `controls`; nodes are appended to
/// the innermost open section (then, else-if, or else), or to the root block
/// when no frame is open. `{{end}}` folds the innermost frame into a node of
/// its parent.
pub fn parse_template(name: &str, source: &str) -> Result<Ast, Error> {
    let mut root = Block::default();
    let mut controls: Vec<ControlFrame> = Vec::new();
    let bytes = source.as_bytes();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let Some(open) = find_action_start(bytes, cursor) else {
            push_text(&mut root, &mut controls, source, cursor, source.len());
            break;
        };
        push_text(&mut root, &mut controls, source, cursor, open);

        let Some(close) = find_action_end(bytes, open + 2) else {
            let span = Span::new(open, source.len());
            let remainder = source[open + 2..].trim_start();
            let remainder = remainder.strip_prefix('-').unwrap_or(remainder).trim_start();
            if remainder.starts_with("/*") {
                return Err(Error::parse_with_span("unclosed comment", span));
            }
            return Err(Error::parse_with_span("unclosed action", span));
        };

        let window = ActionWindow::new(source, open, close);
        if window.trim_left {
            trim_trailing_whitespace(current_block(&mut root, &mut controls));
        }

        if window.body.starts_with("/*") {
            if !window.body.ends_with("*/") || window.body.len() < 4 {
                return Err(Error::parse_with_span("unclosed comment", window.span));
            }
            let text = window.body[2..window.body.len() - 2].trim();
            current_block(&mut root, &mut controls)
                .push(Node::Comment(CommentNode::new(window.span, text)));
        } else {
            let tokens = lexer::lex_action(window.body, window.body_start)?;
            handle_action(&mut root, &mut controls, &window, &tokens)?;
        }

        cursor = close + 2;
        if window.trim_right {
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
        }
    }

    if let Some(frame) = controls.last() {
        return Err(Error::parse_with_span(
            format!("unterminated {} block", frame.kind.keyword()),
            frame.start_span,
        ));
    }

    Ok(Ast::new(name, root))
}

fn handle_action(
    root: &mut Block,
    controls: &mut Vec<ControlFrame>,
    window: &ActionWindow<'_>,
    tokens: &[Token],
) -> Result<(), Error> {
    let Some(first) = tokens.first() else {
        return Err(Error::parse_with_span("empty action", window.span));
    };

    match &first.kind {
        TokenKind::Keyword(Keyword::If) => {
            let pipeline = parse_control_pipeline("if", first, &tokens[1..])?;
            controls.push(ControlFrame::new(ControlKind::If, window.span, pipeline));
        }
        TokenKind::Keyword(Keyword::Range) => {
            let pipeline = parse_control_pipeline("range", first, &tokens[1..])?;
            if let Some(decls) = &pipeline.declarations {
                if decls.variables.len() > 2 || decls.kind == BindingKind::Assign {
                    return Err(Error::parse_with_span(
                        "range declares at most two variables with :=",
                        window.span,
                    ));
                }
            }
            controls.push(ControlFrame::new(ControlKind::Range, window.span, pipeline));
        }
        TokenKind::Keyword(Keyword::Else) => {
            let frame = controls
                .last_mut()
                .ok_or_else(|| Error::parse_with_span("unexpected else", window.span))?;
            match tokens.get(1).map(|token| &token.kind) {
                None => frame.open_else(window.span)?,
                Some(TokenKind::Keyword(Keyword::If)) => {
                    let pipeline = parse_control_pipeline("else if", first, &tokens[2..])?;
                    frame.open_else_if(window.span, pipeline)?;
                }
                Some(_) => {
                    return Err(Error::parse_with_span(
                        "unexpected tokens after else",
                        tokens[1].span,
                    ));
                }
            }
        }
        TokenKind::Keyword(Keyword::End) => {
            if let Some(extra) = tokens.get(1) {
                return Err(Error::parse_with_span(
                    "unexpected tokens after end",
                    extra.span,
                ));
            }
            let frame = controls
                .pop()
                .ok_or_else(|| Error::parse_with_span("unexpected end", window.span))?;
            let node = frame.finish(window.span);
            current_block(root, controls).push(node);
        }
        _ => {
            let pipeline = parse_pipeline_tokens(tokens)?;
            current_block(root, controls).push(Node::Action(ActionNode::new(
                window.span,
                window.body,
                pipeline,
            )));
        }
    }
    Ok(())
}

fn parse_control_pipeline(
    keyword: &str,
    keyword_token: &Token,
    tokens: &[Token],
) -> Result<Pipeline, Error> {
    if tokens.is_empty() {
        return Err(Error::parse_with_span(
            format!("{keyword} requires a pipeline"),
            keyword_token.span,
        ));
    }
    parse_pipeline_tokens(tokens)
}

/// Delimiters and trim markers of one `{{ … }}` occurrence.
#[derive(Debug, Clone, Copy)]
struct ActionWindow<'a> {
    span: Span,
    body_start: usize,
    body: &'a str,
    trim_left: bool,
    trim_right: bool,
}

impl<'a> ActionWindow<'a> {
    fn new(source: &'a str, open: usize, close: usize) -> Self {
        let bytes = source.as_bytes();
        let mut body_start = open + 2;
        let mut body_end = close;

        // `{{-` and `-}}` only trim when followed/preceded by whitespace, so
        // `{{-3}}` still prints a negative number.
        let trim_left = body_start + 1 < body_end
            && bytes[body_start] == b'-'
            && bytes[body_start + 1].is_ascii_whitespace();
        if trim_left {
            body_start += 1;
        }
        let trim_right = body_end >= body_start + 2
            && bytes[body_end - 1] == b'-'
            && bytes[body_end - 2].is_ascii_whitespace();
        if trim_right {
            body_end -= 1;
        }

        let raw = &source[body_start..body_end];
        let trimmed = raw.trim_start();
        body_start += raw.len() - trimmed.len();

        Self {
            span: Span::new(open, close + 2),
            body_start,
            body: trimmed.trim_end(),
            trim_left,
            trim_right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlKind {
    If,
    Range,
}

impl ControlKind {
    fn keyword(self) -> &'static str {
        match self {
            ControlKind::If => "if",
            ControlKind::Range => "range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Then,
    ElseIf(usize),
    Else,
}

#[derive(Debug)]
struct ControlFrame {
    kind: ControlKind,
    start_span: Span,
    pipeline: Pipeline,
    then_block: Block,
    else_if_branches: Vec<ElseIfBranch>,
    else_block: Option<Block>,
    section: Section,
}

impl ControlFrame {
    fn new(kind: ControlKind, span: Span, pipeline: Pipeline) -> Self {
        Self {
            kind,
            start_span: span,
            pipeline,
            then_block: Block::default(),
            else_if_branches: Vec::new(),
            else_block: None,
            section: Section::Then,
        }
    }

    fn block_mut(&mut self) -> &mut Block {
        match self.section {
            Section::Then => &mut self.then_block,
            Section::ElseIf(idx) => &mut self.else_if_branches[idx].block,
            Section::Else => self.else_block.get_or_insert_with(Block::default),
        }
    }

    fn open_else(&mut self, span: Span) -> Result<(), Error> {
        if self.section == Section::Else {
            return Err(Error::parse_with_span("duplicate else block", span));
        }
        self.else_block = Some(Block::default());
        self.section = Section::Else;
        Ok(())
    }

    fn open_else_if(&mut self, span: Span, pipeline: Pipeline) -> Result<(), Error> {
        if self.kind != ControlKind::If {
            return Err(Error::parse_with_span("else if is only valid inside if", span));
        }
        if self.section == Section::Else {
            return Err(Error::parse_with_span("else if after else", span));
        }
        self.else_if_branches.push(ElseIfBranch {
            span,
            pipeline,
            block: Block::default(),
        });
        self.section = Section::ElseIf(self.else_if_branches.len() - 1);
        Ok(())
    }

    fn finish(self, end_span: Span) -> Node {
        let span = self.start_span.to(end_span);
        match self.kind {
            ControlKind::If => Node::If(IfNode {
                span,
                pipeline: self.pipeline,
                then_block: self.then_block,
                else_if_branches: self.else_if_branches,
                else_block: self.else_block,
            }),
            ControlKind::Range => Node::Range(RangeNode {
                span,
                pipeline: self.pipeline,
                then_block: self.then_block,
                else_block: self.else_block,
            }),
        }
    }
}

fn current_block<'a>(root: &'a mut Block, controls: &'a mut [ControlFrame]) -> &'a mut Block {
    match controls.last_mut() {
        Some(frame) => frame.block_mut(),
        None => root,
    }
}

fn push_text(
    root: &mut Block,
    controls: &mut [ControlFrame],
    source: &str,
    start: usize,
    end: usize,
) {
    if start < end {
        current_block(root, controls).push(Node::Text(TextNode::new(
            Span::new(start, end),
            &source[start..end],
        )));
    }
}

fn trim_trailing_whitespace(block: &mut Block) {
    if let Some(Node::Text(text)) = block.nodes.last_mut() {
        let kept = text.text.trim_end_matches([' ', '\t', '\n', '\r']).len();
        text.text.truncate(kept);
    }
}

fn parse_pipeline_tokens(tokens: &[Token]) -> Result<Pipeline, Error> {
    let mut parser = ActionParser::new(tokens);
    let pipeline = parser.parse_pipeline()?;
    if let Some(token) = parser.peek_token() {
        return Err(Error::parse_with_span(
            format!("unexpected token {:?}", token.kind),
            token.span,
        ));
    }
    Ok(pipeline)
}

struct ActionParser<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> ActionParser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, index: 0 }
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, Error> {
        let declarations = self.parse_declarations();
        if self.is_eof() {
            let span = self.tokens.last().map(|token| token.span);
            return Err(Error::parse("empty pipeline", span));
        }

        let mut commands = vec![self.parse_command()?];
        while self.next_if(|kind| matches!(kind, TokenKind::Pipe)).is_some() {
            if self.is_eof() {
                return Err(Error::parse("missing command after '|'", None));
            }
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline::new(declarations, commands))
    }

    /// Consumes `$a[, $b] :=` or `$a =` when present; rewinds otherwise.
    fn parse_declarations(&mut self) -> Option<PipelineDeclarations> {
        let save = self.index;
        let mut names = Vec::new();

        while let Some(Token {
            kind: TokenKind::Identifier(name),
            ..
        }) = self.peek_token()
        {
            if !name.starts_with('$') {
                break;
            }
            names.push(name.clone());
            self.index += 1;
            if self.next_if(|kind| matches!(kind, TokenKind::Comma)).is_none() {
                break;
            }
        }

        let kind = match self.peek_token().map(|token| &token.kind) {
            Some(TokenKind::Declare) if !names.is_empty() => BindingKind::Declare,
            Some(TokenKind::Assign) if !names.is_empty() => BindingKind::Assign,
            _ => {
                self.index = save;
                return None;
            }
        };
        self.index += 1;
        Some(PipelineDeclarations::new(kind, names))
    }

    fn parse_command(&mut self) -> Result<Command, Error> {
        let start = self.peek_token().map(|token| token.span);
        let target = self.parse_expression()?;
        let mut args = Vec::new();
        while let Some(token) = self.peek_token() {
            match token.kind {
                TokenKind::Pipe | TokenKind::RightParen => break,
                TokenKind::Comma => self.index += 1,
                _ => args.push(self.parse_expression()?),
            }
        }
        let end = self.tokens[..self.index].last().map(|token| token.span);
        let span = match (start, end) {
            (Some(start), Some(end)) => start.to(end),
            _ => Span::new(0, 0),
        };
        Ok(Command::new(span, target, args))
    }

    fn parse_expression(&mut self) -> Result<Expression, Error> {
        let token = self
            .next_token()
            .ok_or_else(|| Error::parse("unexpected end of action", None))?;
        let expr = match &token.kind {
            TokenKind::Identifier(name) if name.starts_with('$') => {
                let mut parts = vec![name.clone()];
                self.extend_field_segments(&mut parts, token.span);
                if parts.len() > 1 {
                    Expression::Field(parts)
                } else {
                    Expression::Variable(name.clone())
                }
            }
            TokenKind::Identifier(name) => Expression::Identifier(name.clone()),
            TokenKind::Dot => {
                let mut parts = Vec::new();
                if let Some(segment) = self.peek_token() {
                    if let Some(name) = field_segment(segment, token.span) {
                        parts.push(name);
                        self.index += 1;
                        self.extend_field_segments(&mut parts, segment.span);
                    }
                }
                Expression::Field(parts)
            }
            TokenKind::StringLiteral(value) => Expression::StringLiteral(value.clone()),
            TokenKind::NumberLiteral(value) => Expression::NumberLiteral(value.clone()),
            TokenKind::Keyword(Keyword::Nil) => Expression::Nil,
            TokenKind::Keyword(Keyword::True) => Expression::BoolLiteral(true),
            TokenKind::Keyword(Keyword::False) => Expression::BoolLiteral(false),
            TokenKind::LeftParen => self.parse_parenthesized(token.span)?,
            other => {
                return Err(Error::parse_with_span(
                    format!("unexpected token in expression: {other:?}"),
                    token.span,
                ));
            }
        };
        Ok(expr)
    }

    fn parse_parenthesized(&mut self, open_span: Span) -> Result<Expression, Error> {
        let pipeline = self.parse_pipeline()?;
        if pipeline.declarations.is_some() {
            return Err(Error::parse_with_span(
                "pipeline declarations not allowed in expression",
                open_span,
            ));
        }
        if self
            .next_if(|kind| matches!(kind, TokenKind::RightParen))
            .is_none()
        {
            return Err(Error::parse_with_span("expected ')'", open_span));
        }
        Ok(Expression::PipelineExpr(Box::new(pipeline)))
    }

    /// Follows `.name` segments that touch the previous token (`$x.a.b`).
    fn extend_field_segments(&mut self, parts: &mut Vec<String>, mut last_span: Span) {
        while let (Some(dot), Some(segment)) = (
            self.tokens.get(self.index),
            self.tokens.get(self.index + 1),
        ) {
            if dot.kind != TokenKind::Dot || dot.span.start != last_span.end {
                break;
            }
            let Some(name) = field_segment(segment, dot.span) else {
                break;
            };
            parts.push(name);
            last_span = segment.span;
            self.index += 2;
        }
    }

    fn next_if(&mut self, pred: impl Fn(&TokenKind) -> bool) -> Option<&'a Token> {
        let token = self.tokens.get(self.index).filter(|token| pred(&token.kind))?;
        self.index += 1;
        Some(token)
    }

    fn next_token(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;
        Some(token)
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    fn is_eof(&self) -> bool {
        self.index >= self.tokens.len()
    }
}

/// Name of a field segment directly after a dot, if `token` is one.
fn field_segment(token: &Token, dot_span: Span) -> Option<String> {
    if token.span.start != dot_span.end {
        return None;
    }
    match &token.kind {
        TokenKind::Identifier(name) if !name.starts_with('$') => Some(name.clone()),
        TokenKind::NumberLiteral(num) if !num.starts_with('-') => Some(num.clone()),
        _ => None,
    }
}

fn find_action_start(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len().saturating_sub(1)).find(|&i| bytes[i] == b'{' && bytes[i + 1] == b'{')
}

/// Finds the closing `}}`, skipping over string literals, raw strings and
/// comments that may themselves contain braces.
fn find_action_end(bytes: &[u8], from: usize) -> Option<usize> {
    #[derive(PartialEq)]
    enum State {
        Code,
        Str,
        Raw,
        Comment,
    }

    let mut state = State::Code;
    let mut i = from;
    while i + 1 < bytes.len() {
        let (current, next) = (bytes[i], bytes[i + 1]);
        match state {
            State::Comment if current == b'*' && next == b'/' => {
                state = State::Code;
                i += 1;
            }
            State::Raw if current == b'`' => state = State::Code,
            State::Str if current == b'\\' => i += 1,
            State::Str if current == b'"' => state = State::Code,
            State::Code => match current {
                b'/' if next == b'*' => {
                    state = State::Comment;
                    i += 1;
                }
                b'`' => state = State::Raw,
                b'"' => state = State::Str,
                b'}' if next == b'}' => return Some(i),
                _ => {}
            },
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(ast: &Ast, index: usize) -> &ActionNode {
        match &ast.root.nodes[index] {
            Node::Action(node) => node,
            other => panic!("expected action node, found {other:?}"),
        }
    }

    #[test]
    fn action_window_reports_trim_flags() {
        let source = "{{- foo -}}";
        let window = ActionWindow::new(source, 0, source.len() - 2);
        assert!(window.trim_left);
        assert!(window.trim_right);
        assert_eq!(window.body, "foo");
        assert_eq!(window.body_start, 4);
        assert_eq!(window.span, Span::new(0, source.len()));
    }

    #[test]
    fn negative_number_is_not_a_trim_marker() {
        let ast = parse_template("neg", "a {{-3}}").unwrap();
        assert_eq!(ast.root.nodes.len(), 2);
        let node = action(&ast, 1);
        assert!(matches!(
            &node.pipeline.commands[0].target,
            Expression::NumberLiteral(n) if n == "-3"
        ));
    }

    #[test]
    fn find_action_end_skips_quoted_braces() {
        let input = br#"{{ "}}" }} tail"#;
        let end = find_action_end(input, 2).expect("should find closing braces");
        assert_eq!(end, 8);
    }

    #[test]
    fn find_action_end_handles_comment_with_quotes() {
        let input = b"{{/* comment with \" unmatched */}} tail";
        let end = find_action_end(input, 2).expect("should find closing braces");
        assert_eq!(&input[end..end + 2], b"}}");
    }

    #[test]
    fn parses_pipeline_into_individual_commands() {
        let ast = parse_template("pipe", "{{ .name | goify | print \"x\" }}").unwrap();
        let node = action(&ast, 0);
        assert_eq!(node.pipeline.commands.len(), 3);
        assert!(matches!(
            &node.pipeline.commands[0].target,
            Expression::Field(parts) if parts == &["name".to_string()]
        ));
        assert!(matches!(
            node.pipeline.commands[2].args.as_slice(),
            [Expression::StringLiteral(value)] if value == "x"
        ));
    }

    #[test]
    fn parses_nested_parenthesized_pipelines() {
        let ast = parse_template("paren", "{{ tabs (add (add .depth 1) 1) }}").unwrap();
        let node = action(&ast, 0);
        let [Expression::PipelineExpr(outer)] = node.pipeline.commands[0].args.as_slice() else {
            panic!("expected a sub-pipeline argument");
        };
        assert!(matches!(
            outer.commands[0].args.first(),
            Some(Expression::PipelineExpr(_))
        ));
    }

    #[test]
    fn parses_variable_field_paths() {
        let ast = parse_template("vars", "{{ $.target }}{{ $x.a.b }}").unwrap();
        assert!(matches!(
            &action(&ast, 0).pipeline.commands[0].target,
            Expression::Field(parts) if parts == &["$".to_string(), "target".to_string()]
        ));
        assert!(matches!(
            &action(&ast, 1).pipeline.commands[0].target,
            Expression::Field(parts) if parts.len() == 3
        ));
    }

    #[test]
    fn parses_if_else_if_chain() {
        let src = "{{if .a}}A{{else if .b}}B{{else if .c}}C{{else}}D{{end}}";
        let ast = parse_template("chain", src).unwrap();
        let Node::If(node) = &ast.root.nodes[0] else {
            panic!("expected if node");
        };
        assert_eq!(node.else_if_branches.len(), 2);
        assert!(node.else_block.is_some());
        assert_eq!(node.span, Span::new(0, src.len()));
    }

    #[test]
    fn range_pipeline_captures_declarations() {
        let ast = parse_template("range", "{{range $i, $v := .items}}{{$v}}{{end}}").unwrap();
        let Node::Range(node) = &ast.root.nodes[0] else {
            panic!("expected range node");
        };
        let decls = node.pipeline.declarations.as_ref().expect("declarations");
        assert_eq!(decls.kind, BindingKind::Declare);
        assert_eq!(decls.variables, vec!["$i".to_string(), "$v".to_string()]);
    }

    #[test]
    fn trim_markers_strip_surrounding_whitespace() {
        let ast = parse_template("trim", "a  \n{{- if .x -}}\n  b\n{{- end }}").unwrap();
        let Node::Text(lead) = &ast.root.nodes[0] else {
            panic!("expected text");
        };
        assert_eq!(lead.text, "a");
        let Node::If(node) = &ast.root.nodes[1] else {
            panic!("expected if");
        };
        let Node::Text(body) = &node.then_block.nodes[0] else {
            panic!("expected text");
        };
        assert_eq!(body.text, "b");
    }

    #[test]
    fn structural_errors_are_reported() {
        let cases = [
            ("{{ .x", "unclosed action"),
            ("{{/* open }}", "unclosed comment"),
            ("{{end}}", "unexpected end"),
            ("{{else}}", "unexpected else"),
            ("{{if .x}}a", "unterminated if block"),
            ("{{if .x}}{{else}}{{else}}{{end}}", "duplicate else"),
            ("{{range .x}}{{else if .y}}{{end}}", "only valid inside if"),
            ("{{}}", "empty action"),
            ("{{ (print 1 }}", "expected ')'"),
            ("{{ print 1 ) }}", "unexpected token"),
            ("{{ if }}{{ end }}", "if requires a pipeline"),
        ];
        for (src, expected) in cases {
            let err = parse_template("bad", src).expect_err(src);
            assert!(
                err.to_string().contains(expected),
                "{src}: expected '{expected}', got '{err}'"
            );
        }
    }
}
