// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};
use smallvec::{smallvec, SmallVec};

use crate::ast::{BindingKind, Command, Expression, Pipeline};
use crate::error::Error;
use crate::telemetry;

/// Signature implemented by helper functions invoked from templates.
///
/// A piped value arrives as the last argument, as in Go.
pub type Function = dyn Fn(&mut EvalContext, &[Value]) -> Result<Value, Error> + Send + Sync;

/// Registry that maps helper names to callable functions.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    map: Arc<HashMap<String, Arc<Function>>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.function_names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a new builder for constructing registries.
    pub fn builder() -> FunctionRegistryBuilder {
        FunctionRegistryBuilder::new()
    }

    /// Fetches a helper function by name.
    pub fn get(&self, name: &str) -> Option<Arc<Function>> {
        self.map.get(name).cloned()
    }

    /// Reports whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Reports whether the registry contains no helper functions.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns a sorted list of the registered function names.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Collects helpers before freezing them into an immutable [`FunctionRegistry`].
#[derive(Default)]
pub struct FunctionRegistryBuilder {
    map: HashMap<String, Arc<Function>>,
}

impl FunctionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a helper under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut EvalContext, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.map.insert(name.into(), Arc::new(func));
        self
    }

    /// Copies every helper from `other` into this builder.
    pub fn extend(&mut self, other: &FunctionRegistry) -> &mut Self {
        for (key, value) in other.map.iter() {
            self.map.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn build(self) -> FunctionRegistry {
        FunctionRegistry {
            map: Arc::new(self.map),
        }
    }
}

/// Execution state threaded through template evaluation: the dot stack, the
/// `$` root, lexical variable scopes and the helper table.
pub struct EvalContext {
    dot: SmallVec<[Value; 4]>,
    root: Value,
    scopes: Vec<HashMap<String, Value>>,
    functions: FunctionRegistry,
    strict: bool,
}

impl EvalContext {
    pub fn new(data: Value, functions: FunctionRegistry) -> Self {
        Self {
            dot: smallvec![data.clone()],
            root: data,
            scopes: vec![HashMap::new()],
            functions,
            strict: false,
        }
    }

    /// Makes field lookups on objects fail when the key is absent instead of
    /// yielding null.
    pub fn with_strict_fields(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Retrieves a helper function by name, if registered.
    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.functions.get(name)
    }

    /// The helper table this context evaluates against.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Current value of `.`.
    pub fn dot(&self) -> &Value {
        self.dot.last().unwrap_or(&self.root)
    }

    pub fn push_dot(&mut self, value: Value) {
        self.dot.push(value);
    }

    pub fn pop_dot(&mut self) {
        if self.dot.len() > 1 {
            self.dot.pop();
        }
    }

    /// Opens a variable scope; declarations made until the matching
    /// [`pop_variables`](Self::pop_variables) are dropped with it.
    pub fn push_variables(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_variables(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Evaluates a pipeline, feeding each command's result into the next.
    pub fn eval_pipeline(&mut self, pipeline: &Pipeline) -> Result<Value, Error> {
        let mut commands = pipeline.commands.iter();
        let first = commands
            .next()
            .ok_or_else(|| Error::render("empty pipeline", None))?;
        let mut value = self.eval_command(first, None)?;
        for command in commands {
            value = self.eval_command(command, Some(value))?;
        }
        Ok(value)
    }

    /// Binds the pipeline's declared variables (if any) to `value`.
    pub fn apply_bindings(&mut self, pipeline: &Pipeline, value: &Value) -> Result<(), Error> {
        if let Some(decls) = &pipeline.declarations {
            for name in &decls.variables {
                self.bind_variable(name, decls.kind, value.clone())?;
            }
        }
        Ok(())
    }

    /// Binds `$key, $value` (or just `$value`) for one range iteration.
    pub fn assign_range_bindings(
        &mut self,
        pipeline: &Pipeline,
        key: Value,
        value: Value,
    ) -> Result<(), Error> {
        let Some(decls) = &pipeline.declarations else {
            return Ok(());
        };
        match decls.variables.as_slice() {
            [single] => self.bind_variable(single, decls.kind, value),
            [key_name, value_name, ..] => {
                self.bind_variable(key_name, decls.kind, key)?;
                self.bind_variable(value_name, decls.kind, value)
            }
            [] => Ok(()),
        }
    }

    fn bind_variable(&mut self, name: &str, kind: BindingKind, value: Value) -> Result<(), Error> {
        match kind {
            BindingKind::Declare => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.to_string(), value);
                }
                Ok(())
            }
            BindingKind::Assign => {
                let slot = self
                    .scopes
                    .iter_mut()
                    .rev()
                    .find_map(|scope| scope.get_mut(name))
                    .ok_or_else(|| Error::render(format!("variable {name} not defined"), None))?;
                *slot = value;
                Ok(())
            }
        }
    }

    fn eval_command(&mut self, command: &Command, input: Option<Value>) -> Result<Value, Error> {
        if let Expression::Identifier(name) = &command.target {
            let func = self.function(name).ok_or_else(|| {
                Error::render_with_span(format!("unknown function \"{name}\""), command.span)
            })?;
            let mut args = Vec::with_capacity(command.args.len() + usize::from(input.is_some()));
            for expr in &command.args {
                args.push(self.eval_expression(expr)?);
            }
            args.extend(input);
            let result = func(self, &args);
            telemetry::record_helper_invocation(name, result.is_ok());
            return result;
        }

        if !command.args.is_empty() {
            return Err(Error::render_with_span(
                "arguments supplied to non-function expression",
                command.span,
            ));
        }
        if input.is_some() {
            return Err(Error::render_with_span(
                "cannot pipe value into non-function expression",
                command.span,
            ));
        }
        self.eval_expression(&command.target)
            .map_err(|err| match err {
                Error::Render {
                    message,
                    source,
                    span: None,
                } => Error::Render {
                    message,
                    source,
                    span: Some(command.span),
                },
                other => other,
            })
    }

    fn eval_expression(&mut self, expr: &Expression) -> Result<Value, Error> {
        match expr {
            Expression::Identifier(name) => {
                let func = self
                    .function(name)
                    .ok_or_else(|| Error::render(format!("unknown function \"{name}\""), None))?;
                let result = func(self, &[]);
                telemetry::record_helper_invocation(name, result.is_ok());
                result
            }
            Expression::Field(parts) => self.resolve_field(parts),
            Expression::Variable(name) => self.resolve_variable(name),
            Expression::PipelineExpr(pipeline) => self.eval_pipeline(pipeline),
            Expression::StringLiteral(value) => Ok(Value::String(value.clone())),
            Expression::NumberLiteral(text) => parse_number(text)
                .map(Value::Number)
                .ok_or_else(|| Error::render(format!("invalid number literal {text}"), None)),
            Expression::BoolLiteral(flag) => Ok(Value::Bool(*flag)),
            Expression::Nil => Ok(Value::Null),
        }
    }

    fn resolve_field(&self, parts: &[String]) -> Result<Value, Error> {
        let (mut value, rest) = match parts.split_first() {
            Some((first, rest)) if first.starts_with('$') => (self.resolve_variable(first)?, rest),
            _ => (self.dot().clone(), parts),
        };
        for part in rest {
            value = self.project_field_segment(value, part)?;
        }
        Ok(value)
    }

    fn resolve_variable(&self, name: &str) -> Result<Value, Error> {
        if name == "$" {
            return Ok(self.root.clone());
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| Error::render(format!("undefined variable {name}"), None))
    }

    fn project_field_segment(&self, value: Value, part: &str) -> Result<Value, Error> {
        match value {
            Value::Object(mut map) => match map.remove(part) {
                Some(found) => Ok(found),
                None if self.strict => Err(Error::render(
                    format!("map has no entry for key \"{part}\""),
                    None,
                )),
                None => Ok(Value::Null),
            },
            Value::Array(list) => {
                let index = part.parse::<usize>().map_err(|_| {
                    Error::render(format!("array index must be integer, got {part}"), None)
                })?;
                Ok(list.get(index).cloned().unwrap_or(Value::Null))
            }
            other => Err(Error::render(
                format!("cannot access field {part} on {}", type_name(&other)),
                None,
            )),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Text a value produces when printed by an action.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Parses a number literal, preferring integers when the text has no
/// fraction or exponent.
pub fn parse_number(text: &str) -> Option<Number> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(value) = text.parse::<i64>() {
            return Some(Number::from(value));
        }
        if let Ok(value) = text.parse::<u64>() {
            return Some(Number::from(value));
        }
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Go truthiness: false, 0, "", nil and empty collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PipelineDeclarations, Span};
    use serde_json::json;

    fn registry_with_echo() -> FunctionRegistry {
        let mut builder = FunctionRegistry::builder();
        builder.register("echo", |_, args| {
            Ok(Value::Array(args.to_vec()))
        });
        builder.build()
    }

    fn command(target: Expression, args: Vec<Expression>) -> Command {
        Command::new(Span::new(0, 0), target, args)
    }

    #[test]
    fn piped_value_is_appended_to_arguments() {
        let mut ctx = EvalContext::new(Value::Null, registry_with_echo());
        let cmd = command(
            Expression::Identifier("echo".into()),
            vec![Expression::NumberLiteral("7".into())],
        );
        let value = ctx.eval_command(&cmd, Some(json!(false))).unwrap();
        assert_eq!(value, json!([7, false]));
    }

    #[test]
    fn unknown_function_is_error() {
        let mut ctx = EvalContext::new(Value::Null, FunctionRegistry::empty());
        let cmd = command(Expression::Identifier("missing".into()), Vec::new());
        let err = ctx.eval_command(&cmd, None).unwrap_err();
        assert!(err.to_string().contains("unknown function \"missing\""));
    }

    #[test]
    fn piping_into_literal_is_rejected() {
        let mut ctx = EvalContext::new(Value::Null, FunctionRegistry::empty());
        let cmd = command(Expression::BoolLiteral(true), Vec::new());
        let err = ctx.eval_command(&cmd, Some(Value::Null)).unwrap_err();
        assert!(err
            .to_string()
            .contains("cannot pipe value into non-function expression"));
    }

    #[test]
    fn strict_fields_reject_missing_keys() {
        let data = json!({"present": 1});
        let lenient = EvalContext::new(data.clone(), FunctionRegistry::empty());
        assert_eq!(
            lenient.resolve_field(&["absent".to_string()]).unwrap(),
            Value::Null
        );

        let strict = EvalContext::new(data, FunctionRegistry::empty()).with_strict_fields(true);
        let err = strict.resolve_field(&["absent".to_string()]).unwrap_err();
        assert!(err.to_string().contains("no entry for key \"absent\""));
    }

    #[test]
    fn assignment_walks_outward_through_scopes() {
        let mut ctx = EvalContext::new(Value::Null, FunctionRegistry::empty());
        ctx.bind_variable("$x", BindingKind::Declare, json!("outer"))
            .unwrap();
        ctx.push_variables();
        ctx.bind_variable("$x", BindingKind::Assign, json!("updated"))
            .unwrap();
        ctx.pop_variables();
        assert_eq!(ctx.resolve_variable("$x").unwrap(), json!("updated"));

        let err = ctx
            .bind_variable("$y", BindingKind::Assign, Value::Null)
            .unwrap_err();
        assert!(err.to_string().contains("variable $y not defined"));
    }

    #[test]
    fn range_bindings_set_key_and_value() {
        let mut ctx = EvalContext::new(Value::Null, FunctionRegistry::empty());
        let decls = PipelineDeclarations::new(BindingKind::Declare, vec!["$k".into(), "$v".into()]);
        let pipeline = Pipeline::new(Some(decls), Vec::new());
        ctx.assign_range_bindings(&pipeline, json!(5), json!(42))
            .unwrap();
        assert_eq!(ctx.resolve_variable("$k").unwrap(), json!(5));
        assert_eq!(ctx.resolve_variable("$v").unwrap(), json!(42));
    }

    #[test]
    fn truthiness_follows_go() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(0.5)));
    }

    #[test]
    fn parse_number_prefers_integers() {
        assert_eq!(parse_number("12"), Some(Number::from(12)));
        assert_eq!(parse_number("-3"), Some(Number::from(-3)));
        assert_eq!(parse_number("1.0").and_then(|n| n.as_f64()), Some(1.0));
        assert!(parse_number("1.0").unwrap().is_f64());
        assert_eq!(parse_number("abc"), None);
    }
}
