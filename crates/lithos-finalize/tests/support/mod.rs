// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Interpreter for the Go statements the finalizer emits, run against JSON
//! instances. Struct pointers are JSON objects, nil is null or an absent key,
//! and slice elements behave as pointers so loop variables write through.
#![allow(dead_code)]

use std::collections::HashMap;

use lithos_finalize_engine::literal_value;
use serde_json::Value;

static NULL: Value = Value::Null;

#[derive(Debug, Clone)]
enum Stmt {
    Var { name: String, value: Value },
    IfNil { path: String, negate: bool, body: Vec<Stmt> },
    Assign { path: String, holder: String },
    Range { var: String, path: String, body: Vec<Stmt> },
}

#[derive(Debug, Clone)]
enum Binding {
    Holder(Value),
    Location(Vec<Segment>),
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Counters collected while executing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub statements: usize,
    pub loop_iterations: usize,
}

/// Runs `code` with `root_var` bound to `instance`.
pub fn execute(code: &str, root_var: &str, instance: &mut Value) -> Result<Stats, String> {
    let program = parse(code)?;
    let mut machine = Machine {
        root: instance,
        scopes: vec![HashMap::from([(
            root_var.to_string(),
            Binding::Location(Vec::new()),
        )])],
        stats: Stats::default(),
    };
    machine.run(&program)?;
    Ok(machine.stats)
}

fn parse(code: &str) -> Result<Vec<Stmt>, String> {
    let mut lines = code.lines().map(str::trim).filter(|line| !line.is_empty());
    let block = parse_block(&mut lines)?;
    match lines.next() {
        None => Ok(block),
        Some(extra) => Err(format!("unbalanced braces near {extra:?}")),
    }
}

fn parse_block<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Vec<Stmt>, String> {
    let mut block = Vec::new();
    while let Some(line) = lines.next() {
        if line == "}" {
            return Ok(block);
        }
        if let Some(rest) = line.strip_prefix("var ") {
            let (name, literal) = rest
                .split_once(" = ")
                .ok_or_else(|| format!("malformed var: {line}"))?;
            let value = literal_value(literal).map_err(|err| err.to_string())?;
            block.push(Stmt::Var {
                name: name.to_string(),
                value,
            });
        } else if let Some(cond) = line.strip_prefix("if ").and_then(|l| l.strip_suffix(" {")) {
            let (path, negate) = if let Some(path) = cond.strip_suffix(" == nil") {
                (path, false)
            } else if let Some(path) = cond.strip_suffix(" != nil") {
                (path, true)
            } else {
                return Err(format!("unsupported condition: {line}"));
            };
            let body = parse_block(lines)?;
            block.push(Stmt::IfNil {
                path: path.to_string(),
                negate,
                body,
            });
        } else if let Some(rest) = line.strip_prefix("for _, ").and_then(|l| l.strip_suffix(" {")) {
            let (var, path) = rest
                .split_once(" := range ")
                .ok_or_else(|| format!("malformed range: {line}"))?;
            let body = parse_block(lines)?;
            block.push(Stmt::Range {
                var: var.to_string(),
                path: path.to_string(),
                body,
            });
        } else if let Some((path, holder)) = line.split_once(" = &") {
            block.push(Stmt::Assign {
                path: path.to_string(),
                holder: holder.to_string(),
            });
        } else {
            return Err(format!("unsupported statement: {line}"));
        }
    }
    Ok(block)
}

struct Machine<'a> {
    root: &'a mut Value,
    scopes: Vec<HashMap<String, Binding>>,
    stats: Stats,
}

impl Machine<'_> {
    fn run(&mut self, block: &[Stmt]) -> Result<(), String> {
        self.scopes.push(HashMap::new());
        let result = block.iter().try_for_each(|stmt| self.step(stmt));
        self.scopes.pop();
        result
    }

    fn step(&mut self, stmt: &Stmt) -> Result<(), String> {
        self.stats.statements += 1;
        match stmt {
            Stmt::Var { name, value } => {
                let scope = self.scopes.last_mut().ok_or("no scope")?;
                if scope.contains_key(name) {
                    return Err(format!("{name} redeclared in this block"));
                }
                scope.insert(name.clone(), Binding::Holder(value.clone()));
                Ok(())
            }
            Stmt::IfNil { path, negate, body } => {
                let is_nil = self.read(path)?.is_null();
                if is_nil != *negate {
                    self.run(body)?;
                }
                Ok(())
            }
            Stmt::Assign { path, holder } => {
                let value = match self.lookup(holder)? {
                    Binding::Holder(value) => value.clone(),
                    Binding::Location(_) => return Err(format!("{holder} is not a holder")),
                };
                self.write(path, value)
            }
            Stmt::Range { var, path, body } => {
                let (base, keys) = self.resolve(path)?;
                let len = match self.read(path)? {
                    Value::Null => 0,
                    Value::Array(items) => items.len(),
                    other => return Err(format!("cannot range over {other}")),
                };
                let mut location = base;
                location.extend(keys.into_iter().map(Segment::Key));
                for index in 0..len {
                    self.stats.loop_iterations += 1;
                    let mut element = location.clone();
                    element.push(Segment::Index(index));
                    self.scopes
                        .push(HashMap::from([(var.clone(), Binding::Location(element))]));
                    let result = self.run(body);
                    self.scopes.pop();
                    result?;
                }
                Ok(())
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&Binding, String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| format!("undefined: {name}"))
    }

    /// Splits `var.A.B` into the variable's location and the field keys.
    fn resolve(&self, path: &str) -> Result<(Vec<Segment>, Vec<String>), String> {
        let mut parts = path.split('.');
        let var = parts.next().unwrap_or_default();
        let base = match self.lookup(var)? {
            Binding::Location(location) => location.clone(),
            Binding::Holder(_) => return Err(format!("{var} is not addressable")),
        };
        Ok((base, parts.map(str::to_string).collect()))
    }

    fn read(&self, path: &str) -> Result<Value, String> {
        let (base, keys) = self.resolve(path)?;
        let mut node = locate(&*self.root, &base)?;
        for key in &keys {
            match node {
                Value::Object(map) => node = map.get(key).unwrap_or(&NULL),
                Value::Null => return Err(format!("nil pointer dereference reading {path}")),
                other => return Err(format!("{other} has no field {key}")),
            }
        }
        Ok(node.clone())
    }

    fn write(&mut self, path: &str, value: Value) -> Result<(), String> {
        let (base, keys) = self.resolve(path)?;
        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| format!("cannot assign to {path}"))?;
        let mut node = locate_mut(&mut *self.root, &base)?;
        for key in parents {
            node = match node {
                Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                _ => return Err(format!("nil pointer dereference writing {path}")),
            };
        }
        match node {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            _ => Err(format!("nil pointer dereference writing {path}")),
        }
    }
}

fn locate<'v>(root: &'v Value, location: &[Segment]) -> Result<&'v Value, String> {
    let mut node = root;
    for segment in location {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(key).unwrap_or(&NULL),
            (Segment::Index(index), Value::Array(items)) => {
                items.get(*index).ok_or("index out of range")?
            }
            _ => return Err("invalid location".to_string()),
        };
    }
    Ok(node)
}

fn locate_mut<'v>(root: &'v mut Value, location: &[Segment]) -> Result<&'v mut Value, String> {
    let mut node = root;
    for segment in location {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => {
                map.get_mut(key).ok_or("invalid location")?
            }
            (Segment::Index(index), Value::Array(items)) => {
                items.get_mut(*index).ok_or("index out of range")?
            }
            _ => return Err("invalid location".to_string()),
        };
    }
    Ok(node)
}
