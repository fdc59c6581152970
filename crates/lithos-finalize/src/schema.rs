// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Attribute trees handed over by the schema layer.
//!
//! Defaults live on the parent: an [`ObjectAttribute`] (or an
//! [`AliasAttribute`] wrapping one) maps field names to default values, and the
//! child attribute itself carries none. Fields are kept in a `BTreeMap`, so
//! every walk over them is in lexicographic order.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A node of the schema tree, serialized with a `"kind"` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    Primitive(PrimitiveAttribute),
    Object(ObjectAttribute),
    Array(ArrayAttribute),
    Alias(AliasAttribute),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Boolean,
    Integer,
    Number,
    String,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveAttribute {
    #[serde(rename = "type")]
    pub primitive: Primitive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttribute {
    #[serde(default)]
    pub fields: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayAttribute {
    pub elem: Box<Attribute>,
}

/// Named indirection, such as a user type or media type, over another
/// attribute. Defaults registered here take precedence over the target's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasAttribute {
    pub name: String,
    pub target: Box<Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, Value>,
}

impl Attribute {
    pub fn primitive(primitive: Primitive) -> Self {
        Attribute::Primitive(PrimitiveAttribute { primitive })
    }

    pub fn array(elem: impl Into<Attribute>) -> Self {
        Attribute::Array(ArrayAttribute {
            elem: Box::new(elem.into()),
        })
    }

    pub fn alias(name: impl Into<String>, target: impl Into<Attribute>) -> AliasAttribute {
        AliasAttribute {
            name: name.into(),
            target: Box::new(target.into()),
            defaults: BTreeMap::new(),
        }
    }

    /// Parses a JSON schema document.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Follows alias layers down to the first non-alias attribute.
    pub fn unwrap_alias(&self) -> &Attribute {
        let mut current = self;
        while let Attribute::Alias(alias) = current {
            current = &alias.target;
        }
        current
    }

    pub fn is_object(&self) -> bool {
        matches!(self.unwrap_alias(), Attribute::Object(_))
    }

    /// Default declared for field `name`, looked up on this attribute's
    /// registry and then on the registries of the attributes it aliases.
    pub fn default_for(&self, name: &str) -> Option<&Value> {
        match self {
            Attribute::Object(object) => object.defaults.get(name),
            Attribute::Alias(alias) => alias
                .defaults
                .get(name)
                .or_else(|| alias.target.default_for(name)),
            Attribute::Primitive(_) | Attribute::Array(_) => None,
        }
    }

    /// Every field name some reachable registry declares a default for.
    pub fn default_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        let mut current = self;
        loop {
            match current {
                Attribute::Object(object) => {
                    names.extend(object.defaults.keys().map(String::as_str));
                    return names;
                }
                Attribute::Alias(alias) => {
                    names.extend(alias.defaults.keys().map(String::as_str));
                    current = &alias.target;
                }
                Attribute::Primitive(_) | Attribute::Array(_) => return names,
            }
        }
    }
}

impl Primitive {
    /// Checks `value` against this primitive type and returns the value to
    /// emit. Integer defaults of a `Number` field are widened to floats.
    pub fn normalize_default(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Primitive::Boolean, Value::Bool(_)) | (Primitive::String, Value::String(_)) => {
                Some(value.clone())
            }
            (Primitive::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (Primitive::Number, Value::Number(n)) if n.is_f64() => Some(value.clone()),
            (Primitive::Number, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (Primitive::Any, Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
                Some(value.clone())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Boolean => "boolean",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Any => "any",
        };
        f.write_str(name)
    }
}

impl ObjectAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, attribute: impl Into<Attribute>) -> Self {
        self.fields.insert(name.into(), attribute.into());
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        attribute: impl Into<Attribute>,
        default: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        self.defaults.insert(name.clone(), default.into());
        self.fields.insert(name, attribute.into());
        self
    }
}

impl AliasAttribute {
    /// Registers a default for a field of the aliased object.
    pub fn with_default(mut self, field: impl Into<String>, default: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), default.into());
        self
    }
}

impl From<PrimitiveAttribute> for Attribute {
    fn from(value: PrimitiveAttribute) -> Self {
        Attribute::Primitive(value)
    }
}

impl From<Primitive> for Attribute {
    fn from(value: Primitive) -> Self {
        Attribute::primitive(value)
    }
}

impl From<ObjectAttribute> for Attribute {
    fn from(value: ObjectAttribute) -> Self {
        Attribute::Object(value)
    }
}

impl From<ArrayAttribute> for Attribute {
    fn from(value: ArrayAttribute) -> Self {
        Attribute::Array(value)
    }
}

impl From<AliasAttribute> for Attribute {
    fn from(value: AliasAttribute) -> Self {
        Attribute::Alias(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account() -> ObjectAttribute {
        ObjectAttribute::new()
            .field_with_default("plan", Primitive::String, "free")
            .field("name", Primitive::String)
    }

    #[test]
    fn unwrap_alias_follows_every_layer() {
        let inner = Attribute::alias("Inner", account());
        let outer: Attribute = Attribute::alias("Outer", inner).into();
        assert!(outer.is_object());
        assert!(matches!(outer.unwrap_alias(), Attribute::Object(_)));
        assert!(!Attribute::array(account()).is_object());
    }

    #[test]
    fn alias_defaults_take_precedence() {
        let alias: Attribute = Attribute::alias("Account", account())
            .with_default("plan", "pro")
            .into();
        assert_eq!(alias.default_for("plan"), Some(&json!("pro")));
        assert_eq!(alias.default_for("name"), None);

        let bare: Attribute = Attribute::alias("Account", account()).into();
        assert_eq!(bare.default_for("plan"), Some(&json!("free")));
    }

    #[test]
    fn default_names_collects_alias_chain() {
        let alias: Attribute = Attribute::alias("Account", account())
            .with_default("name", "anon")
            .into();
        let names: Vec<_> = alias.default_names().into_iter().collect();
        assert_eq!(names, vec!["name", "plan"]);
    }

    #[test]
    fn parses_tagged_json() {
        let attribute = Attribute::from_json_str(
            r#"{
                "kind": "object",
                "fields": {
                    "tags": {"kind": "array", "elem": {"kind": "primitive", "type": "string"}},
                    "count": {"kind": "primitive", "type": "integer"}
                },
                "defaults": {"count": 3}
            }"#,
        )
        .unwrap();
        let expected: Attribute = ObjectAttribute::new()
            .field("tags", Attribute::array(Primitive::String))
            .field_with_default("count", Primitive::Integer, 3)
            .into();
        assert_eq!(attribute, expected);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Attribute::from_json_str(r#"{"kind": "map"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn normalizes_defaults_per_primitive() {
        assert_eq!(
            Primitive::Number.normalize_default(&json!(3)),
            Some(json!(3.0))
        );
        assert_eq!(Primitive::Integer.normalize_default(&json!(3.5)), None);
        assert_eq!(Primitive::String.normalize_default(&json!(1)), None);
        assert_eq!(
            Primitive::Any.normalize_default(&json!(true)),
            Some(json!(true))
        );
        assert_eq!(Primitive::Any.normalize_default(&json!([1])), None);
    }
}
