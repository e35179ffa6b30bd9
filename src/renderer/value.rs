//! Values that templates are executed against

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::types::{TypeError, TypeIdentity, TypeRegistry};

/// JSON member naming the type of the object that contains it
pub const TYPE_TAG: &str = "$type";

/// A template context value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Object(Object),
}

/// Named fields, optionally tagged with the runtime type they came from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    identity: Option<TypeIdentity>,
    fields: BTreeMap<String, Value>,
}

impl Object {
    /// An untyped object with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// An object of type `identity` with no fields
    pub fn typed(identity: TypeIdentity) -> Self {
        Self {
            identity: Some(identity),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field, builder style
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn identity(&self) -> Option<&TypeIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: TypeIdentity) {
        self.identity = Some(identity);
    }

    /// Field by name; an exact match wins, otherwise ASCII case is ignored
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    /// Build a context from anything serde can serialize
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(value).map(Value::from)
    }

    /// Convert JSON, turning `"$type"` members into object identities
    pub fn from_json_typed(
        json: serde_json::Value,
        registry: &TypeRegistry,
    ) -> Result<Value, TypeError> {
        Ok(match json {
            serde_json::Value::Object(map) => {
                let mut object = Object::new();
                for (key, value) in map {
                    if key == TYPE_TAG {
                        if let serde_json::Value::String(name) = &value {
                            object.identity = Some(registry.require(name)?);
                            continue;
                        }
                    }
                    object
                        .fields
                        .insert(key, Self::from_json_typed(value, registry)?);
                }
                Value::Object(object)
            }
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| Self::from_json_typed(item, registry))
                    .collect::<Result<_, _>>()?,
            ),
            scalar => Value::from(scalar),
        })
    }

    /// Only `nil` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Nil, empty strings, empty lists and empty objects
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Object(object) => object.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Length of strings (in characters), lists and objects
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Object(object) => Some(object.len()),
            _ => None,
        }
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Equality that treats ints and floats as numbers
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Ordering for numbers and strings; anything else is unordered
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// Member access by name, including `size`, `first` and `last`
    pub(crate) fn member(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Value::Object(object) = self {
            if let Some(value) = object.get(name) {
                return Some(Cow::Borrowed(value));
            }
        }
        match (self, name) {
            (Value::List(items), "first") => items.first().map(Cow::Borrowed),
            (Value::List(items), "last") => items.last().map(Cow::Borrowed),
            (_, "size") => self
                .size()
                .map(|n| Cow::Owned(Value::Int(n as i64))),
            _ => None,
        }
    }

    /// List element by position; negative positions count from the end
    pub(crate) fn index(&self, position: i64) -> Option<&Value> {
        let Value::List(items) = self else {
            return None;
        };
        let position = if position < 0 {
            items.len().checked_sub(position.unsigned_abs() as usize)?
        } else {
            position as usize
        };
        items.get(position)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::List(items) => items.iter().try_for_each(|item| write!(f, "{}", item)),
            Value::Object(object) => write!(f, "{}", object),
        }
    }
}

impl fmt::Display for Object {
    /// Typed objects print their type name; untyped ones their fields
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(identity) = &self.identity {
            return write!(f, "{}", identity);
        }
        let fields = self
            .fields()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>();
        write!(f, "{{{}}}", fields.join(", "))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(Object {
                identity: None,
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}
