//! Runtime values.
//!
//! Every variant is immutable once built. Compound values share their
//! contents through `Rc`, so "updates" such as `with`, `merge` or `append`
//! copy one level and keep sharing the untouched children.

use crate::env::{Env, ModuleId};
use crate::scheduler::FutureId;
use crate::stream::StreamValue;
use itertools::Itertools;
use rill_core::ast::FunctionDecl;
use rill_typing::builtins::BuiltinSig;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Bool(bool),
    Void,
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
    /// Unique elements in insertion order.
    Set(Rc<Vec<Value>>),
    Record(Rc<RecordValue>),
    Enum(Rc<EnumValue>),
    Tuple(Rc<Vec<Value>>),
    Option(Option<Rc<Value>>),
    Result(Result<Rc<Value>, Rc<Value>>),
    Future(FutureId),
    Stream(Rc<StreamValue>),
    Function(Rc<Callable>),
    /// Opaque handle returned by `train_model`.
    Model(Rc<serde_json::Value>),
    /// Opaque handle returned by `predict`.
    Prediction(Rc<serde_json::Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub name: String,
    /// Declaration order.
    pub fields: Vec<(String, Value)>,
}

impl RecordValue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub enum_name: String,
    pub variant: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: Env,
    pub module: ModuleId,
}

#[derive(Debug, Clone)]
pub enum Callable {
    Closure(Closure),
    Builtin(&'static BuiltinSig),
    /// A function together with its leading arguments.
    Partial { target: Value, args: Vec<Value> },
}

impl Callable {
    /// Number of arguments that saturate the call.
    pub fn arity(&self) -> usize {
        match self {
            Callable::Closure(closure) => closure.decl.arity(),
            Callable::Builtin(sig) => sig.min_args,
            Callable::Partial { target, args } => match target {
                Value::Function(inner) => inner.arity().saturating_sub(args.len()),
                _ => 0,
            },
        }
    }

    pub fn name(&self) -> String {
        match self {
            Callable::Closure(closure) => closure.decl.display_name().to_string(),
            Callable::Builtin(sig) => sig.name.to_string(),
            Callable::Partial { target, .. } => match target {
                Value::Function(inner) => inner.name(),
                other => other.type_name().to_string(),
            },
        }
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Value {
        Value::Map(Rc::new(entries))
    }

    /// Builds a set, dropping later duplicates. `1` and `1.0` are
    /// different members.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Value {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.iter().any(|member| member.same_member(&item)) {
                unique.push(item);
            }
        }
        Value::Set(Rc::new(unique))
    }

    /// Set membership: `==` without the Int/Float bridge.
    pub fn same_member(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self == other
    }

    pub fn some(value: Value) -> Value {
        Value::Option(Some(Rc::new(value)))
    }

    pub fn none() -> Value {
        Value::Option(None)
    }

    pub fn ok(value: Value) -> Value {
        Value::Result(Ok(Rc::new(value)))
    }

    pub fn err(value: Value) -> Value {
        Value::Result(Err(Rc::new(value)))
    }

    pub fn function(callable: Callable) -> Value {
        Value::Function(Rc::new(callable))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bool(_) => "Bool",
            Value::Void => "Void",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Record(_) => "Record",
            Value::Enum(_) => "Enum",
            Value::Tuple(_) => "Tuple",
            Value::Option(_) => "Option",
            Value::Result(_) => "Result",
            Value::Future(_) => "Future",
            Value::Stream(_) => "Stream",
            Value::Function(_) => "Function",
            Value::Model(_) => "Model",
            Value::Prediction(_) => "Prediction",
        }
    }

    /// Display form with strings quoted, as they appear inside
    /// collections.
    pub fn repr(&self) -> String {
        Nested(self).to_string()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value holds only data, so it can key the memo cache
    /// or cross the service gateway.
    pub fn is_plain_data(&self) -> bool {
        match self {
            Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Bool(_)
            | Value::Void => true,
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                items.iter().all(Value::is_plain_data)
            }
            Value::Map(entries) => entries.values().all(Value::is_plain_data),
            Value::Record(record) => record.fields.iter().all(|(_, v)| v.is_plain_data()),
            Value::Enum(value) => value.payload.as_ref().map_or(true, Value::is_plain_data),
            Value::Option(inner) => inner.as_deref().map_or(true, Value::is_plain_data),
            Value::Result(Ok(inner) | Err(inner)) => inner.is_plain_data(),
            Value::Future(_)
            | Value::Stream(_)
            | Value::Function(_)
            | Value::Model(_)
            | Value::Prediction(_) => false,
        }
    }

    /// JSON form used by the service gateway.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.to_string()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Void | Value::Option(None) => Json::Null,
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Record(record) => Json::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Enum(value) => serde_json::json!({
                "enum": value.enum_name,
                "variant": value.variant,
                "payload": value.payload.as_ref().map_or(Json::Null, Value::to_json),
            }),
            Value::Option(Some(inner)) => inner.to_json(),
            Value::Result(Ok(inner)) => serde_json::json!({ "ok": inner.to_json() }),
            Value::Result(Err(inner)) => serde_json::json!({ "err": inner.to_json() }),
            Value::Model(json) | Value::Prediction(json) => (**json).clone(),
            Value::Future(_) | Value::Stream(_) | Value::Function(_) => {
                Json::String(self.to_string())
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Void,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::string(s),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            Json::Object(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.iter().any(|m| m.same_member(item)))
            }
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Option(a), Value::Option(b)) => a == b,
            (Value::Result(a), Value::Result(b)) => a == b,
            (Value::Future(a), Value::Future(b)) => a == b,
            (Value::Stream(a), Value::Stream(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Model(a), Value::Model(b))
            | (Value::Prediction(a), Value::Prediction(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

/// Renders nested values, quoting strings.
struct Nested<'a>(&'a Value);

impl Display for Nested<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "{:?}", &**s),
            other => write!(f, "{other}"),
        }
    }
}

impl Display for Value {
    /// Top-level strings print without quotes, as `log` shows them.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Void => f.write_str("()"),
            Value::List(items) => write!(f, "[{}]", items.iter().map(Nested).join(", ")),
            Value::Set(items) => write!(f, "set([{}])", items.iter().map(Nested).join(", ")),
            Value::Tuple(items) => write!(f, "({})", items.iter().map(Nested).join(", ")),
            Value::Map(entries) if entries.is_empty() => f.write_str("{}"),
            Value::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", Nested(v)))
                    .join(", ")
            ),
            Value::Record(record) => write!(
                f,
                "{} {{ {} }}",
                record.name,
                record
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", Nested(v)))
                    .join(", ")
            ),
            Value::Enum(value) => match &value.payload {
                Some(Value::Tuple(items)) => write!(
                    f,
                    "{}::{}({})",
                    value.enum_name,
                    value.variant,
                    items.iter().map(Nested).join(", ")
                ),
                Some(payload) => write!(
                    f,
                    "{}::{}({})",
                    value.enum_name,
                    value.variant,
                    Nested(payload)
                ),
                None => write!(f, "{}::{}", value.enum_name, value.variant),
            },
            Value::Option(Some(inner)) => write!(f, "Some({})", Nested(inner)),
            Value::Option(None) => f.write_str("None"),
            Value::Result(Ok(inner)) => write!(f, "Ok({})", Nested(inner)),
            Value::Result(Err(inner)) => write!(f, "Err({})", Nested(inner)),
            Value::Future(id) => write!(f, "<future {}>", id.0),
            Value::Stream(_) => f.write_str("<stream>"),
            Value::Function(callable) => write!(f, "<fn {}>", callable.name()),
            Value::Model(json) => write!(f, "<model {json}>"),
            Value::Prediction(json) => write!(f, "<prediction {json}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::string("2"));
    }

    #[test]
    fn sets_ignore_order_and_duplicates() {
        let a = Value::set(vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        let b = Value::set(vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "set([1, 2])");
    }

    #[test]
    fn sets_keep_int_and_float_apart() {
        let mixed = Value::set(vec![Value::Int(1), Value::Float(1.0)]);
        assert_eq!(mixed.to_string(), "set([1, 1.0])");
        assert_ne!(Value::set(vec![Value::Int(1)]), Value::set(vec![Value::Float(1.0)]));
    }

    #[test]
    fn display_quotes_only_nested_strings() {
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(
            Value::list(vec![Value::string("a"), Value::Float(1.5)]).to_string(),
            "[\"a\", 1.5]"
        );
        assert_eq!(Value::some(Value::string("x")).to_string(), "Some(\"x\")");
    }

    #[test]
    fn json_keeps_integers_integral() {
        let json = serde_json::json!({"n": 3, "f": 0.5, "tags": ["a"]});
        let value = Value::from_json(&json);
        let Value::Map(entries) = &value else {
            panic!("expected a map, got {value}");
        };
        assert_eq!(entries.get("n"), Some(&Value::Int(3)));
        assert_eq!(entries.get("f"), Some(&Value::Float(0.5)));
        assert_eq!(value.to_json(), json);
    }
}
