use crate::value::Value;
use rill_core::ast::FunctionId;
use std::collections::HashMap;

fn keys(items: &[Value]) -> Option<Vec<MemoKey>> {
    items.iter().map(MemoKey::from_value).collect()
}

/// Hashable image of a plain data value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoKey {
    Int(i64),
    /// Bit pattern of the float.
    Float(u64),
    String(String),
    Bool(bool),
    Void,
    List(Vec<MemoKey>),
    Set(Vec<MemoKey>),
    Tuple(Vec<MemoKey>),
    Map(Vec<(String, MemoKey)>),
    Record(String, Vec<(String, MemoKey)>),
    Enum(String, String, Option<Box<MemoKey>>),
    Option(Option<Box<MemoKey>>),
    Ok(Box<MemoKey>),
    Err(Box<MemoKey>),
}

impl MemoKey {
    /// `None` when the value holds anything besides data.
    pub fn from_value(value: &Value) -> Option<MemoKey> {
        Some(match value {
            Value::Int(v) => MemoKey::Int(*v),
            Value::Float(v) => MemoKey::Float(v.to_bits()),
            Value::String(s) => MemoKey::String(s.to_string()),
            Value::Bool(b) => MemoKey::Bool(*b),
            Value::Void => MemoKey::Void,
            Value::List(items) => MemoKey::List(keys(items)?),
            Value::Set(items) => MemoKey::Set(keys(items)?),
            Value::Tuple(items) => MemoKey::Tuple(keys(items)?),
            Value::Map(entries) => MemoKey::Map(
                entries
                    .iter()
                    .map(|(k, v)| Some((k.clone(), MemoKey::from_value(v)?)))
                    .collect::<Option<_>>()?,
            ),
            Value::Record(record) => MemoKey::Record(
                record.name.clone(),
                record
                    .fields
                    .iter()
                    .map(|(k, v)| Some((k.clone(), MemoKey::from_value(v)?)))
                    .collect::<Option<_>>()?,
            ),
            Value::Enum(value) => MemoKey::Enum(
                value.enum_name.clone(),
                value.variant.clone(),
                match &value.payload {
                    Some(payload) => Some(Box::new(MemoKey::from_value(payload)?)),
                    None => None,
                },
            ),
            Value::Option(inner) => MemoKey::Option(match inner {
                Some(inner) => Some(Box::new(MemoKey::from_value(inner)?)),
                None => None,
            }),
            Value::Result(Ok(inner)) => MemoKey::Ok(Box::new(MemoKey::from_value(inner)?)),
            Value::Result(Err(inner)) => MemoKey::Err(Box::new(MemoKey::from_value(inner)?)),
            Value::Future(_)
            | Value::Stream(_)
            | Value::Function(_)
            | Value::Model(_)
            | Value::Prediction(_) => return None,
        })
    }
}

/// Results of pure function calls, keyed by function identity and
/// argument values. Owned by one interpreter; never shared between runs.
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: HashMap<(FunctionId, Vec<MemoKey>), Value>,
    hits: usize,
    misses: usize,
}

impl MemoCache {
    pub fn key(function: FunctionId, args: &[Value]) -> Option<(FunctionId, Vec<MemoKey>)> {
        Some((function, keys(args)?))
    }

    pub fn get(&mut self, key: &(FunctionId, Vec<MemoKey>)) -> Option<Value> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: (FunctionId, Vec<MemoKey>), value: Value) {
        self.entries.insert(key, value);
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;
    use rill_typing::builtins;

    #[test]
    fn functions_never_form_keys() {
        let len = builtins::lookup("len").expect("len");
        let f = Value::function(Callable::Builtin(len));
        assert!(MemoCache::key(FunctionId(1), &[Value::Int(1), f]).is_none());
        assert!(MemoCache::key(FunctionId(1), &[Value::list(vec![Value::string("a")])]).is_some());
    }

    #[test]
    fn hits_are_counted() {
        let mut cache = MemoCache::default();
        let key = MemoCache::key(FunctionId(7), &[Value::Int(3)]).expect("data");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), Value::Int(9));
        assert_eq!(cache.get(&key), Some(Value::Int(9)));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }
}
