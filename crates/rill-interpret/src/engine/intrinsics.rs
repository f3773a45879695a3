use super::*;
use crate::stream::{Source, Stage, StreamValue};
use itertools::Itertools;
use rill_typing::builtins::BuiltinSig;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Either side of a sequence builtin: eager items or a lazy stream.
enum Sequence {
    Items(Rc<Vec<Value>>),
    Stream(Rc<StreamValue>),
}

fn sequence(name: &str, value: Value) -> EvalResult<Sequence> {
    match value {
        Value::List(items) | Value::Set(items) => Ok(Sequence::Items(items)),
        Value::Stream(stream) => Ok(Sequence::Stream(stream)),
        other => rt_bail!("'{name}' expects a List, Set or Stream, found {}", other.type_name()),
    }
}

fn int_arg(name: &str, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        other => rt_bail!("'{name}' expects an Int, found {}", other.type_name()),
    }
}

fn count_arg(name: &str, value: &Value) -> EvalResult<usize> {
    let count = int_arg(name, value)?;
    match usize::try_from(count) {
        Ok(count) => Ok(count),
        Err(_) => rt_bail!("'{name}' expects a non-negative count, found {count}"),
    }
}

fn str_arg<'a>(name: &str, value: &'a Value) -> EvalResult<&'a str> {
    match value {
        Value::String(s) => Ok(&**s),
        other => rt_bail!("'{name}' expects a String, found {}", other.type_name()),
    }
}

fn list_arg(name: &str, value: &Value) -> EvalResult<Rc<Vec<Value>>> {
    match value {
        Value::List(items) | Value::Set(items) => Ok(items.clone()),
        other => rt_bail!("'{name}' expects a List, found {}", other.type_name()),
    }
}

fn map_arg(name: &str, value: &Value) -> EvalResult<Rc<BTreeMap<String, Value>>> {
    match value {
        Value::Map(entries) => Ok(entries.clone()),
        other => rt_bail!("'{name}' expects a Map, found {}", other.type_name()),
    }
}

fn future_arg(name: &str, value: &Value) -> EvalResult<FutureId> {
    match value {
        Value::Future(id) => Ok(*id),
        other => rt_bail!("'{name}' expects a Future, found {}", other.type_name()),
    }
}

fn number_arg(name: &str, value: &Value) -> EvalResult<f64> {
    match value.as_f64() {
        Some(v) => Ok(v),
        None => rt_bail!("'{name}' expects a number, found {}", value.type_name()),
    }
}

fn stream(source: Source) -> Value {
    Value::Stream(Rc::new(StreamValue::new(source)))
}

fn staged(stream: &StreamValue, stage: Stage) -> Value {
    Value::Stream(Rc::new(stream.with_stage(stage)))
}

fn float_to_int(name: &str, value: f64) -> EvalResult<Value> {
    if value.is_finite() && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Ok(Value::Int(value as i64))
    } else {
        rt_bail!("'{name}' cannot convert {value} to Int")
    }
}

impl Interpreter {
    /// Runs a builtin on arguments whose count already fits its
    /// signature.
    pub(super) fn call_builtin(
        &mut self,
        sig: &'static BuiltinSig,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let name = sig.name;
        if let Ok(op) = ServiceOp::from_str(name) {
            return self.call_service(op, args);
        }
        if name == "log" {
            self.builtin_log(args)?;
            return Ok(Value::Void);
        }
        let mut args = args.into_iter();
        let mut arg = || args.next().unwrap_or(Value::Void);
        match name {
            "map" | "filter" | "flat_map" | "take" | "skip" | "reduce" | "collect" | "chunk"
            | "count"
            | "first" | "for_each" | "sum" => {
                let seq = sequence(name, arg())?;
                let rest = std::iter::from_fn(|| Some(arg()))
                    .take(sig.min_args - 1)
                    .collect::<Vec<_>>();
                self.call_sequence(name, seq, rest)
            }

            "stream_of" => Ok(stream(Source::List(list_arg(name, &arg())?))),
            "stream_range" => {
                let start = int_arg(name, &arg())?;
                let end = int_arg(name, &arg())?;
                let step = match arg() {
                    Value::Void => 1,
                    step => int_arg(name, &step)?,
                };
                rt_ensure!(step != 0, "'stream_range' step must not be zero");
                Ok(stream(Source::Range { start, end, step }))
            }
            "stream_generate" => {
                let count = int_arg(name, &arg())?;
                Ok(stream(Source::Generate {
                    count,
                    generator: arg(),
                }))
            }
            "generate_infinite" => Ok(stream(Source::Infinite { generator: arg() })),
            "stream_empty" => Ok(stream(Source::Empty)),

            "len" => match arg() {
                Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                    Ok(Value::Int(items.len() as i64))
                }
                Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => rt_bail!(
                    "'len' expects a collection or String, found {}",
                    other.type_name()
                ),
            },
            "append" => {
                let list = list_arg(name, &arg())?;
                let mut items = (*list).clone();
                items.push(arg());
                Ok(Value::list(items))
            }
            "concat" => match (arg(), arg()) {
                (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
                (a, b) => {
                    let mut items = (*list_arg(name, &a)?).clone();
                    items.extend(list_arg(name, &b)?.iter().cloned());
                    Ok(Value::list(items))
                }
            },
            "head" => Ok(match list_arg(name, &arg())?.first() {
                Some(item) => Value::some(item.clone()),
                None => Value::none(),
            }),
            "tail" => {
                let list = list_arg(name, &arg())?;
                Ok(Value::list(list.iter().skip(1).cloned().collect()))
            }
            "nth" => {
                let list = list_arg(name, &arg())?;
                let index = int_arg(name, &arg())?;
                Ok(match usize::try_from(index).ok().and_then(|i| list.get(i)) {
                    Some(item) => Value::some(item.clone()),
                    None => Value::none(),
                })
            }
            "reverse" => match arg() {
                Value::String(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
                other => Ok(Value::list(list_arg(name, &other)?.iter().rev().cloned().collect())),
            },
            "range" => {
                let start = int_arg(name, &arg())?;
                let end = int_arg(name, &arg())?;
                Ok(Value::list((start..end).map(Value::Int).collect()))
            }
            "contains" => match (arg(), arg()) {
                (Value::String(s), Value::String(needle)) => Ok(Value::Bool(s.contains(&*needle))),
                (Value::Map(entries), Value::String(key)) => {
                    Ok(Value::Bool(entries.contains_key(&*key)))
                }
                (Value::List(items), needle) => Ok(Value::Bool(items.contains(&needle))),
                (Value::Set(items), needle) => {
                    Ok(Value::Bool(items.iter().any(|item| item.same_member(&needle))))
                }
                (other, _) => rt_bail!(
                    "'contains' expects a collection or String, found {}",
                    other.type_name()
                ),
            },

            "merge" => {
                let left = map_arg(name, &arg())?;
                let right = map_arg(name, &arg())?;
                let mut merged = (*left).clone();
                merged.extend(right.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Value::map(merged))
            }
            "get" => {
                let map = map_arg(name, &arg())?;
                let key = arg();
                Ok(match map.get(str_arg(name, &key)?) {
                    Some(value) => Value::some(value.clone()),
                    None => Value::none(),
                })
            }
            "put" => {
                let mut map = (*map_arg(name, &arg())?).clone();
                let key = arg();
                map.insert(str_arg(name, &key)?.to_string(), arg());
                Ok(Value::map(map))
            }
            "remove" => {
                let mut map = (*map_arg(name, &arg())?).clone();
                let key = arg();
                map.remove(str_arg(name, &key)?);
                Ok(Value::map(map))
            }
            "keys" => Ok(Value::list(
                map_arg(name, &arg())?.keys().map(Value::string).collect(),
            )),
            "values" => Ok(Value::list(map_arg(name, &arg())?.values().cloned().collect())),
            "has_key" => {
                let map = map_arg(name, &arg())?;
                let key = arg();
                Ok(Value::Bool(map.contains_key(str_arg(name, &key)?)))
            }

            "set" => Ok(Value::set(list_arg(name, &arg())?.iter().cloned())),
            "insert" => {
                let set = list_arg(name, &arg())?;
                Ok(Value::set(set.iter().cloned().chain(std::iter::once(arg()))))
            }
            "union" => {
                let left = list_arg(name, &arg())?;
                let right = list_arg(name, &arg())?;
                Ok(Value::set(left.iter().chain(right.iter()).cloned()))
            }

            "some" | "Some" => Ok(Value::some(arg())),
            "none" => Ok(Value::none()),
            "ok" | "Ok" => Ok(Value::ok(arg())),
            "err" | "Err" => Ok(Value::err(arg())),
            "unwrap" => match arg() {
                Value::Option(Some(inner)) | Value::Result(Ok(inner)) => Ok((*inner).clone()),
                Value::Option(None) => rt_bail!("unwrap called on None"),
                Value::Result(Err(error)) => rt_bail!("unwrap called on Err({})", error.repr()),
                other => rt_bail!(
                    "'unwrap' expects an Option or Result, found {}",
                    other.type_name()
                ),
            },
            "unwrap_or" => {
                let value = arg();
                let fallback = arg();
                match value {
                    Value::Option(Some(inner)) | Value::Result(Ok(inner)) => Ok((*inner).clone()),
                    Value::Option(None) | Value::Result(Err(_)) => Ok(fallback),
                    other => rt_bail!(
                        "'unwrap_or' expects an Option or Result, found {}",
                        other.type_name()
                    ),
                }
            }
            "is_some" | "is_none" => match arg() {
                Value::Option(inner) => Ok(Value::Bool(inner.is_some() == (name == "is_some"))),
                other => rt_bail!("'{name}' expects an Option, found {}", other.type_name()),
            },
            "is_ok" | "is_err" => match arg() {
                Value::Result(inner) => Ok(Value::Bool(inner.is_ok() == (name == "is_ok"))),
                other => rt_bail!("'{name}' expects a Result, found {}", other.type_name()),
            },

            "to_string" => Ok(Value::string(arg().to_string())),
            "upper" => Ok(Value::string(str_arg(name, &arg())?.to_uppercase())),
            "lower" => Ok(Value::string(str_arg(name, &arg())?.to_lowercase())),
            "split" => {
                let text = arg();
                let sep = arg();
                let (text, sep) = (str_arg(name, &text)?, str_arg(name, &sep)?);
                let parts: Vec<Value> = if sep.is_empty() {
                    text.chars().map(|c| Value::string(c.to_string())).collect()
                } else {
                    text.split(sep).map(Value::string).collect()
                };
                Ok(Value::list(parts))
            }
            "join" => {
                let items = list_arg(name, &arg())?;
                let sep = arg();
                Ok(Value::string(items.iter().join(str_arg(name, &sep)?)))
            }
            "abs" => match arg() {
                Value::Int(v) => match v.checked_abs() {
                    Some(v) => Ok(Value::Int(v)),
                    None => rt_bail!("integer overflow"),
                },
                Value::Float(v) => Ok(Value::Float(v.abs())),
                other => rt_bail!("'abs' expects a number, found {}", other.type_name()),
            },
            "min" | "max" => {
                let (a, b) = (arg(), arg());
                let take_first = match (&a, &b) {
                    (Value::Int(x), Value::Int(y)) => (x <= y) == (name == "min"),
                    (Value::String(x), Value::String(y)) => (x <= y) == (name == "min"),
                    _ => (number_arg(name, &a)? <= number_arg(name, &b)?) == (name == "min"),
                };
                Ok(if take_first { a } else { b })
            }
            "sqrt" => {
                let v = number_arg(name, &arg())?;
                rt_ensure!(v >= 0.0, "'sqrt' of a negative number");
                Ok(Value::Float(v.sqrt()))
            }
            "floor" => match arg() {
                Value::Int(v) => Ok(Value::Int(v)),
                other => float_to_int(name, number_arg(name, &other)?.floor()),
            },
            "to_float" => match arg() {
                Value::String(s) => match s.trim().parse::<f64>() {
                    Ok(v) => Ok(Value::Float(v)),
                    Err(_) => rt_bail!("cannot convert '{s}' to Float"),
                },
                other => Ok(Value::Float(number_arg(name, &other)?)),
            },
            "to_int" => match arg() {
                Value::Int(v) => Ok(Value::Int(v)),
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(v) => Ok(Value::Int(v)),
                    Err(_) => rt_bail!("cannot convert '{s}' to Int"),
                },
                other => float_to_int(name, number_arg(name, &other)?.trunc()),
            },

            "on_error" | "on_complete_future" | "then" => {
                let source = future_arg(name, &arg())?;
                let handler = arg();
                let combinator = match name {
                    "on_error" => Combinator::OnError { source, handler },
                    "then" => Combinator::Then { source, handler },
                    _ => Combinator::OnComplete { source, handler },
                };
                Ok(Value::Future(self.spawn_combinator(combinator)))
            }
            "all" => {
                let sources = list_arg(name, &arg())?
                    .iter()
                    .map(|item| future_arg(name, item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Future(self.spawn_combinator(Combinator::All {
                    sources,
                    values: Vec::new(),
                })))
            }
            "resolved" => {
                let future = self.scheduler.futures.create();
                self.scheduler.resolve(future, arg());
                Ok(Value::Future(future))
            }
            "failed" => {
                let future = self.scheduler.futures.create();
                let failure = Failure {
                    error: arg(),
                    line: self.line,
                };
                self.scheduler.reject(future, failure);
                Ok(Value::Future(future))
            }
            "future_state" => {
                let future = future_arg(name, &arg())?;
                match self.scheduler.futures.state(future) {
                    Some(state) => Ok(Value::string(state.label())),
                    None => rt_bail!("unknown future"),
                }
            }

            other => rt_bail!("builtin '{other}' is not available"),
        }
    }

    fn call_sequence(&mut self, name: &str, seq: Sequence, rest: Vec<Value>) -> EvalResult<Value> {
        let mut rest = rest.into_iter();
        let mut arg = || rest.next().unwrap_or(Value::Void);
        let stream = match seq {
            Sequence::Stream(stream) => stream,
            Sequence::Items(items) => return self.call_list(name, items, arg),
        };
        match name {
            "map" => Ok(staged(&stream, Stage::Map(arg()))),
            "filter" => Ok(staged(&stream, Stage::Filter(arg()))),
            "flat_map" => Ok(staged(&stream, Stage::FlatMap(arg()))),
            "take" => Ok(staged(&stream, Stage::Take(count_arg(name, &arg())?))),
            "skip" => Ok(staged(&stream, Stage::Skip(count_arg(name, &arg())?))),
            "first" => {
                let mut cursor = stream.cursor();
                Ok(match cursor.next(self)? {
                    Some(value) => Value::some(value),
                    None => Value::none(),
                })
            }
            "reduce" | "for_each" | "count" => {
                let mut cursor = stream.bounded_cursor(name)?;
                match name {
                    "reduce" => {
                        let mut acc = arg();
                        let f = arg();
                        while let Some(item) = cursor.next(self)? {
                            acc = self.call_value(f.clone(), vec![acc, item])?;
                        }
                        Ok(acc)
                    }
                    "for_each" => {
                        let f = arg();
                        while let Some(item) = cursor.next(self)? {
                            self.call_value(f.clone(), vec![item])?;
                        }
                        Ok(Value::Void)
                    }
                    _ => {
                        let mut count = 0;
                        while cursor.next(self)?.is_some() {
                            count += 1;
                        }
                        Ok(Value::Int(count))
                    }
                }
            }
            _ => {
                let items = stream.drain(name, self)?;
                self.call_list(name, Rc::new(items), arg)
            }
        }
    }

    /// Eager form of the sequence builtins.
    fn call_list(
        &mut self,
        name: &str,
        items: Rc<Vec<Value>>,
        mut arg: impl FnMut() -> Value,
    ) -> EvalResult<Value> {
        match name {
            "map" => {
                let f = arg();
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(self.call_value(f.clone(), vec![item.clone()])?);
                }
                Ok(Value::list(out))
            }
            "filter" => {
                let f = arg();
                let mut out = Vec::new();
                for item in items.iter() {
                    match self.call_value(f.clone(), vec![item.clone()])? {
                        Value::Bool(true) => out.push(item.clone()),
                        Value::Bool(false) => {}
                        other => rt_bail!(
                            "filter predicate must return Bool, found {}",
                            other.type_name()
                        ),
                    }
                }
                Ok(Value::list(out))
            }
            "flat_map" => {
                let f = arg();
                let mut out = Vec::new();
                for item in items.iter() {
                    match self.call_value(f.clone(), vec![item.clone()])? {
                        Value::List(inner) | Value::Set(inner) => out.extend(inner.iter().cloned()),
                        Value::Stream(inner) => out.extend(inner.drain("flat_map", self)?),
                        other => rt_bail!(
                            "flat_map callback must return a List or Stream, found {}",
                            other.type_name()
                        ),
                    }
                }
                Ok(Value::list(out))
            }
            "take" => {
                let n = count_arg(name, &arg())?;
                Ok(Value::list(items.iter().take(n).cloned().collect()))
            }
            "skip" => {
                let n = count_arg(name, &arg())?;
                Ok(Value::list(items.iter().skip(n).cloned().collect()))
            }
            "reduce" => {
                let mut acc = arg();
                let f = arg();
                for item in items.iter() {
                    acc = self.call_value(f.clone(), vec![acc, item.clone()])?;
                }
                Ok(acc)
            }
            "collect" => Ok(Value::List(items)),
            "chunk" => {
                let size = count_arg(name, &arg())?;
                rt_ensure!(size > 0, "'chunk' size must be positive");
                Ok(Value::list(
                    items.chunks(size).map(|chunk| Value::list(chunk.to_vec())).collect(),
                ))
            }
            "count" => Ok(Value::Int(items.len() as i64)),
            "first" => Ok(match items.first() {
                Some(item) => Value::some(item.clone()),
                None => Value::none(),
            }),
            "for_each" => {
                let f = arg();
                for item in items.iter() {
                    self.call_value(f.clone(), vec![item.clone()])?;
                }
                Ok(Value::Void)
            }
            "sum" => sum(&items),
            other => rt_bail!("'{other}' is not a sequence operation"),
        }
    }

    /// `log(stream)` writes one line per element; anything else writes its
    /// arguments on one line separated by spaces.
    fn builtin_log(&mut self, args: Vec<Value>) -> EvalResult<()> {
        if let [Value::Stream(stream)] = args.as_slice() {
            let stream = stream.clone();
            let mut cursor = stream.bounded_cursor("log")?;
            while let Some(item) = cursor.next(self)? {
                self.write_log(item.to_string());
            }
            return Ok(());
        }
        self.write_log(args.iter().join(" "));
        Ok(())
    }

    fn call_service(&mut self, op: ServiceOp, args: Vec<Value>) -> EvalResult<Value> {
        let mut payload = Vec::with_capacity(args.len());
        for arg in args {
            let arg = match arg {
                Value::Stream(stream) => Value::list(stream.drain(&op.to_string(), self)?),
                other => other,
            };
            payload.push(arg.to_json());
        }
        Ok(Value::Future(self.dispatch_service(op, payload)?))
    }
}

fn sum(items: &[Value]) -> EvalResult<Value> {
    if items.iter().all(|item| matches!(item, Value::Int(_))) {
        let mut total: i64 = 0;
        for item in items {
            if let Value::Int(v) = item {
                total = match total.checked_add(*v) {
                    Some(total) => total,
                    None => rt_bail!("integer overflow"),
                };
            }
        }
        return Ok(Value::Int(total));
    }
    let mut total = 0.0;
    for item in items {
        total += number_arg("sum", item)?;
    }
    Ok(Value::Float(total))
}
