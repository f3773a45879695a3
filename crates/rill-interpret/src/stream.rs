//! Lazy streams with single-pass operator fusion.
//!
//! A stream is a source plus an ordered list of pending stages. Adding a
//! stage never touches the source; nothing is evaluated until a terminal
//! operation pulls through a [`Cursor`]. Each pull walks the stage chain
//! once for one element, stopping at the first filter that rejects it.

use crate::error::{runtime_error, EvalResult, Unwind};
use crate::value::Value;
use std::rc::Rc;

/// Calls user or builtin functions on behalf of stream stages.
pub trait Apply {
    fn apply(&mut self, function: &Value, args: Vec<Value>) -> EvalResult<Value>;
}

#[derive(Debug, Clone)]
pub enum Source {
    List(Rc<Vec<Value>>),
    /// Half-open, `step` is never zero.
    Range { start: i64, end: i64, step: i64 },
    /// `generator(i)` for `i` in `0..count`.
    Generate { count: i64, generator: Value },
    /// `generator(i)` for every `i` from zero on.
    Infinite { generator: Value },
    Empty,
}

impl Source {
    pub fn is_finite(&self) -> bool {
        !matches!(self, Source::Infinite { .. })
    }
}

#[derive(Debug, Clone)]
pub enum Stage {
    Map(Value),
    Filter(Value),
    FlatMap(Value),
    Take(usize),
    Skip(usize),
}

#[derive(Debug, Clone)]
pub struct StreamValue {
    pub source: Source,
    pub stages: Vec<Stage>,
}

impl StreamValue {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            stages: Vec::new(),
        }
    }

    /// A new stream with `stage` appended; `self` is left as it was.
    pub fn with_stage(&self, stage: Stage) -> StreamValue {
        let mut stages = self.stages.clone();
        stages.push(stage);
        StreamValue {
            source: self.source.clone(),
            stages,
        }
    }

    /// Pipeline shape check: a finite source, or a `take` somewhere after
    /// an unbounded one.
    pub fn is_bounded(&self) -> bool {
        self.source.is_finite() || self.stages.iter().any(|stage| matches!(stage, Stage::Take(_)))
    }

    /// Cursor for consumers that stop on their own, such as `first`.
    pub fn cursor(&self) -> Cursor {
        self.build_cursor(None)
    }

    /// Cursor for terminals that pull until the end. Besides the shape
    /// check, every `flat_map` with no `take` after it refuses inner
    /// streams that are themselves unbounded.
    pub fn bounded_cursor(&self, terminal: &str) -> EvalResult<Cursor> {
        self.ensure_bounded(terminal)?;
        Ok(self.build_cursor(Some(Rc::from(terminal))))
    }

    fn build_cursor(&self, terminal: Option<Rc<str>>) -> Cursor {
        let stages = self
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                let capped = self.stages[index + 1..]
                    .iter()
                    .any(|later| matches!(later, Stage::Take(_)));
                let terminal = if capped { None } else { terminal.clone() };
                StageCursor::new(stage, terminal)
            })
            .collect();
        Cursor {
            source: SourceCursor::new(&self.source),
            stages,
        }
    }

    /// Pulls every element. Fails when the pipeline has no bound, naming
    /// the terminal operation that needed one.
    pub fn drain(&self, terminal: &str, host: &mut dyn Apply) -> EvalResult<Vec<Value>> {
        let mut cursor = self.bounded_cursor(terminal)?;
        let mut out = Vec::new();
        while let Some(value) = cursor.next(host)? {
            out.push(value);
        }
        Ok(out)
    }

    fn ensure_bounded(&self, terminal: &str) -> EvalResult<()> {
        if self.is_bounded() {
            Ok(())
        } else {
            Err(unbounded(terminal))
        }
    }
}

fn unbounded(terminal: &str) -> Unwind {
    runtime_error(format!(
        "unbounded stream reaches `{terminal}` without a bounding `take`"
    ))
}

#[derive(Debug)]
enum SourceCursor {
    Items { items: Rc<Vec<Value>>, index: usize },
    Range { next: i64, end: i64, step: i64 },
    Generate { index: i64, count: Option<i64>, generator: Value },
    Done,
}

impl SourceCursor {
    fn new(source: &Source) -> Self {
        match source {
            Source::List(items) => SourceCursor::Items {
                items: items.clone(),
                index: 0,
            },
            Source::Range { start, end, step } => SourceCursor::Range {
                next: *start,
                end: *end,
                step: *step,
            },
            Source::Generate { count, generator } => SourceCursor::Generate {
                index: 0,
                count: Some(*count),
                generator: generator.clone(),
            },
            Source::Infinite { generator } => SourceCursor::Generate {
                index: 0,
                count: None,
                generator: generator.clone(),
            },
            Source::Empty => SourceCursor::Done,
        }
    }

    fn next(&mut self, host: &mut dyn Apply) -> EvalResult<Option<Value>> {
        match self {
            SourceCursor::Items { items, index } => {
                let item = items.get(*index).cloned();
                *index += 1;
                Ok(item)
            }
            SourceCursor::Range { next, end, step } => {
                let more = if *step > 0 { *next < *end } else { *next > *end };
                if !more {
                    return Ok(None);
                }
                let current = *next;
                *next = next.saturating_add(*step);
                Ok(Some(Value::Int(current)))
            }
            SourceCursor::Generate {
                index,
                count,
                generator,
            } => {
                if count.is_some_and(|count| *index >= count) {
                    return Ok(None);
                }
                let current = *index;
                *index += 1;
                let generator = generator.clone();
                host.apply(&generator, vec![Value::Int(current)]).map(Some)
            }
            SourceCursor::Done => Ok(None),
        }
    }
}

#[derive(Debug)]
enum StageCursor {
    Map(Value),
    Filter(Value),
    /// `terminal` is set when inner streams must be bounded.
    FlatMap {
        mapper: Value,
        inner: Option<Box<Inner>>,
        terminal: Option<Rc<str>>,
    },
    Take { remaining: usize },
    Skip { remaining: usize },
}

impl StageCursor {
    fn new(stage: &Stage, terminal: Option<Rc<str>>) -> Self {
        match stage {
            Stage::Map(f) => StageCursor::Map(f.clone()),
            Stage::Filter(f) => StageCursor::Filter(f.clone()),
            Stage::FlatMap(f) => StageCursor::FlatMap {
                mapper: f.clone(),
                inner: None,
                terminal,
            },
            Stage::Take(n) => StageCursor::Take { remaining: *n },
            Stage::Skip(n) => StageCursor::Skip { remaining: *n },
        }
    }
}

/// Elements produced by one `flat_map` callback.
#[derive(Debug)]
enum Inner {
    Items(Rc<Vec<Value>>, usize),
    Stream(Cursor),
}

impl Inner {
    fn from_value(value: Value, terminal: Option<&str>) -> EvalResult<Inner> {
        match value {
            Value::List(items) | Value::Set(items) => Ok(Inner::Items(items, 0)),
            Value::Stream(stream) => match terminal {
                Some(terminal) => Ok(Inner::Stream(stream.bounded_cursor(terminal)?)),
                None => Ok(Inner::Stream(stream.cursor())),
            },
            other => Err(runtime_error(format!(
                "flat_map callback must return a List or Stream, found {}",
                other.type_name()
            ))),
        }
    }

    fn next(&mut self, host: &mut dyn Apply) -> EvalResult<Option<Value>> {
        match self {
            Inner::Items(items, index) => {
                let item = items.get(*index).cloned();
                *index += 1;
                Ok(item)
            }
            Inner::Stream(cursor) => cursor.next(host),
        }
    }
}

/// Pull state of one traversal over a stream.
#[derive(Debug)]
pub struct Cursor {
    source: SourceCursor,
    stages: Vec<StageCursor>,
}

impl Cursor {
    pub fn next(&mut self, host: &mut dyn Apply) -> EvalResult<Option<Value>> {
        self.pull(self.stages.len(), host)
    }

    /// Next output of the first `level` stages.
    fn pull(&mut self, level: usize, host: &mut dyn Apply) -> EvalResult<Option<Value>> {
        let Some(index) = level.checked_sub(1) else {
            return self.source.next(host);
        };
        match &mut self.stages[index] {
            StageCursor::Map(f) => {
                let f = f.clone();
                match self.pull(index, host)? {
                    Some(value) => host.apply(&f, vec![value]).map(Some),
                    None => Ok(None),
                }
            }
            StageCursor::Filter(f) => {
                let f = f.clone();
                while let Some(value) = self.pull(index, host)? {
                    match host.apply(&f, vec![value.clone()])? {
                        Value::Bool(true) => return Ok(Some(value)),
                        Value::Bool(false) => {}
                        other => {
                            return Err(runtime_error(format!(
                                "filter predicate must return Bool, found {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(None)
            }
            StageCursor::Take { remaining } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
                self.pull(index, host)
            }
            StageCursor::Skip { remaining } => {
                let skip = std::mem::take(remaining);
                for _ in 0..skip {
                    if self.pull(index, host)?.is_none() {
                        return Ok(None);
                    }
                }
                self.pull(index, host)
            }
            StageCursor::FlatMap {
                mapper,
                inner,
                terminal,
            } => {
                let mapper = mapper.clone();
                let terminal = terminal.clone();
                let mut current = inner.take();
                loop {
                    if let Some(active) = current.as_mut() {
                        if let Some(value) = active.next(host)? {
                            if let StageCursor::FlatMap { inner, .. } = &mut self.stages[index] {
                                *inner = current;
                            }
                            return Ok(Some(value));
                        }
                    }
                    let Some(outer) = self.pull(index, host)? else {
                        return Ok(None);
                    };
                    let produced = host.apply(&mapper, vec![outer])?;
                    current = Some(Box::new(Inner::from_value(produced, terminal.as_deref())?));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Unwind;

    /// Functions are encoded as `Int(k)`: add `k`, or for filters, keep
    /// multiples of `k`.
    #[derive(Default)]
    struct Arith {
        calls: usize,
    }

    impl Apply for Arith {
        fn apply(&mut self, function: &Value, args: Vec<Value>) -> EvalResult<Value> {
            self.calls += 1;
            match (function, args.as_slice()) {
                (Value::Int(k), [Value::Int(x)]) if *k < 0 => Ok(Value::Bool(x % -k == 0)),
                (Value::Int(k), [Value::Int(x)]) => Ok(Value::Int(x + k)),
                (Value::String(_), [Value::Int(x)]) => {
                    Ok(Value::list(vec![Value::Int(*x), Value::Int(x * 10)]))
                }
                _ => Err(runtime_error("bad test function")),
            }
        }
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn take_stops_pulling_an_infinite_source() {
        let stream = StreamValue::new(Source::Infinite {
            generator: Value::Int(0),
        })
        .with_stage(Stage::Filter(Value::Int(-3)))
        .with_stage(Stage::Take(3));
        let mut host = Arith::default();
        assert_eq!(stream.drain("collect", &mut host).ok(), Some(ints(&[0, 3, 6])));
        // 7 generator calls and 7 predicate calls
        assert_eq!(host.calls, 14);
    }

    #[test]
    fn unbounded_pipeline_is_refused() {
        let stream = StreamValue::new(Source::Infinite {
            generator: Value::Int(0),
        })
        .with_stage(Stage::Map(Value::Int(1)));
        let err = stream.drain("collect", &mut Arith::default()).expect_err("unbounded");
        let Unwind::Error(err) = err else {
            panic!("expected an error");
        };
        assert_eq!(err.message, "unbounded stream reaches `collect` without a bounding `take`");
    }

    #[test]
    fn flat_map_refuses_an_unbounded_inner_stream() {
        struct Endless;
        impl Apply for Endless {
            fn apply(&mut self, _: &Value, _: Vec<Value>) -> EvalResult<Value> {
                Ok(Value::Stream(Rc::new(StreamValue::new(Source::Infinite {
                    generator: Value::Int(0),
                }))))
            }
        }
        let stream = StreamValue::new(Source::List(Rc::new(ints(&[1]))))
            .with_stage(Stage::FlatMap(Value::Int(0)));
        let Err(Unwind::Error(err)) = stream.drain("count", &mut Endless) else {
            panic!("expected an error");
        };
        assert_eq!(err.message, "unbounded stream reaches `count` without a bounding `take`");

        let capped = stream.with_stage(Stage::Take(2));
        assert!(capped.bounded_cursor("collect").is_ok());
    }

    #[test]
    fn flat_map_drains_inner_before_advancing() {
        let stream = StreamValue::new(Source::Range {
            start: 1,
            end: 3,
            step: 1,
        })
        .with_stage(Stage::FlatMap(Value::string("pair")))
        .with_stage(Stage::Skip(1));
        assert_eq!(
            stream.drain("collect", &mut Arith::default()).ok(),
            Some(ints(&[10, 2, 20]))
        );
    }
}
