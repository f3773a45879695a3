use rill_core::types::Ty;

/// Observable effect of calling a builtin, used by the purity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Pure,
    /// Appends to the log channel. Allowed inside memoizable functions.
    Log,
    /// Creates or inspects futures.
    Async,
    /// Calls out through the service gateway.
    Gateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSig {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic builtins.
    pub max_args: Option<usize>,
    pub effect: Effect,
    /// First argument must be a List, Stream or Set.
    pub sequence: bool,
}

impl BuiltinSig {
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Fixed-arity builtins can be partially applied.
    pub fn curries(&self) -> bool {
        self.max_args == Some(self.min_args) && self.min_args > 1
    }
}

const fn pure(name: &'static str, min: usize, max: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: Some(max),
        effect: Effect::Pure,
        sequence: false,
    }
}

const fn seq(name: &'static str, min: usize, max: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: Some(max),
        effect: Effect::Pure,
        sequence: true,
    }
}

const fn future(name: &'static str, min: usize, max: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: Some(max),
        effect: Effect::Async,
        sequence: false,
    }
}

const fn gateway(name: &'static str, min: usize, max: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: Some(max),
        effect: Effect::Gateway,
        sequence: false,
    }
}

pub const BUILTINS: &[BuiltinSig] = &[
    // sequences
    seq("map", 2, 2),
    seq("filter", 2, 2),
    seq("flat_map", 2, 2),
    seq("take", 2, 2),
    seq("skip", 2, 2),
    seq("reduce", 3, 3),
    seq("collect", 1, 1),
    seq("chunk", 2, 2),
    seq("count", 1, 1),
    seq("first", 1, 1),
    seq("for_each", 2, 2),
    // stream sources
    pure("stream_of", 1, 1),
    pure("stream_range", 2, 3),
    pure("stream_generate", 2, 2),
    pure("generate_infinite", 1, 1),
    pure("stream_empty", 0, 0),
    // lists
    pure("len", 1, 1),
    pure("append", 2, 2),
    pure("concat", 2, 2),
    pure("head", 1, 1),
    pure("tail", 1, 1),
    pure("nth", 2, 2),
    pure("reverse", 1, 1),
    seq("sum", 1, 1),
    pure("range", 2, 2),
    pure("contains", 2, 2),
    // maps
    pure("merge", 2, 2),
    pure("get", 2, 2),
    pure("put", 3, 3),
    pure("remove", 2, 2),
    pure("keys", 1, 1),
    pure("values", 1, 1),
    pure("has_key", 2, 2),
    // sets
    pure("set", 1, 1),
    pure("insert", 2, 2),
    pure("union", 2, 2),
    // option / result
    pure("some", 1, 1),
    pure("Some", 1, 1),
    pure("none", 0, 0),
    pure("ok", 1, 1),
    pure("Ok", 1, 1),
    pure("err", 1, 1),
    pure("Err", 1, 1),
    pure("unwrap", 1, 1),
    pure("unwrap_or", 2, 2),
    pure("is_some", 1, 1),
    pure("is_none", 1, 1),
    pure("is_ok", 1, 1),
    pure("is_err", 1, 1),
    // strings and numbers
    pure("to_string", 1, 1),
    pure("upper", 1, 1),
    pure("lower", 1, 1),
    pure("split", 2, 2),
    pure("join", 2, 2),
    pure("abs", 1, 1),
    pure("min", 2, 2),
    pure("max", 2, 2),
    pure("sqrt", 1, 1),
    pure("floor", 1, 1),
    pure("to_float", 1, 1),
    pure("to_int", 1, 1),
    BuiltinSig {
        name: "log",
        min_args: 0,
        max_args: None,
        effect: Effect::Log,
        sequence: false,
    },
    // futures
    future("on_error", 2, 2),
    future("on_complete_future", 2, 2),
    future("then", 2, 2),
    future("all", 1, 1),
    future("resolved", 1, 1),
    future("failed", 1, 1),
    future("future_state", 1, 1),
    // service gateway
    gateway("read_file", 1, 1),
    gateway("write_file", 2, 2),
    gateway("http_get", 1, 2),
    gateway("http_post", 2, 3),
    gateway("ask", 1, 2),
    gateway("ask_batch", 1, 2),
    gateway("add_entity", 2, 2),
    gateway("add_relation", 3, 4),
    gateway("query_knowledge_graph", 1, 1),
    gateway("train_model", 2, 2),
    gateway("predict", 2, 2),
];

pub fn lookup(name: &str) -> Option<&'static BuiltinSig> {
    BUILTINS.iter().find(|sig| sig.name == name)
}

/// Global constants that are not functions.
pub fn constant_type(name: &str) -> Option<Ty> {
    match name {
        "None" => Some(Ty::option(Ty::Unknown)),
        _ => None,
    }
}

fn arg(args: &[Ty], index: usize) -> Ty {
    args.get(index).map(|ty| ty.base().clone()).unwrap_or(Ty::Unknown)
}

fn returns(callback: &Ty) -> Ty {
    match callback.base() {
        Ty::Function { ret, .. } => (**ret).clone(),
        _ => Ty::Unknown,
    }
}

/// Wraps `elem` in the same sequence shape as `container`. Sets map to lists.
fn same_shape(container: &Ty, elem: Ty) -> Ty {
    match container.base() {
        Ty::Stream(_) => Ty::stream(elem),
        Ty::List(_) | Ty::Set(_) => Ty::list(elem),
        _ => Ty::Unknown,
    }
}

fn element(ty: &Ty) -> Ty {
    ty.element().unwrap_or(Ty::Unknown)
}

fn service_result(ok: Ty) -> Ty {
    Ty::future(Ty::result(ok, Ty::String))
}

/// Result type of a saturated call to builtin `name`.
pub fn result_type(name: &str, args: &[Ty]) -> Ty {
    let first = arg(args, 0);
    match name {
        "map" => same_shape(&first, returns(&arg(args, 1))),
        "flat_map" => same_shape(&first, element(&returns(&arg(args, 1)))),
        "filter" | "take" | "skip" => match first {
            Ty::Set(elem) => Ty::List(elem),
            other => other,
        },
        "reduce" => {
            let init = arg(args, 1);
            init.join(&returns(&arg(args, 2)))
        }
        "collect" => Ty::list(element(&first)),
        "chunk" => Ty::list(Ty::list(element(&first))),
        "count" | "len" => Ty::Int,
        "first" | "head" | "nth" => Ty::option(element(&first)),
        "for_each" | "log" => Ty::Void,
        "stream_of" => Ty::stream(element(&first)),
        "stream_range" => Ty::stream(Ty::Int),
        "stream_generate" => Ty::stream(returns(&arg(args, 1))),
        "generate_infinite" => Ty::stream(returns(&first)),
        "stream_empty" => Ty::stream(Ty::Unknown),
        "append" => match first {
            Ty::List(elem) => Ty::List(Box::new(elem.join(&arg(args, 1)))),
            _ => Ty::list(Ty::Unknown),
        },
        "concat" => first.join(&arg(args, 1)),
        "tail" | "reverse" => first,
        "sum" => match element(&first) {
            Ty::Int => Ty::Int,
            Ty::Float => Ty::Float,
            _ => Ty::Unknown,
        },
        "range" => Ty::list(Ty::Int),
        "contains" | "has_key" | "is_some" | "is_none" | "is_ok" | "is_err" => Ty::Bool,
        "merge" => first.join(&arg(args, 1)),
        "get" => match first {
            Ty::Map(_, value) => Ty::Option(value),
            _ => Ty::option(Ty::Unknown),
        },
        "put" => match first {
            Ty::Map(key, value) => Ty::Map(key, Box::new(value.join(&arg(args, 2)))),
            _ => Ty::Map(Box::new(Ty::String), Box::new(Ty::Unknown)),
        },
        "remove" => first,
        "keys" => Ty::list(Ty::String),
        "values" => match first {
            Ty::Map(_, value) => Ty::List(value),
            _ => Ty::list(Ty::Unknown),
        },
        "set" => Ty::Set(Box::new(element(&first))),
        "insert" => match first {
            Ty::Set(elem) => Ty::Set(Box::new(elem.join(&arg(args, 1)))),
            _ => Ty::Set(Box::new(Ty::Unknown)),
        },
        "union" => first.join(&arg(args, 1)),
        "some" | "Some" => Ty::option(first),
        "none" => Ty::option(Ty::Unknown),
        "ok" | "Ok" => Ty::result(first, Ty::Unknown),
        "err" | "Err" => Ty::result(Ty::Unknown, first),
        "unwrap" => match first {
            Ty::Option(inner) | Ty::Result(inner, _) => *inner,
            _ => Ty::Unknown,
        },
        "unwrap_or" => match first {
            Ty::Option(inner) | Ty::Result(inner, _) => inner.join(&arg(args, 1)),
            _ => arg(args, 1),
        },
        "to_string" | "upper" | "lower" | "join" => Ty::String,
        "split" => Ty::list(Ty::String),
        "abs" => match first {
            Ty::Int => Ty::Int,
            Ty::Float => Ty::Float,
            _ => Ty::Unknown,
        },
        "min" | "max" => first.join(&arg(args, 1)),
        "sqrt" | "to_float" => Ty::Float,
        "floor" | "to_int" => Ty::Int,
        "on_error" => match first {
            Ty::Future(inner) => Ty::Future(Box::new(inner.join(&returns(&arg(args, 1))))),
            _ => Ty::future(Ty::Unknown),
        },
        "on_complete_future" | "then" => Ty::future(returns(&arg(args, 1))),
        "all" => match element(&first) {
            Ty::Future(inner) => Ty::future(Ty::List(inner)),
            _ => Ty::future(Ty::list(Ty::Unknown)),
        },
        "resolved" => Ty::future(first),
        "failed" => Ty::future(Ty::Unknown),
        "future_state" => Ty::String,
        "train_model" => service_result(Ty::Model),
        "predict" => service_result(Ty::Prediction),
        "read_file" | "http_get" | "http_post" | "ask" => service_result(Ty::String),
        "write_file" => service_result(Ty::Void),
        "ask_batch" => service_result(Ty::list(Ty::String)),
        "add_entity" | "add_relation" | "query_knowledge_graph" => service_result(Ty::Unknown),
        _ => Ty::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_builtins_keep_their_container() {
        let mapper = Ty::function(vec![Ty::Int], Ty::String);
        assert_eq!(
            result_type("map", &[Ty::stream(Ty::Int), mapper.clone()]),
            Ty::stream(Ty::String)
        );
        assert_eq!(
            result_type("map", &[Ty::list(Ty::Int), mapper]),
            Ty::list(Ty::String)
        );
        assert_eq!(result_type("collect", &[Ty::stream(Ty::Int)]), Ty::list(Ty::Int));
    }

    #[test]
    fn arity_and_currying() {
        let map = lookup("map").expect("map is builtin");
        assert!(map.accepts_arity(2));
        assert!(!map.accepts_arity(3));
        assert!(map.curries());
        let log = lookup("log").expect("log is builtin");
        assert!(log.accepts_arity(5));
        assert!(!log.curries());
        assert_eq!(lookup("ask").map(|sig| sig.effect), Some(Effect::Gateway));
    }
}
