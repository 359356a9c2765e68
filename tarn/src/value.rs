use crate::{
    env::{Env, EnvRef},
    eval::{EvalError, Evaluator},
    prelude::*,
};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::{fmt, rc::Rc};
use thiserror::Error;
use variantly::Variantly;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Not a List! Got {0}")]
    NotAList(&'static str),
    #[error("Not a Hash! Got {0}")]
    NotAHash(&'static str),
    #[error("Not a Function! Got {0}")]
    NotAProc(&'static str),
    #[error("Not a Number! Got {0}")]
    NotANum(&'static str),
    #[error("Not a String! Got {0}")]
    NotAStr(&'static str),
    #[error("Not a Bool! Got {0}")]
    NotABool(&'static str),
}

/// Immutable, shared list payload. "Modifying" a list always builds a new one.
pub type List = Rc<[Value]>;

/// Immutable, shared hash payload keyed by [`Value::hash_key`].
pub type Hash = Rc<IndexMap<String, Value>>;

pub trait Call {
    fn call(&self, ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError>;
}

pub type NativeFn = fn(&mut Evaluator, &[Value]) -> Result<Value, EvalError>;

/// A primitive implemented in Rust.
#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

impl Call for Native {
    fn call(&self, ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
        (self.func)(ev, args)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.func as usize == other.func as usize
    }
}

/// A closure: parameters, body and the environment it was created in.
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// name of the rest parameter, `...` already stripped
    pub rest: Option<String>,
    pub body: Rc<[Value]>,
    pub env: EnvRef,
}

impl Call for Lambda {
    fn call(&self, ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
        let mut local = Env::child(self.env.clone());
        for (i, name) in self.params.iter().enumerate() {
            local.set(name, args.get(i).cloned().unwrap_or(Value::Null));
        }
        if let Some(rest) = &self.rest {
            let trailing = args
                .iter()
                .skip(self.params.len())
                .cloned()
                .collect_vec()
                .pipe(Value::new_list);
            local.set(rest, trailing);
        }
        ev.eval_body(&self.body, &local.into_rc())
    }
}

// the captured environment is left out, it usually contains the lambda itself
impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Native(Native),
    Lambda(Rc<Lambda>),
}

impl Function {
    pub fn name(&self) -> Option<&str> {
        match self {
            Function::Native(n) => Some(n.name),
            Function::Lambda(l) => l.name.as_deref(),
        }
    }
}

impl Call for Function {
    fn call(&self, ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Function::Native(n) => n.call(ev, args),
            Function::Lambda(l) => l.call(ev, args),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => a == b,
            (Function::Lambda(a), Function::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Every runtime value, and every node of a parsed program.
#[derive(Variantly, Debug, Clone, PartialEq)]
pub enum Value {
    Number(OrderedFloat<f64>),
    String(String),
    Boolean(bool),
    Symbol(String),
    /// always stored with its leading `:`
    Keyword(String),
    Null,
    /// recoverable failure carried as ordinary data
    Error(String),
    List(List),
    Hash(Hash),
    Function(Function),
}

impl Value {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn num(f: f64) -> Self {
        Self::Number(OrderedFloat(f))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn kw(s: &str) -> Self {
        if s.starts_with(':') {
            Self::Keyword(s.to_owned())
        } else {
            Self::Keyword(format!(":{s}"))
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    pub fn new_list(items: Vec<Value>) -> Self {
        Self::List(items.into())
    }

    pub fn new_hash(entries: IndexMap<String, Value>) -> Self {
        Self::Hash(Rc::new(entries))
    }

    pub fn quote(exp: Value) -> Self {
        Self::new_list(vec![Value::sym("quote"), exp])
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Self::Function(Function::Native(Native { name, func }))
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Null => "null",
            Value::Error(_) => "error",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Function(_) => "function",
        }
    }

    /// Key under which this value is stored in a hash.
    /// Keywords keep their colon, strings are used as is, everything else is printed.
    pub fn hash_key(&self) -> String {
        match self {
            Value::Keyword(k) => k.clone(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Text as a user would want it printed: strings unquoted.
    pub fn text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_list(&self) -> Result<&List, ValueError> {
        self.list_ref_or(ValueError::NotAList(self.type_name()))
    }

    pub fn as_hash(&self) -> Result<&Hash, ValueError> {
        self.hash_ref_or(ValueError::NotAHash(self.type_name()))
    }

    pub fn as_function(&self) -> Result<&Function, ValueError> {
        self.function_ref_or(ValueError::NotAProc(self.type_name()))
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        self.string_ref_or(ValueError::NotAStr(self.type_name()))
            .map(String::as_str)
    }
}

macro_rules! impl_from_copy {
    ($type:ty, $variant:ident, $ref_unwrap_or:ident, $err:expr, $extract:expr) => {
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                Value::$variant(value.into())
            }
        }

        impl TryFrom<&Value> for $type {
            type Error = ValueError;

            fn try_from(value: &Value) -> Result<Self, Self::Error> {
                value.$ref_unwrap_or($err(value.type_name())).map($extract)
            }
        }
    };
}

impl_from_copy!(
    f64,
    Number,
    number_ref_or,
    ValueError::NotANum,
    |n: &OrderedFloat<f64>| n.0
);

impl_from_copy!(
    bool,
    Boolean,
    boolean_ref_or,
    ValueError::NotABool,
    |b: &bool| *b
);

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::new_list(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write_number(f, n.0),
            Value::String(s) => write_escaped(f, s),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Symbol(s) | Value::Keyword(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::Error(msg) => write!(f, "#<error: {msg}>"),
            Value::List(items) => write!(f, "({})", items.iter().join(" ")),
            Value::Hash(entries) => write!(
                f,
                "#{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{k} {v}"))
                    .join(" ")
            ),
            Value::Function(fun) => match fun {
                Function::Native(n) => write!(f, "#<native {}>", n.name),
                Function::Lambda(l) => match &l.name {
                    Some(name) => write!(f, "#<fn {name}>"),
                    None => write!(f, "#<fn>"),
                },
            },
        }
    }
}

/// Creates a [`Value::List`] like `vec!`.
///
/// A thin wrapper around `vec!`, expands to `Value::new_list(vec![/*...*/])`.
///
/// ```
/// # use tarn::{list, value::Value};
/// let l = list![Value::num(1.), Value::sym("2")].unwrap_list();
/// assert_eq!(l[0], Value::num(1.));
/// assert_eq!(l[1], Value::sym("2"));
/// ```
#[macro_export]
macro_rules! list {
    [] => (
        $crate::value::Value::new_list(vec![])
    );
    [$($x:expr),+ $(,)?] => (
        $crate::value::Value::new_list(vec![$($x),+])
    );
}

pub use list;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_canonical() {
        assert_eq!(Value::kw("name"), Value::kw(":name"));
        assert_eq!(Value::kw("name").to_string(), ":name");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::num(0.).is_truthy());
        assert!(Value::str("").is_truthy());
        assert!(list![].is_truthy());
    }

    #[test]
    fn hash_keys() {
        assert_eq!(Value::kw("a").hash_key(), ":a");
        assert_eq!(Value::str("a").hash_key(), "a");
        assert_eq!(Value::num(1.).hash_key(), "1");
        assert_eq!(Value::Boolean(true).hash_key(), "true");
    }

    #[test]
    fn display() {
        let nested = list![
            Value::num(1.),
            Value::num(2.5),
            Value::str("a\"b"),
            list![Value::sym("x"), Value::Null],
        ];
        assert_eq!(nested.to_string(), r#"(1 2.5 "a\"b" (x null))"#);
        let hash = Value::new_hash(IndexMap::from([
            (":a".to_owned(), Value::num(1.)),
            ("b".to_owned(), Value::Boolean(false)),
        ]));
        assert_eq!(hash.to_string(), "#{:a 1 b false}");
        assert_eq!(Value::err("boom").to_string(), "#<error: boom>");
    }

    #[test]
    fn conversions() {
        assert_eq!(f64::try_from(&Value::num(3.)), Ok(3.));
        assert_eq!(
            f64::try_from(&Value::str("3")),
            Err(ValueError::NotANum("string"))
        );
        assert_eq!(bool::try_from(&Value::from(true)), Ok(true));
        assert_eq!(
            Value::sym("x").as_list().unwrap_err(),
            ValueError::NotAList("symbol")
        );
    }

    #[test]
    fn lists_are_shared_not_copied() {
        let original = list![Value::num(1.), Value::num(2.)];
        let alias = original.clone();
        let (Value::List(a), Value::List(b)) = (&original, &alias) else {
            unreachable!()
        };
        assert!(Rc::ptr_eq(a, b));
    }
}
