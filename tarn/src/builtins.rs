//! Native functions installed into a fresh interpreter.
//!
//! The unqualified ones live in the root environment, the rest in the `Core`,
//! `List`, `Hash` and `String` namespaces, created and filled through
//! [`NamespaceManager::create`] and [`NamespaceManager::extend`].

use crate::{
    env::Env,
    eval::{EvalError, Evaluator, Signal},
    namespace::{NamespaceError, NamespaceManager, GLOBAL},
    prelude::*,
    value::{Function, NativeFn, Value},
};
use indexmap::IndexMap;
use thiserror::Error;

/// Error representing runtime stdlib exceptions.
#[derive(Error, Debug)]
#[error("{msg}")]
pub struct StdErr {
    msg: String,
}

impl StdErr {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

type NativeResult = Result<Value, EvalError>;

/// Fails unless exactly `N` arguments were passed.
fn exact<const N: usize>(args: &[Value]) -> Result<&[Value; N], EvalError> {
    args.try_into().map_err(|_| EvalError::WrongArgCount {
        required: N,
        passed: args.len(),
    })
}

fn at_least(args: &[Value], required: usize) -> Result<(), EvalError> {
    if args.len() < required {
        return Err(EvalError::TooFewArgs {
            required,
            passed: args.len(),
        });
    }
    Ok(())
}

#[inline]
/// Creates an iterator that tries_into and returns [`Result<f64>`]
fn numbers(args: &[Value]) -> impl Iterator<Item = Result<f64, EvalError>> + '_ {
    args.iter().map(|a| f64::try_from(a).map_err(EvalError::from))
}

fn index(val: &Value) -> Result<usize, EvalError> {
    let i = f64::try_from(val)?;
    if i < 0. || i.fract() != 0. {
        return Err(StdErr::new("index out of range").into());
    }
    Ok(i as usize)
}

/// global functions and constants
pub mod core {
    use super::*;

    /// Negates a boolean. Any other value, `null` included, gives `false`.
    pub fn not(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        Ok((*arg == Value::Boolean(false)).into())
    }

    pub fn list(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        Ok(Value::new_list(args.to_vec()))
    }

    /// `(make-hash (list k1 v1 k2 v2 ...))`, what hash literals expand to
    pub fn make_hash(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [pairs] = exact::<1>(args)?;
        hash::from_pairs(pairs.as_list()?)
    }

    /// Prints the arguments' text and passes the last one through.
    pub fn print(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        println!("{}", args.iter().map(Value::text).join(" "));
        Ok(args.last().cloned().unwrap_or(Value::Null))
    }

    /// Prints the value in surface syntax and passes it through.
    pub fn inspect(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        println!("{arg}");
        Ok(arg.clone())
    }

    /// Evaluates a value as code in the root environment.
    pub fn eval(ev: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        let global = ev.global();
        ev.evaluate(arg, &global)
    }

    pub fn exit(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let status = match args {
            [] => None,
            [st] => Some(st),
            _ => {
                return Err(EvalError::WrongArgCount {
                    required: 0,
                    passed: args.len(),
                })
            }
        };
        let default = &Value::num(0.);
        Err(try_signal_status(status.unwrap_or(default)).map_or_else(
            || StdErr::new("Expected unsigned 8 bit integer!").into(),
            |x| Signal::ExitSignal(x).into(),
        ))
    }

    fn try_signal_status(val: &Value) -> Option<u8> {
        let Value::Number(i) = val else {
            return None;
        };
        let i = i.0;
        if (i as u8) as f64 == i {
            Some(i as u8)
        } else {
            None
        }
    }

    pub fn is_null(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        Ok(arg.is_null().into())
    }

    pub fn type_of(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        Ok(Value::str(arg.type_name()))
    }

    pub fn is_error(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [arg] = exact::<1>(args)?;
        Ok(arg.is_error().into())
    }

    /// Builds an error value, which is data and does not unwind.
    pub fn error(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        Ok(Value::err(args.iter().map(Value::text).join(" ")))
    }
}

/// NOTE: math ops do NOT short-circuit
pub mod math {
    use super::*;
    use std::ops::*;

    trait ReduceOk: Iterator {
        /// [`fold_ok`] but the first element of the iterator is the accumulator,
        /// akin to [`reduce`], returns [`None`] if no elements
        fn reduce_ok<I, E>(&mut self, mut f: impl FnMut(I, I) -> I) -> Result<Option<I>, E>
        where
            Self: Iterator<Item = Result<I, E>>,
        {
            self.fold_ok(None, |acc, e| match acc {
                Some(i) => Some(f(i, e)),
                None => Some(e),
            })
        }
    }

    impl<T> ReduceOk for T where T: Iterator<Item = Result<f64, EvalError>> {}

    pub fn add(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        numbers(args).fold_ok(0., Add::add).map(Value::from)
    }

    pub fn mul(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        numbers(args).fold_ok(1., Mul::mul).map(Value::from)
    }

    /// `(- x)` negates
    pub fn sub(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        at_least(args, 1)?;
        numbers(args)
            .reduce_ok(Sub::sub)
            .map(|e| e.unwrap_or(0.))
            .map(|e| if args.len() == 1 { -e } else { e })
            .map(Value::from)
    }

    fn checked_div(lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        if rhs == 0. {
            return Err(EvalError::DivisionByZero);
        }
        Ok(lhs / rhs)
    }

    /// `(/ x)` is the reciprocal
    pub fn div(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let nums = numbers(args).collect::<Result<Vec<_>, _>>()?;
        let (first, rest) = nums.split_first().ok_or(EvalError::TooFewArgs {
            required: 1,
            passed: 0,
        })?;
        if rest.is_empty() {
            return checked_div(1., *first).map(Value::from);
        }
        rest.iter()
            .try_fold(*first, |acc, &d| checked_div(acc, d))
            .map(Value::from)
    }

    pub fn rem(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [lhs, rhs] = exact::<2>(args)?;
        let (lhs, rhs) = (f64::try_from(lhs)?, f64::try_from(rhs)?);
        if rhs == 0. {
            return Err(EvalError::ModuloByZero);
        }
        Ok(Value::from(lhs % rhs))
    }

    /// Structural equality, any value type.
    pub fn eq(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        Ok(args.iter().tuple_windows().all(|(a, b)| a == b).into())
    }

    fn compare(args: &[Value], op: fn(&f64, &f64) -> bool) -> NativeResult {
        let nums = numbers(args).collect::<Result<Vec<_>, _>>()?;
        Ok(nums.iter().tuple_windows().all(|(a, b)| op(a, b)).into())
    }

    pub fn lt(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        compare(args, f64::lt)
    }

    pub fn gt(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        compare(args, f64::gt)
    }

    pub fn le(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        compare(args, f64::le)
    }

    pub fn ge(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        compare(args, f64::ge)
    }
}

/// `List` namespace. Lists are never changed in place.
pub mod list {
    use super::*;

    pub fn create(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        Ok(Value::new_list(args.to_vec()))
    }

    pub fn head(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list] = exact::<1>(args)?;
        Ok(list.as_list()?.first().cloned().unwrap_or(Value::Null))
    }

    pub fn tail(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list] = exact::<1>(args)?;
        let items = list.as_list()?;
        Ok(Value::new_list(items.iter().skip(1).cloned().collect_vec()))
    }

    pub fn count(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list] = exact::<1>(args)?;
        Ok(Value::from(list.as_list()?.len() as f64))
    }

    pub fn at(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list, i] = exact::<2>(args)?;
        let items = list.as_list()?;
        index(i)?
            .pipe(|i| items.get(i).cloned())
            .ok_or_else(|| StdErr::new("index out of range").into())
    }

    pub fn concat(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let mut out = vec![];
        for list in args {
            out.extend(list.as_list()?.iter().cloned());
        }
        Ok(Value::new_list(out))
    }

    /// `(List/push list item...)` returns a new list with the items appended.
    pub fn push(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        at_least(args, 2)?;
        let (list, items) = (&args[0], &args[1..]);
        let mut out = list.as_list()?.to_vec();
        out.extend_from_slice(items);
        Ok(Value::new_list(out))
    }

    /// `(List/map list fn)`, `fn` receives the item and its index.
    pub fn map(ev: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list, fun] = exact::<2>(args)?;
        let fun = fun.as_function()?;
        let mapped = list
            .as_list()?
            .iter()
            .enumerate()
            .map(|(i, item)| ev.apply(fun, &[item.clone(), Value::from(i as f64)]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::new_list(mapped))
    }

    /// `(List/reduce list fn init)`
    pub fn reduce(ev: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list, fun, init] = exact::<3>(args)?;
        let fun = fun.as_function()?;
        list.as_list()?
            .iter()
            .try_fold(init.clone(), |acc, item| ev.apply(fun, &[acc, item.clone()]))
    }

    pub fn sum(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [list] = exact::<1>(args)?;
        numbers(list.as_list()?).fold_ok(0., std::ops::Add::add).map(Value::from)
    }

    /// Numbers sort ascending on their own; anything else needs a comparator
    /// returning a negative, zero or positive number.
    pub fn sort(ev: &mut Evaluator, args: &[Value]) -> NativeResult {
        let (list, cmp) = match args {
            [list] => (list, None),
            [list, cmp] => (list, Some(cmp.as_function()?)),
            _ => {
                return Err(EvalError::WrongArgCount {
                    required: 1,
                    passed: args.len(),
                })
            }
        };
        let mut items = list.as_list()?.to_vec();
        match cmp {
            None => {
                let mut nums = numbers(&items).collect::<Result<Vec<_>, _>>()?;
                nums.sort_by(f64::total_cmp);
                items = nums.into_iter().map(Value::from).collect_vec();
            }
            Some(fun) => {
                // merge sort by hand, the comparator may fail
                items = sort_with(ev, fun, items)?;
            }
        }
        Ok(Value::new_list(items))
    }

    fn sort_with(
        ev: &mut Evaluator,
        fun: &Function,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, EvalError> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let mut left = items;
        let right = left.split_off(left.len() / 2);
        let (left, right) = (sort_with(ev, fun, left)?, sort_with(ev, fun, right)?);
        let mut out = Vec::with_capacity(left.len() + right.len());
        let (mut l, mut r) = (left.into_iter().peekable(), right.into_iter().peekable());
        while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
            let order = ev.apply(fun, &[a.clone(), b.clone()])?;
            if f64::try_from(&order)? <= 0. {
                out.extend(l.next());
            } else {
                out.extend(r.next());
            }
        }
        out.extend(l);
        out.extend(r);
        Ok(out)
    }
}

/// `Hash` namespace. Setting a key returns a new hash.
pub mod hash {
    use super::*;

    pub(super) fn from_pairs(items: &[Value]) -> NativeResult {
        if items.len() % 2 != 0 {
            return Err(StdErr::new("Hash requires an even number of key-value elements").into());
        }
        Ok(items
            .iter()
            .tuples()
            .map(|(k, v)| (k.hash_key(), v.clone()))
            .collect::<IndexMap<_, _>>()
            .pipe(Value::new_hash))
    }

    pub fn create(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        from_pairs(args)
    }

    /// Missing keys give `null`.
    pub fn get(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [hash, key] = exact::<2>(args)?;
        Ok(hash
            .as_hash()?
            .get(&key.hash_key())
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub fn set(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [hash, key, val] = exact::<3>(args)?;
        let mut entries = (**hash.as_hash()?).clone();
        entries.insert(key.hash_key(), val.clone());
        Ok(Value::new_hash(entries))
    }

    /// Keys in insertion order, keyword keys come back as keywords.
    pub fn keys(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [hash] = exact::<1>(args)?;
        Ok(hash
            .as_hash()?
            .keys()
            .map(|k| {
                if k.starts_with(':') {
                    Value::kw(k)
                } else {
                    Value::str(k.as_str())
                }
            })
            .collect_vec()
            .pipe(Value::new_list))
    }
}

/// `String` namespace
pub mod string {
    use super::*;

    pub fn split(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [s, by] = exact::<2>(args)?;
        if s.is_null() {
            return Ok(Value::new_list(vec![]));
        }
        let (s, by) = (s.as_str()?, by.as_str()?);
        Ok(s.split(by)
            .map(Value::str)
            .collect_vec()
            .pipe(Value::new_list))
    }

    pub fn trim(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [s] = exact::<1>(args)?;
        Ok(Value::str(s.as_str()?.trim()))
    }

    /// Concatenates the text of every argument.
    pub fn join(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        Ok(Value::str(args.iter().map(Value::text).join("")))
    }

    /// Replaces the first occurrence only.
    pub fn replace(_: &mut Evaluator, args: &[Value]) -> NativeResult {
        let [s, pattern, with] = exact::<3>(args)?;
        Ok(Value::str(
            s.as_str()?.replacen(pattern.as_str()?, with.as_str()?, 1),
        ))
    }
}

const GLOBALS: &[(&str, NativeFn)] = &[
    ("+", math::add),
    ("-", math::sub),
    ("*", math::mul),
    ("/", math::div),
    ("%", math::rem),
    ("=", math::eq),
    ("<", math::lt),
    (">", math::gt),
    ("<=", math::le),
    (">=", math::ge),
    ("not", core::not),
    ("list", core::list),
    ("make-hash", core::make_hash),
    ("hash-get", hash::get),
    ("print", core::print),
    ("inspect", core::inspect),
    ("eval", core::eval),
    ("exit", core::exit),
];

const NAMESPACES: &[(&str, &[(&str, NativeFn)])] = &[
    (
        "Core",
        &[
            ("null?", core::is_null),
            ("type?", core::type_of),
            ("error?", core::is_error),
            ("error", core::error),
        ],
    ),
    (
        "List",
        &[
            ("create", list::create),
            ("head", list::head),
            ("tail", list::tail),
            ("count", list::count),
            ("at", list::at),
            ("concat", list::concat),
            ("push", list::push),
            ("map", list::map),
            ("reduce", list::reduce),
            ("sum", list::sum),
            ("sort", list::sort),
        ],
    ),
    (
        "Hash",
        &[
            ("create", hash::create),
            ("get", hash::get),
            ("set", hash::set),
            ("keys", hash::keys),
        ],
    ),
    (
        "String",
        &[
            ("split", string::split),
            ("trim", string::trim),
            ("join", string::join),
            ("replace", string::replace),
        ],
    ),
];

fn define_all(env: &mut Env, natives: &[(&'static str, NativeFn)]) {
    for &(name, func) in natives {
        env.set(name, Value::native(name, func));
    }
}

/// Fills the root environment and registers the library namespaces.
pub fn install(manager: &mut NamespaceManager) -> Result<(), NamespaceError> {
    manager.extend(GLOBAL, |env| {
        define_all(env, GLOBALS);
        env.set("true", Value::Boolean(true));
        env.set("false", Value::Boolean(false));
        env.set("null", Value::Null);
    })?;
    for &(name, natives) in NAMESPACES {
        manager.create(name);
        manager.extend(name, |env| define_all(env, natives))?;
    }
    Ok(())
}
