use crate::{
    builtins::StdErr,
    env::{Env, EnvRef},
    loader::SourceLoader,
    namespace::{self, NamespaceError, NamespaceManager},
    parser::{self, ParseError},
    stack::ensure_sufficient_stack,
    value::{Call, Function, Lambda, List, Value, ValueError},
};
use std::{collections::HashMap, fmt, io, rc::Rc};
use thiserror::Error;
use tracing::{debug, trace};

/// Control values that unwind evaluation on purpose.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    #[error("Exit signal with code: {0}")]
    ExitSignal(u8),
}

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),
    #[error("{0} is not a function")]
    NotAFunction(String),
    #[error("Wrong number of arguments! Required {required}, got {passed}")]
    WrongArgCount { required: usize, passed: usize },
    #[error("Too few arguments! Required at least {required}, got {passed}")]
    TooFewArgs { required: usize, passed: usize },
    #[error("Ill-formed {0} expression")]
    IllFormed(&'static str),
    #[error("Expected a symbol, got {0}")]
    ExpectedSymbol(String),
    #[error("Rest parameter must be the last parameter")]
    RestNotLast,
    #[error(transparent)]
    Type(#[from] ValueError),
    #[error("division by zero error")]
    DivisionByZero,
    #[error("modulo by zero error")]
    ModuloByZero,
    #[error(transparent)]
    Std(#[from] StdErr),
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Failed to read module {path}: {source}")]
    ModuleIo { path: String, source: io::Error },
    #[error("Syntax error in module {path}: {source}")]
    ModuleSyntax { path: String, source: ParseError },
    #[error("Maximum recursion depth of {0} exceeded")]
    RecursionLimit(usize),
    #[error(transparent)]
    Signal(#[from] Signal),
}

impl EvalError {
    /// Errors a host must not treat as an ordinary, recoverable failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::RecursionLimit(_))
    }
}

/// Handler of a special form, receives the unevaluated tail.
pub type FormFn = fn(&mut Evaluator, &[Value], &EnvRef) -> Result<Value, EvalError>;

/// Parameter prefix marking the rest parameter of a lambda.
pub const REST_PREFIX: &str = "...";

pub struct Evaluator {
    namespaces: NamespaceManager,
    loader: Box<dyn SourceLoader>,
    forms: HashMap<&'static str, FormFn>,
    depth: usize,
    max_depth: usize,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("namespaces", &self.namespaces)
            .field("loader", &self.loader)
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new(
        namespaces: NamespaceManager,
        loader: Box<dyn SourceLoader>,
        max_depth: usize,
    ) -> Self {
        Self {
            namespaces,
            loader,
            forms: special::FORMS.iter().copied().collect(),
            depth: 0,
            max_depth,
        }
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut NamespaceManager {
        &mut self.namespaces
    }

    pub fn global(&self) -> EnvRef {
        self.namespaces.root()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_special(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    /// Evaluates `exp` in `env`.
    ///
    /// Every call counts towards the nesting limit; going past it fails with
    /// [`EvalError::RecursionLimit`] instead of exhausting the host stack.
    pub fn evaluate(&mut self, exp: &Value, env: &EnvRef) -> Result<Value, EvalError> {
        self.nested(|ev| ev.eval_inner(exp, env))
    }

    /// Runs one recursive step under the nesting limit, on a stack with room to spare.
    fn nested<T>(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::RecursionLimit(self.max_depth));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| step(self));
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, exp: &Value, env: &EnvRef) -> Result<Value, EvalError> {
        match exp {
            Value::Symbol(sym) => self.resolve(sym, env),
            Value::List(items) => self.eval_list(items, env),
            Value::Number(_)
            | Value::String(_)
            | Value::Boolean(_)
            | Value::Keyword(_)
            | Value::Null
            | Value::Error(_)
            | Value::Hash(_)
            | Value::Function(_) => Ok(exp.clone()),
        }
    }

    fn eval_list(&mut self, list: &List, env: &EnvRef) -> Result<Value, EvalError> {
        let [head, args @ ..] = &list[..] else {
            return Ok(Value::List(list.clone()));
        };

        // handle special forms
        if let Value::Symbol(sym) = head {
            if let Some(form) = self.forms.get(sym.as_str()).copied() {
                return form(self, args, env);
            }
        }

        let Value::Function(fun) = self.evaluate(head, env)? else {
            return Err(EvalError::NotAFunction(head.to_string()));
        };
        let args = args
            .iter()
            .map(|arg| self.evaluate(arg, env))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply(&fun, &args)
    }

    /// Calls `fun` with already evaluated arguments.
    pub fn apply(&mut self, fun: &Function, args: &[Value]) -> Result<Value, EvalError> {
        trace!(
            function = fun.name().unwrap_or("<anonymous>"),
            depth = self.depth,
            "applying"
        );
        fun.call(self, args)
    }

    /// Evaluates `body` in order and returns the last result, `null` when empty.
    pub fn eval_body(&mut self, body: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        body.iter()
            .try_fold(Value::Null, |_, exp| self.evaluate(exp, env))
    }

    /// Looks up a symbol. `Ns/name` is looked up in the namespace `Ns`,
    /// the lone `/` is an ordinary symbol.
    pub fn resolve(&self, sym: &str, env: &EnvRef) -> Result<Value, EvalError> {
        match namespace::split(sym) {
            (Some(ns), name) if sym.len() > 1 => {
                let ns_env = self
                    .namespaces
                    .get(ns)
                    .ok_or_else(|| NamespaceError::NotFound(ns.to_owned()))?;
                let val = ns_env.borrow().get(name);
                val
            }
            _ => env.borrow().get(sym),
        }
    }

    /// Reads, parses and evaluates a module against `env`.
    pub fn require(&mut self, path: &str, env: &EnvRef) -> Result<Value, EvalError> {
        let source = self.loader.read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EvalError::ModuleNotFound(path.to_owned()),
            _ => EvalError::ModuleIo {
                path: path.to_owned(),
                source: e,
            },
        })?;
        debug!(path, bytes = source.len(), "loading module");
        let exps = parser::parse_script(&source).map_err(|source| EvalError::ModuleSyntax {
            path: path.to_owned(),
            source,
        })?;
        self.eval_body(&exps, env)
    }

    /// Expands a quasiquoted template.
    fn quasi(&mut self, template: &Value, env: &EnvRef) -> Result<Value, EvalError> {
        let Value::List(items) = template else {
            return Ok(template.clone());
        };
        if let [Value::Symbol(head), arg] = &items[..] {
            if head == "unquote" {
                return self.evaluate(arg, env);
            }
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items.iter() {
            match item {
                Value::List(inner) => match &inner[..] {
                    [Value::Symbol(head), arg] if head == "unquote-splicing" => {
                        let spliced = self.evaluate(arg, env)?;
                        out.extend(spliced.as_list()?.iter().cloned());
                    }
                    _ => out.push(self.nested(|ev| ev.quasi(item, env))?),
                },
                _ => out.push(item.clone()),
            }
        }
        Ok(Value::new_list(out))
    }
}

/// special forms that require different evaluation than normal procedures
pub mod special {
    use super::*;

    /// Name to handler table the evaluator is built from.
    pub const FORMS: &[(&str, FormFn)] = &[
        ("quote", quote),
        ("quasiquote", quasiquote),
        ("if", eval_if),
        ("define", define),
        ("def", define),
        ("defn", defn),
        ("lambda", lambda),
        ("fn", lambda),
        ("begin", begin),
        ("let", eval_let),
        ("and", and),
        ("or", or),
        ("require", require),
        ("namespace", eval_namespace),
        ("ns", eval_namespace),
    ];

    fn symbol_name(exp: &Value) -> Result<&str, EvalError> {
        match exp {
            Value::Symbol(s) => Ok(s),
            other => Err(EvalError::ExpectedSymbol(other.to_string())),
        }
    }

    pub fn quote(_: &mut Evaluator, args: &[Value], _: &EnvRef) -> Result<Value, EvalError> {
        let [exp] = args else {
            return Err(EvalError::IllFormed("quote"));
        };
        Ok(exp.clone())
    }

    pub fn quasiquote(
        ev: &mut Evaluator,
        args: &[Value],
        env: &EnvRef,
    ) -> Result<Value, EvalError> {
        let [template] = args else {
            return Err(EvalError::IllFormed("quasiquote"));
        };
        ev.quasi(template, env)
    }

    /// Only `false` and `null` are falsy. Without an alternative the
    /// consequent is evaluated either way.
    pub fn eval_if(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let (cond, then, alt) = match args {
            [cond, then] => (cond, then, None),
            [cond, then, alt] => (cond, then, Some(alt)),
            _ => return Err(EvalError::IllFormed("if")),
        };
        let branch = if ev.evaluate(cond, env)?.is_truthy() {
            then
        } else {
            alt.unwrap_or(then)
        };
        ev.evaluate(branch, env)
    }

    pub fn define(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let [target, exp] = args else {
            return Err(EvalError::IllFormed("define"));
        };
        let name = symbol_name(target)?;
        let val = ev.evaluate(exp, env)?;
        Ok(env.borrow_mut().set(name, val))
    }

    /// `(defn name (params) body...)`
    pub fn defn(_: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let [target, params, body @ ..] = args else {
            return Err(EvalError::IllFormed("defn"));
        };
        if body.is_empty() {
            return Err(EvalError::IllFormed("defn"));
        }
        let name = symbol_name(target)?;
        let fun = make_lambda(Some(name), params, body, env)?;
        Ok(env.borrow_mut().set(name, fun))
    }

    pub fn lambda(_: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let [params, body @ ..] = args else {
            return Err(EvalError::IllFormed("lambda"));
        };
        if body.is_empty() {
            return Err(EvalError::IllFormed("lambda"));
        }
        make_lambda(None, params, body, env)
    }

    /// Builds a closure over `env`. A parameter spelled `...name` collects
    /// the trailing arguments and has to come last.
    pub fn make_lambda(
        name: Option<&str>,
        params: &Value,
        body: &[Value],
        env: &EnvRef,
    ) -> Result<Value, EvalError> {
        let list = params.as_list()?;
        let mut names = Vec::with_capacity(list.len());
        let mut rest = None;
        for param in list.iter() {
            let param = symbol_name(param)?;
            if rest.is_some() {
                return Err(EvalError::RestNotLast);
            }
            match param.strip_prefix(REST_PREFIX) {
                Some(r) => rest = Some(r.to_owned()),
                None => names.push(param.to_owned()),
            }
        }
        let lambda = Lambda {
            name: name.map(str::to_owned),
            params: names,
            rest,
            body: body.into(),
            env: env.clone(),
        };
        Ok(Function::Lambda(Rc::new(lambda)).into())
    }

    pub fn begin(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        ev.eval_body(args, env)
    }

    /// Values are evaluated in the outer environment, so bindings don't see each other.
    pub fn eval_let(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let [bindings, body @ ..] = args else {
            return Err(EvalError::IllFormed("let"));
        };
        if body.is_empty() {
            return Err(EvalError::IllFormed("let"));
        }
        let mut local = Env::child(env.clone());
        for pair in bindings.as_list()?.iter() {
            let [name, exp] = &pair.as_list()?[..] else {
                return Err(EvalError::IllFormed("let"));
            };
            let name = symbol_name(name)?;
            let val = ev.evaluate(exp, env)?;
            local.set(name, val);
        }
        ev.eval_body(body, &local.into_rc())
    }

    /// Stops at the first `false`.
    pub fn and(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let mut last = Value::Boolean(true);
        for exp in args {
            last = ev.evaluate(exp, env)?;
            if last == Value::Boolean(false) {
                break;
            }
        }
        Ok(last)
    }

    /// Stops at the first value that is not `false`.
    pub fn or(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let mut last = Value::Boolean(false);
        for exp in args {
            last = ev.evaluate(exp, env)?;
            if last != Value::Boolean(false) {
                break;
            }
        }
        Ok(last)
    }

    pub fn require(ev: &mut Evaluator, args: &[Value], env: &EnvRef) -> Result<Value, EvalError> {
        let [path] = args else {
            return Err(EvalError::IllFormed("require"));
        };
        let path = ev.evaluate(path, env)?;
        ev.require(path.as_str()?, env)
    }

    /// Body forms run inside the namespace. A namespace that already exists
    /// is extended, never replaced.
    pub fn eval_namespace(
        ev: &mut Evaluator,
        args: &[Value],
        _: &EnvRef,
    ) -> Result<Value, EvalError> {
        let [name, body @ ..] = args else {
            return Err(EvalError::IllFormed("namespace"));
        };
        let name = symbol_name(name)?;
        namespace::validate(name)?;
        let ns_env = match ev.namespaces.get(name) {
            Some(env) => env,
            None => ev.namespaces.create(name),
        };
        ev.eval_body(body, &ns_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interpreter::{self, Interpreter, Options},
        list,
        loader::MemoryLoader,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> Result<Value, EvalError> {
        match Interpreter::default().eval(code) {
            Ok(val) => Ok(val),
            Err(interpreter::Error::EvalErr(e)) => Err(e),
            Err(e) => panic!("not an evaluation error: {e}"),
        }
    }

    /// macro to setup test boilerplate for a whole program
    macro_rules! eval_test {
        ($fn_name:ident, $code:literal, $expected:expr) => {
            #[test]
            fn $fn_name() -> Result<()> {
                let result = run($code)?;
                assert_eq!(result, $expected);
                Ok(())
            }
        };
    }

    /// macro for programs that must fail with a given message
    macro_rules! eval_err_test {
        ($fn_name:ident, $code:literal, $expected:literal) => {
            #[test]
            fn $fn_name() {
                let err = run($code).unwrap_err();
                assert_eq!(err.to_string(), $expected);
            }
        };
    }

    eval_test!(addition, "(+ 1 2)", Value::num(3.));

    eval_test!(nested, "(* (+ 1 2) (+ 5 3))", Value::num(24.));

    eval_test!(self_evaluating, r#""hi""#, Value::str("hi"));

    eval_test!(keyword, ":k", Value::kw("k"));

    eval_test!(empty_list, "()", list![]);

    eval_test!(quote, "'(a b)", list![Value::sym("a"), Value::sym("b")]);

    eval_test!(if_false, "(if false 1 2)", Value::num(2.));

    eval_test!(if_true, "(if true 1 2)", Value::num(1.));

    eval_test!(if_without_alternative, "(if false 1)", Value::num(1.));

    eval_test!(zero_is_truthy, "(if 0 1 2)", Value::num(1.));

    eval_test!(null_is_falsy, "(if null 1 2)", Value::num(2.));

    eval_test!(define_returns_value, "(define x 42)", Value::num(42.));

    eval_test!(def_alias, "(def x 4) (* x x)", Value::num(16.));

    eval_test!(
        let_shadows_locally,
        "(define x 42)
         (define y (let ((x 1)) x))
         (list y x)",
        list![Value::num(1.), Value::num(42.)]
    );

    eval_test!(
        let_bindings_use_outer_env,
        "(define x 1)
         (let ((x 10) (y x)) y)",
        Value::num(1.)
    );

    eval_test!(
        closures_capture_defining_env,
        "(define make-adder (lambda (x) (lambda (y) (+ x y))))
         (define add5 (make-adder 5))
         (add5 3)",
        Value::num(8.)
    );

    eval_test!(
        lexical_not_dynamic,
        "(define x 1)
         (define get-x (fn () x))
         (define call (fn (x) (get-x)))
         (call 2)",
        Value::num(1.)
    );

    eval_test!(
        rest_parameter,
        "((lambda (a ...rest) rest) 1 2 3)",
        list![Value::num(2.), Value::num(3.)]
    );

    eval_test!(empty_rest_parameter, "((fn (a ...rest) rest) 1)", list![]);

    eval_test!(missing_args_are_null, "((fn (a b) b) 1)", Value::Null);

    eval_test!(
        defn_recursion,
        "(defn fact (n) (if (= n 0) 1 (* n (fact (- n 1)))))
         (fact 5)",
        Value::num(120.)
    );

    eval_test!(begin_returns_last, "(begin 1 2 3)", Value::num(3.));

    eval_test!(empty_begin, "(begin)", Value::Null);

    eval_test!(and_empty, "(and)", Value::Boolean(true));

    eval_test!(and_last, "(and 1 2)", Value::num(2.));

    eval_test!(and_short_circuits, "(and false (boom))", Value::Boolean(false));

    eval_test!(and_null_is_not_false, "(and null 1)", Value::num(1.));

    eval_test!(or_empty, "(or)", Value::Boolean(false));

    eval_test!(or_short_circuits, "(or true (boom))", Value::Boolean(true));

    eval_test!(or_first_non_false, "(or false null 3)", Value::Null);

    eval_test!(or_all_false, "(or false false)", Value::Boolean(false));

    eval_test!(
        namespaces_accumulate,
        "(namespace Test (defn add (x y) (+ x y)))
         (namespace Test (defn sub (x y) (- x y)))
         (list (Test/add 1 2) (Test/sub 5 3))",
        list![Value::num(3.), Value::num(2.)]
    );

    eval_test!(
        ns_alias_and_nesting,
        "(ns Outer (def a 1))
         (ns Outer/Inner (def b (+ a 1)))
         Outer/Inner/b",
        Value::num(2.)
    );

    eval_test!(
        namespace_sees_global,
        "(define base 10)
         (ns Calc (defn bump (x) (+ x base)))
         (Calc/bump 1)",
        Value::num(11.)
    );

    eval_test!(division_symbol_is_not_qualified, "(/ 8 2)", Value::num(4.));

    eval_test!(
        quasiquote,
        "(define x 2)
         (define xs (list 3 4))
         `(1 ,x ,@xs 5)",
        list![
            Value::num(1.),
            Value::num(2.),
            Value::num(3.),
            Value::num(4.),
            Value::num(5.),
        ]
    );

    eval_test!(
        quasiquote_keeps_symbols,
        "`(a (b ,(+ 1 1)))",
        list![Value::sym("a"), list![Value::sym("b"), Value::num(2.)]]
    );

    eval_err_test!(undefined_symbol, "(boom)", "Undefined symbol: boom");

    eval_err_test!(not_a_function, "(1 2)", "1 is not a function");

    eval_err_test!(missing_namespace, "(Nope/x)", "Namespace Nope not found");

    eval_err_test!(
        lowercase_namespace,
        "(namespace test 1)",
        "Namespace test must start with uppercase"
    );

    eval_err_test!(
        rest_not_last,
        "(lambda (...rest a) a)",
        "Rest parameter must be the last parameter"
    );

    eval_err_test!(ill_formed_if, "(if)", "Ill-formed if expression");

    eval_err_test!(define_needs_symbol, "(define 1 2)", "Expected a symbol, got 1");

    #[test]
    fn hash_literal_equals_explicit_construction() -> Result<()> {
        let mut ip = Interpreter::default();
        let literal = ip.eval("#{ :a 1 :b 2 }")?;
        let explicit = ip.eval("(make-hash (list :a 1 :b 2))")?;
        assert_eq!(literal, explicit);
        let keys = literal.as_hash()?.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec![":a", ":b"]);
        Ok(())
    }

    #[test]
    fn require_defines_into_caller_env() -> Result<()> {
        let loader = MemoryLoader::new()
            .with_file("lib.tarn", "(define lib-x 7) (defn twice (n) (* 2 n))");
        let mut ip = Interpreter::with_options(Options::default(), loader);
        ip.eval(r#"(require "lib.tarn")"#)?;
        assert_eq!(ip.eval("(twice lib-x)")?, Value::num(14.));
        Ok(())
    }

    #[test]
    fn require_missing_module() {
        let mut ip = Interpreter::with_options(Options::default(), MemoryLoader::new());
        let err = ip.eval(r#"(require "nope.tarn")"#).unwrap_err();
        assert!(err.to_string().contains("Module not found: nope.tarn"));
    }

    #[test]
    fn require_module_with_syntax_error() {
        let loader = MemoryLoader::new().with_file("bad.tarn", "(define x");
        let mut ip = Interpreter::with_options(Options::default(), loader);
        let err = ip.eval(r#"(require "bad.tarn")"#).unwrap_err();
        assert!(matches!(err, interpreter::Error::EvalErr(EvalError::ModuleSyntax { .. })));
    }

    #[test]
    fn recursion_limit_is_fatal() {
        let opts = Options::default().max_depth(200);
        let mut ip = Interpreter::with_options(opts, MemoryLoader::new());
        let err = ip
            .eval("(defn spin (n) (spin (+ n 1))) (spin 0)")
            .unwrap_err();
        let interpreter::Error::EvalErr(err) = err else {
            panic!("expected an evaluation error, got {err}");
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Maximum recursion depth of 200 exceeded");
        // the interpreter stays usable afterwards
        assert_eq!(ip.eval("(+ 1 1)").unwrap(), Value::num(2.));
    }

    #[test]
    fn require_reports_other_read_failures() {
        #[derive(Debug)]
        struct Locked;

        impl SourceLoader for Locked {
            fn read(&self, _: &str) -> io::Result<String> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"))
            }
        }

        let mut ip = Interpreter::with_options(Options::default(), Locked);
        let err = ip.eval(r#"(require "secret.tarn")"#).unwrap_err();
        assert!(matches!(err, interpreter::Error::EvalErr(EvalError::ModuleIo { .. })));
        assert_eq!(err.to_string(), "Failed to read module secret.tarn: access denied");
        assert!(!err.is_fatal());
    }

    fn nested_template(depth: usize) -> String {
        format!("`{}{}", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn quasiquote_nesting_counts_towards_limit() {
        let opts = Options::default().max_depth(50);
        let mut ip = Interpreter::with_options(opts, MemoryLoader::new());
        let err = ip.eval(&nested_template(100)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Maximum recursion depth of 50 exceeded");
        assert_eq!(ip.eval(&nested_template(10)).unwrap().to_string().len(), 20);
    }

    #[test]
    fn deeply_nested_quasiquote_is_an_error() {
        let err = Interpreter::default().eval(&nested_template(2_000)).unwrap_err();
        assert!(matches!(
            err,
            interpreter::Error::ParseErr(ParseError::TooDeep(parser::MAX_NESTING))
        ));
    }

    #[test]
    fn nesting_at_parser_limit_evaluates() -> Result<()> {
        let mut ip = Interpreter::default();
        let quoted = nested_template(parser::MAX_NESTING - 1).replacen('`', "'", 1);
        assert!(ip.eval(&quoted)?.is_list());
        assert!(ip.eval(&nested_template(parser::MAX_NESTING - 1))?.is_list());
        Ok(())
    }

    #[test]
    fn deep_but_bounded_recursion() -> Result<()> {
        let mut ip = Interpreter::default();
        let result = ip.eval(
            "(defn count-down (n) (if (= n 0) :done (count-down (- n 1))))
             (count-down 1000)",
        )?;
        assert_eq!(result, Value::kw("done"));
        Ok(())
    }

    #[test]
    fn earlier_bindings_survive_failure() {
        let mut ip = Interpreter::default();
        assert!(ip.eval("(define kept 1) (boom)").is_err());
        assert_eq!(ip.eval("kept").unwrap(), Value::num(1.));
    }

    #[test]
    fn ordinary_errors_are_not_fatal() {
        assert!(!run("(boom)").unwrap_err().is_fatal());
    }

    #[test]
    fn special_form_table() {
        let ip = Interpreter::default();
        for (name, _) in special::FORMS {
            assert!(ip.evaluator().is_special(name));
        }
        assert!(!ip.evaluator().is_special("list"));
    }
}
