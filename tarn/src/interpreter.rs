use crate::{
    builtins,
    env::EnvRef,
    eval::{self, Evaluator},
    loader::{FsLoader, SourceLoader},
    namespace::{NamespaceManager, GLOBAL},
    parser,
    value::Value,
};
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ParseErr(#[from] parser::ParseError),
    #[error(transparent)]
    EvalErr(#[from] eval::EvalError),
    #[error(transparent)]
    IOErr(#[from] io::Error),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EvalErr(e) if e.is_fatal())
    }
}

pub type Result<T = Value> = std::result::Result<T, Error>;

pub const DEFAULT_MAX_DEPTH: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// nested evaluations allowed before giving up
    pub max_depth: usize,
    /// install the native library on start and on [`Interpreter::reset`]
    pub prelude: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            prelude: true,
        }
    }
}

impl Options {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn prelude(mut self, prelude: bool) -> Self {
        self.prelude = prelude;
        self
    }
}

pub fn eval_with_env(ev: &mut Evaluator, code: &str, env: &EnvRef) -> Result {
    let ast = parser::parse_script(code)?;
    Ok(ev.eval_body(&ast, env)?)
}

/// One isolated interpreter: its own namespaces, root environment and loader.
#[derive(Debug)]
pub struct Interpreter {
    evaluator: Evaluator,
    opts: Options,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(Options::default(), FsLoader)
    }

    pub fn with_options(opts: Options, loader: impl SourceLoader + 'static) -> Self {
        let mut namespaces = NamespaceManager::new();
        if opts.prelude {
            install_prelude(&mut namespaces);
        }
        Self {
            evaluator: Evaluator::new(namespaces, Box::new(loader), opts.max_depth),
            opts,
        }
    }

    pub fn options(&self) -> Options {
        self.opts
    }

    pub fn eval(&mut self, code: &str) -> Result {
        let global = self.evaluator.global();
        eval_with_env(&mut self.evaluator, code, &global)
    }

    pub fn run(&mut self, mut source: impl io::Read) -> Result {
        let code = {
            let mut s = String::new();
            source.read_to_string(&mut s)?;
            s
        };
        self.eval(&code)
    }

    /// Looks a symbol up the way code would, `Ns/name` included.
    pub fn get(&self, name: &str) -> Result {
        Ok(self.evaluator.resolve(name, &self.evaluator.global())?)
    }

    pub fn global(&self) -> EnvRef {
        self.evaluator.global()
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        self.evaluator.namespaces()
    }

    pub fn namespaces_mut(&mut self) -> &mut NamespaceManager {
        self.evaluator.namespaces_mut()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Gives the root namespace a fresh environment.
    ///
    /// Closures and namespaces created before keep the environment they
    /// captured, only later top-level lookups see the new one.
    pub fn reset(&mut self) -> Result<()> {
        let namespaces = self.evaluator.namespaces_mut();
        namespaces.reset(GLOBAL).map_err(eval::EvalError::from)?;
        if self.opts.prelude {
            install_prelude(namespaces);
        }
        debug!("interpreter reset");
        Ok(())
    }
}

fn install_prelude(namespaces: &mut NamespaceManager) {
    // the root always exists and `install` only extends it or creates fresh namespaces
    if let Err(e) = builtins::install(namespaces) {
        tracing::error!(error = %e, "failed to install the native library");
    }
}

pub fn eval(code: &str) -> Result {
    Interpreter::default().eval(code)
}

pub fn run(source: impl io::Read) -> Result {
    Interpreter::default().run(source)
}
