mod prelude {
    pub use itertools::Itertools;
    pub use tap::prelude::*;
}

pub mod builtins;
pub mod env;
pub mod eval;
/// Module representing high-level entry-point of the interpreter.
pub mod interpreter;
pub mod lexer;
pub mod loader;
pub mod namespace;
pub mod parser;
mod stack;
pub mod value;

pub use interpreter::{Interpreter, Options};
pub use value::Value;
