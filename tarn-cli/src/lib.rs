/// Module representing high-level entry-point of the REPL.
pub mod repl;

pub mod logging {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    pub const ENV_VAR: &str = "TARN_LOG";

    /// Installs a stderr subscriber. `TARN_LOG` wins over `-v`.
    pub fn init(verbose: u8) {
        let default = match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default));
        // a second init (tests, embedding) keeps the first subscriber
        _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init();
    }
}

pub mod run {

    /// Module that holds implementation detail of [`crate::run::run`].
    /// It glues [`tarn::interpreter`] and [`crate::repl`] together.
    mod glue {
        use super::{Mode, Opts};
        use crate::repl;
        use std::{fs::File, io};
        use tarn::{eval, interpreter, loader::FsLoader, Value};
        use thiserror::Error;

        #[derive(Error, Debug)]
        pub enum Error {
            #[error(transparent)]
            Run(interpreter::Error),
            #[error(transparent)]
            Repl(#[from] rustyline::error::ReadlineError),
            #[error(transparent)]
            Signal(#[from] eval::Signal),
        }

        impl From<interpreter::Error> for Error {
            fn from(value: interpreter::Error) -> Self {
                if let interpreter::Error::EvalErr(eval::EvalError::Signal(sig)) = value {
                    Self::Signal(sig)
                } else {
                    Self::Run(value)
                }
            }
        }

        pub type Result<T> = std::result::Result<T, Error>;

        fn open_file(path: &std::path::Path) -> std::result::Result<File, interpreter::Error> {
            File::open(path).map_err(interpreter::Error::from)
        }

        pub fn run(opts: Opts) -> Result<Option<Value>> {
            tracing::debug!(mode = ?opts.mode, max_depth = opts.interpreter.max_depth, "starting");
            let mut ip = interpreter::Interpreter::with_options(opts.interpreter, FsLoader);
            Ok(match opts.mode {
                Mode::Script(path) => ip.run(open_file(&path)?).map(Some)?,
                Mode::Stdin => ip.run(io::stdin()).map(Some)?,
                Mode::Repl => {
                    repl::greet();
                    let sig = repl::run(&mut ip)?;
                    return Err(sig.into());
                }
            })
        }
    }

    use std::{path::PathBuf, process::exit};
    use tarn::{eval::Signal, interpreter::Options};

    #[derive(Debug)]
    pub enum Mode {
        Script(PathBuf),
        Repl,
        Stdin,
    }

    impl Mode {
        /// REPL for a terminal, otherwise stdin is read as a script.
        pub fn stdin_or_repl() -> Self {
            if atty::is(atty::Stream::Stdin) {
                Self::Repl
            } else {
                Self::Stdin
            }
        }
    }

    #[derive(Debug)]
    pub struct Opts {
        pub mode: Mode,
        pub interpreter: Options,
    }

    pub fn run(opts: Opts) {
        match glue::run(opts) {
            Ok(o) => {
                if let Some(exp) = o {
                    println!("{}", exp)
                }
            }
            Err(glue::Error::Signal(sig)) => match sig {
                Signal::ExitSignal(code) => exit(code as i32),
            },
            Err(glue::Error::Run(err)) if err.is_fatal() => {
                eprintln!("Fatal -- {}", err);
                exit(2);
            }
            Err(err) => {
                eprintln!("Error -- {}", err);
                exit(1);
            }
        }
    }
}

pub mod parse {
    use itertools::Itertools;
    use std::{fs, io, path::PathBuf};
    use tarn::{parser, Value};
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum Error {
        #[error(transparent)]
        ParseErr(#[from] parser::ParseError),
        #[error(transparent)]
        IOErr(#[from] io::Error),
    }

    fn inner(file: PathBuf) -> Result<Vec<Value>, Error> {
        Ok(parser::parse_script(&fs::read_to_string(file)?)?)
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().join("\n")),
            Err(e) => {
                eprintln!("Error -- {}", e);
                std::process::exit(1);
            }
        }
    }
}

pub mod lex {
    use itertools::Itertools;
    use std::{fs, io, path::PathBuf};
    use tarn::lexer;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum Error {
        #[error(transparent)]
        LexErr(#[from] lexer::LexError),
        #[error(transparent)]
        IOErr(#[from] io::Error),
    }

    fn inner(file: PathBuf) -> Result<Vec<lexer::Token>, Error> {
        Ok(lexer::tokenize(&fs::read_to_string(file)?)?)
    }

    fn to_str(tok: &lexer::Token) -> String {
        format!("{:?}", tok).replace("Token::", "")
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().map(to_str).join("\n")),
            Err(e) => {
                eprintln!("Error -- {}", e);
                std::process::exit(1);
            }
        }
    }
}

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tarn::interpreter::{Options, DEFAULT_MAX_DEPTH};

#[derive(Parser, Debug)]
/// An embeddable Lisp with namespaces, closures and hash literals.
pub struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Nested evaluations allowed before a program is stopped.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// More log output on stderr, repeat for trace level. `TARN_LOG` overrides it.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run program from a script file.
    Run {
        /// Program to run.
        file: PathBuf,
    },
    /// Parse program from a script file.
    Parse {
        /// Program to parse.
        file: PathBuf,
    },

    /// Lex (tokenize) program from a script file.
    Lex {
        /// Program to lex.
        file: PathBuf,
    },
}

pub fn run() {
    let args = Args::parse();
    logging::init(args.verbose);
    let interpreter = Options::default().max_depth(args.max_depth);
    let Some(command) = args.command else {
        return run::run(run::Opts {
            mode: run::Mode::stdin_or_repl(),
            interpreter,
        });
    };
    match command {
        Commands::Run { file } => {
            run::run(run::Opts {
                mode: run::Mode::Script(file),
                interpreter,
            });
        }
        Commands::Parse { file } => parse::run(file),
        Commands::Lex { file } => lex::run(file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_flags() {
        let args = Args::parse_from(["tarn", "run", "main.tarn", "-vv", "--max-depth", "50"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.max_depth, 50);
        assert!(matches!(args.command, Some(Commands::Run { .. })));
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["tarn"]);
        assert_eq!(args.verbose, 0);
        assert_eq!(args.max_depth, DEFAULT_MAX_DEPTH);
        assert!(args.command.is_none());
    }
}
