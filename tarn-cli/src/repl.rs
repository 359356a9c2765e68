use tarn::{eval, interpreter};
use rustyline::{history::History, Editor, Helper};

const HISTORY_FILE: &str = ".tarnhistory";

pub fn greet() {
    eprintln!("Welcome to Tarn REPL.")
}

pub type Error = rustyline::error::ReadlineError;

/// What a single line asks the loop to do next.
enum Flow {
    Continue,
    Stop(eval::Signal),
}

fn run_line(ip: &mut interpreter::Interpreter, line: &str) -> Flow {
    if line.trim().is_empty() {
        return Flow::Continue;
    }
    match ip.eval(line) {
        Ok(exp) => println!("{}", exp),
        Err(interpreter::Error::EvalErr(eval::EvalError::Signal(sig))) => return Flow::Stop(sig),
        Err(err) if err.is_fatal() => eprintln!("Fatal -- {}", err),
        Err(err) => eprintln!("Error -- {}", err),
    }
    Flow::Continue
}

fn run_loop<H: Helper, I: History>(
    ip: &mut interpreter::Interpreter,
    editor: &mut Editor<H, I>,
) -> Result<eval::Signal, Error> {
    loop {
        let line = match editor.readline(">> ") {
            Ok(line) => line,
            // ctrl-d leaves like `(exit)`
            Err(Error::Eof) => return Ok(eval::Signal::ExitSignal(0)),
            // ctrl-c drops the current line
            Err(Error::Interrupted) => continue,
            Err(e) => return Err(e),
        };
        if let Flow::Stop(sig) = run_line(ip, &line) {
            return Ok(sig);
        }
    }
}

pub fn run(ip: &mut interpreter::Interpreter) -> Result<eval::Signal, Error> {
    let mut editor = {
        let config = rustyline::Config::builder()
            .auto_add_history(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        rustyline::Editor::<(), _>::with_config(config)?
    };
    _ = editor.load_history(HISTORY_FILE);
    let res = run_loop(ip, &mut editor);
    _ = editor.save_history(HISTORY_FILE);
    res
}
