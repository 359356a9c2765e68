//! Keeps the recursive parser and evaluator off the end of the thread stack.
//!
//! How deep a program may go is decided by [`crate::parser::MAX_NESTING`] and
//! the evaluator's `max_depth`. This module only makes sure the host stack is
//! never what runs out first.

/// Headroom a recursive step needs before it is moved to a fresh segment.
const MIN_HEADROOM: usize = 128 * 1024;

/// Size of each segment allocated once the headroom is gone.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(step: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(MIN_HEADROOM, SEGMENT_SIZE, step)
}

#[cfg(test)]
mod tests {
    use crate::{parser, Interpreter};
    use std::thread;

    /// Runs `f` on a thread whose own stack is far too small for it.
    fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        thread::Builder::new()
            .stack_size(1024 * 1024)
            .spawn(f)
            .expect("spawn test thread")
            .join()
            .expect("test thread panicked")
    }

    #[test]
    fn deep_evaluation_grows_the_stack() {
        let result = on_small_stack(|| {
            Interpreter::default()
                .eval(
                    "(defn count-down (n) (if (= n 0) :done (count-down (- n 1))))
                     (count-down 2000)",
                )
                .map(|val| val.to_string())
                .map_err(|err| err.to_string())
        });
        assert_eq!(result, Ok(":done".to_owned()));
    }

    #[test]
    fn parsing_at_the_nesting_limit_grows_the_stack() {
        let parsed = on_small_stack(|| {
            let depth = parser::MAX_NESTING;
            let code = format!("{}{}", "(".repeat(depth), ")".repeat(depth));
            parser::parse_source(&code).is_ok()
        });
        assert!(parsed);
    }

    #[test]
    fn deep_quasiquote_grows_the_stack() {
        let result = on_small_stack(|| {
            let depth = parser::MAX_NESTING - 1;
            let code = format!("`{}{}", "(".repeat(depth), ")".repeat(depth));
            Interpreter::default()
                .eval(&code)
                .map(|val| val.is_list())
                .map_err(|err| err.to_string())
        });
        assert_eq!(result, Ok(true));
    }
}
