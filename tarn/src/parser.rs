// recursive descent over a token slice, every step hands back the unparsed rest
use crate::{
    lexer::{self, LexError, Token},
    stack::ensure_sufficient_stack,
    value::Value,
};
use thiserror::Error;

/// Enum representing parser errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Unterminated list: missing closing parenthesis")]
    UnclosedList,
    #[error("Unterminated hash map")]
    UnclosedHash,
    #[error("Unexpected end of input")]
    UnexpectedEOF,
    #[error("Unexpected closing parenthesis")]
    UnexpectedRParen,
    #[error("Unexpected }}")]
    UnexpectedHashEnd,
    #[error("Unexpected unquote-splicing")]
    UnexpectedSplice,
    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Deepest list, hash or quote nesting a program may have.
pub const MAX_NESTING: usize = 1_000;

type PResult<'tok, T, E = ParseError> = Result<(T, &'tok [Token]), E>;

/// module dedicated to parsing a singular expression
mod single_expr {
    use super::*;

    #[derive(Error, Debug, Clone)]
    /// implementation error representing `parse` errors
    pub enum Error {
        #[error("Empty slice!")]
        EmptySlice,
        #[error(transparent)]
        ParseErr(#[from] ParseError),
    }

    impl Error {
        pub fn on_empty(self, slice_alt: ParseError) -> ParseError {
            match self {
                Error::EmptySlice => slice_alt,
                Error::ParseErr(e) => e,
            }
        }
    }

    /// What a single step produced.
    pub enum Parsed {
        Expr(Value),
        RParen,
        HashEnd,
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Closer {
        Paren,
        Brace,
    }

    /// Recursively parse the tokens until a [`Value`] is parsed,
    /// a closing delimiter is hit or an error occurs
    pub fn parse(tokens: &[Token], depth: usize) -> PResult<Parsed, Error> {
        ensure_sufficient_stack(|| parse_inner(tokens, depth))
    }

    fn deeper(depth: usize) -> Result<usize, ParseError> {
        if depth >= MAX_NESTING {
            Err(ParseError::TooDeep(MAX_NESTING))
        } else {
            Ok(depth + 1)
        }
    }

    /// One full expression, a closing delimiter here is an error.
    pub fn expr(tokens: &[Token], depth: usize) -> PResult<Value> {
        let (res, rest) = parse(tokens, depth).map_err(|e| e.on_empty(ParseError::UnexpectedEOF))?;
        match res {
            Parsed::Expr(exp) => Ok((exp, rest)),
            Parsed::RParen => Err(ParseError::UnexpectedRParen),
            Parsed::HashEnd => Err(ParseError::UnexpectedHashEnd),
        }
    }

    fn parse_inner(tokens: &[Token], depth: usize) -> PResult<Parsed, Error> {
        let (first, mut rest) = tokens.split_first().ok_or(Error::EmptySlice)?;
        let result = match first {
            Token::RParen => Parsed::RParen,
            Token::HashEnd => Parsed::HashEnd,
            Token::Number(n) => Parsed::Expr(Value::num(*n)),
            Token::Str(s) => Parsed::Expr(Value::str(s.as_str())),
            Token::Keyword(k) => Parsed::Expr(Value::kw(k)),
            Token::Symbol(s) => Parsed::Expr(Value::sym(s)),
            Token::LParen => {
                let (items, r) = parse_seq(rest, Closer::Paren, deeper(depth)?)?;
                rest = r;
                Parsed::Expr(Value::new_list(items))
            }
            Token::HashStart => {
                let (items, r) = parse_seq(rest, Closer::Brace, deeper(depth)?)?;
                rest = r;
                Parsed::Expr(hash_literal(items)?)
            }
            Token::Apos => return wrap("quote", rest, deeper(depth)?),
            Token::Backtick => return wrap("quasiquote", rest, deeper(depth)?),
            Token::Unquote => {
                let depth = deeper(depth)?;
                return match rest.split_first() {
                    Some((Token::UnquoteSplicing, after)) => wrap("unquote-splicing", after, depth),
                    _ => wrap("unquote", rest, depth),
                };
            }
            Token::UnquoteSplicing => return Err(ParseError::UnexpectedSplice.into()),
        };
        Ok((result, rest))
    }

    /// `'x` style prefix: `(name x)`
    fn wrap<'tok>(
        name: &str,
        tokens: &'tok [Token],
        depth: usize,
    ) -> PResult<'tok, Parsed, Error> {
        let (exp, rest) = expr(tokens, depth)?;
        Ok((
            Parsed::Expr(Value::new_list(vec![Value::sym(name), exp])),
            rest,
        ))
    }

    /// `#{ k v ... }` becomes `(make-hash (list k v ...))`, keeping source order.
    fn hash_literal(items: Vec<Value>) -> Result<Value, ParseError> {
        if items.len() % 2 != 0 {
            return Err(ParseError::UnexpectedHashEnd);
        }
        let mut pairs = Vec::with_capacity(items.len() + 1);
        pairs.push(Value::sym("list"));
        pairs.extend(items);
        Ok(Value::new_list(vec![
            Value::sym("make-hash"),
            Value::new_list(pairs),
        ]))
    }

    fn parse_seq(mut tokens: &[Token], closer: Closer, depth: usize) -> PResult<Vec<Value>> {
        let unclosed = match closer {
            Closer::Paren => ParseError::UnclosedList,
            Closer::Brace => ParseError::UnclosedHash,
        };
        let mut items: Vec<Value> = vec![];
        loop {
            let (parsed, rest) = parse(tokens, depth).map_err(|e| e.on_empty(unclosed.clone()))?;
            match parsed {
                Parsed::Expr(exp) => items.push(exp),
                Parsed::RParen if closer == Closer::Paren => return Ok((items, rest)),
                Parsed::HashEnd if closer == Closer::Brace => return Ok((items, rest)),
                Parsed::RParen => return Err(ParseError::UnexpectedRParen),
                Parsed::HashEnd => return Err(ParseError::UnexpectedHashEnd),
            }
            tokens = rest;
        }
    }
}

/// Parses exactly one expression off the front of `tokens`.
///
/// Nesting past [`MAX_NESTING`] fails with [`ParseError::TooDeep`], so a tree
/// that parses can also be printed, compared and dropped.
pub fn parse_tokens(tokens: &[Token]) -> PResult<Value> {
    single_expr::expr(tokens, 0)
}

/// Parses every top-level expression in order.
pub fn parse_all(tokens: &[Token]) -> Result<Vec<Value>, ParseError> {
    let mut expressions = vec![];
    let mut unparsed: &[Token] = tokens;

    while !unparsed.is_empty() {
        let (exp, rest) = parse_tokens(unparsed)?;
        expressions.push(exp);
        unparsed = rest;
    }

    Ok(expressions)
}

/// Parses a whole program into one rooted tree.
///
/// No expressions give an empty list, a single one is returned as is,
/// several are wrapped in `(begin ...)`.
pub fn parse(tokens: &[Token]) -> Result<Value, ParseError> {
    let mut expressions = parse_all(tokens)?;
    Ok(match expressions.len() {
        0 => Value::new_list(vec![]),
        1 => expressions.swap_remove(0),
        _ => {
            expressions.insert(0, Value::sym("begin"));
            Value::new_list(expressions)
        }
    })
}

pub fn parse_source(source: &str) -> Result<Value, ParseError> {
    parse(&lexer::tokenize(source)?)
}

pub fn parse_script(source: &str) -> Result<Vec<Value>, ParseError> {
    parse_all(&lexer::tokenize(source)?)
}
