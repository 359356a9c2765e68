use std::{iter::Peekable, str::Chars};
use thiserror::Error;

/// Enum representing lexer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Invalid number format: {0}")]
    InvalidNumber(String),
    #[error("Invalid escape sequence: \\{0}")]
    InvalidEscape(char),
    #[error("Unterminated string escape sequence")]
    UnterminatedEscape,
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid keyword: only contains colon")]
    BareKeyword,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// (
    LParen,
    /// )
    RParen,
    /// '
    Apos,
    /// `
    Backtick,
    /// ,
    Unquote,
    /// @ directly after a `,`
    UnquoteSplicing,
    /// #{
    HashStart,
    /// }
    HashEnd,
    /// finite number literal
    Number(f64),
    /// double-quoted string, escapes already resolved
    Str(String),
    /// `:name`, the colon is kept
    Keyword(String),
    /// Any other group of symbol characters
    Symbol(String),
}

impl Token {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn kw(s: &str) -> Self {
        Self::Keyword(s.to_owned())
    }

    pub fn str(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

/// ASCII only, other letters are rejected.
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+-*/<>=!?._%".contains(c)
}

struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().peekable(),
            tokens: vec![],
        }
    }

    /// Lookahead past the current character.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool, buf: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            buf.push(c);
            self.chars.next();
        }
    }

    fn skip_comment(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();
        if self.chars.peek() == Some(&'-') {
            text.push('-');
            self.chars.next();
        }
        self.take_while(|c| c.is_ascii_digit() || c == '.', &mut text);
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Token::Number(n)),
            _ => Err(LexError::InvalidNumber(text)),
        }
    }

    fn read_string(&mut self) -> Result<Token, LexError> {
        // opening quote
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LexError::UnterminatedString),
                Some('"') => return Ok(Token::Str(text)),
                Some('\\') => {
                    let escaped = match self.chars.next() {
                        None => return Err(LexError::UnterminatedEscape),
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => return Err(LexError::InvalidEscape(other)),
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_keyword(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();
        // the colon
        self.chars.next();
        text.push(':');
        self.take_while(is_symbol_char, &mut text);
        if text.len() == 1 {
            return Err(LexError::BareKeyword);
        }
        Ok(Token::Keyword(text))
    }

    fn read_symbol(&mut self) -> Token {
        let mut text = String::new();
        self.take_while(is_symbol_char, &mut text);
        Token::Symbol(text)
    }

    fn single(&mut self, token: Token) {
        self.chars.next();
        self.tokens.push(token);
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(&c) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                ';' => self.skip_comment(),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '\'' => self.single(Token::Apos),
                '`' => self.single(Token::Backtick),
                '#' if self.peek_second() == Some('{') => {
                    self.chars.next();
                    self.single(Token::HashStart);
                }
                '}' => self.single(Token::HashEnd),
                ',' => {
                    self.single(Token::Unquote);
                    if self.chars.peek() == Some(&'@') {
                        self.single(Token::UnquoteSplicing);
                    }
                }
                c if c.is_ascii_digit() => {
                    let tok = self.read_number()?;
                    self.tokens.push(tok);
                }
                '-' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    let tok = self.read_number()?;
                    self.tokens.push(tok);
                }
                '"' => {
                    let tok = self.read_string()?;
                    self.tokens.push(tok);
                }
                ':' => {
                    let tok = self.read_keyword()?;
                    self.tokens.push(tok);
                }
                c if is_symbol_char(c) => {
                    let tok = self.read_symbol();
                    self.tokens.push(tok);
                }
                other => return Err(LexError::UnexpectedChar(other)),
            }
        }
        Ok(self.tokens)
    }
}

/// Turns source text into a flat token sequence.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}
