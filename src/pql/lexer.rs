//! PQL lexer
//!
//! Tokenizes raw query text into an ordered token stream. Identifiers are
//! dot-notation aware (`attributes.color` lexes as one identifier), strings
//! accept single or double quotes, and numeric literals may carry a leading
//! minus sign.

use std::fmt;

use crate::pql::error::{SyntaxError, SyntaxResult};

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Like,
    In,
    Exists,
    Between,
    Fuzzy,
    SoundsLike,
    SearchFields,
    Order,
    By,
    Score,
    Asc,
    Desc,

    // Operators
    Eq,   // =
    NotEq, // != or <>
    Lt,   // <
    LtEq, // <=
    Gt,   // >
    GtEq, // >=

    // Punctuation
    Star,   // *
    Comma,  // ,
    LParen, // (
    RParen, // )
    Caret,  // ^

    // Literals
    Identifier(String),
    StringLit(String),
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Select => write!(f, "SELECT"),
            Token::From => write!(f, "FROM"),
            Token::Where => write!(f, "WHERE"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::Like => write!(f, "LIKE"),
            Token::In => write!(f, "IN"),
            Token::Exists => write!(f, "EXISTS"),
            Token::Between => write!(f, "BETWEEN"),
            Token::Fuzzy => write!(f, "FUZZY"),
            Token::SoundsLike => write!(f, "SOUNDS_LIKE"),
            Token::SearchFields => write!(f, "SEARCH_FIELDS"),
            Token::Order => write!(f, "ORDER"),
            Token::By => write!(f, "BY"),
            Token::Score => write!(f, "SCORE"),
            Token::Asc => write!(f, "ASC"),
            Token::Desc => write!(f, "DESC"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::Star => write!(f, "*"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Caret => write!(f, "^"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::IntLit(n) => write!(f, "{}", n),
            Token::FloatLit(n) => write!(f, "{}", n),
            Token::BoolLit(b) => write!(f, "{}", b),
            Token::Eof => write!(f, "<end of input>"),
        }
    }
}

/// A token together with its character offset in the input
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: usize,
}

/// Lexer for PQL query text
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer over the given input
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the full input, including a trailing Eof token
    pub fn tokenize(input: &str) -> SyntaxResult<Vec<SpannedToken>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let spanned = lexer.next_token()?;
            let at_end = spanned.token == Token::Eof;
            tokens.push(spanned);
            if at_end {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        self.position += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier, consuming dot-separated segments as one token
    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else if ch == '.'
                && self
                    .peek_next()
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
            {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Read a quoted string literal, handling backslash escapes
    fn read_string(&mut self, quote: char, start: usize) -> SyntaxResult<String> {
        self.advance(); // opening quote
        let mut result = String::new();

        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(result),
                Some('\\') => match self.advance() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some('\\') => result.push('\\'),
                    Some(c) => result.push(c),
                    None => {
                        return Err(SyntaxError::new("Unterminated string literal", start));
                    }
                },
                Some(ch) => result.push(ch),
                None => {
                    return Err(SyntaxError::new("Unterminated string literal", start));
                }
            }
        }
    }

    /// Read an integer or float literal, optional leading minus already allowed
    fn read_number(&mut self, start: usize) -> SyntaxResult<Token> {
        let mut num_str = String::new();
        let mut has_dot = false;

        if self.peek() == Some('-') {
            num_str.push('-');
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_next().is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::FloatLit)
                .map_err(|_| SyntaxError::new(format!("Invalid number '{}'", num_str), start))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::IntLit)
                .map_err(|_| SyntaxError::new(format!("Invalid number '{}'", num_str), start))
        }
    }

    /// Produce the next token
    fn next_token(&mut self) -> SyntaxResult<SpannedToken> {
        self.skip_whitespace();
        let start = self.position;

        let token = match self.peek() {
            None => Token::Eof,
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('^') => {
                self.advance();
                Token::Caret
            }
            Some('=') => {
                self.advance();
                Token::Eq
            }
            Some('!') => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::NotEq
                } else {
                    return Err(SyntaxError::new("Unrecognized character '!'", start));
                }
            }
            Some('<') => {
                self.advance();
                match self.peek() {
                    Some('=') => {
                        self.advance();
                        Token::LtEq
                    }
                    // MySQL accepts both spellings of not-equal
                    Some('>') => {
                        self.advance();
                        Token::NotEq
                    }
                    _ => Token::Lt,
                }
            }
            Some('>') => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            Some(quote @ ('\'' | '"')) => {
                let s = self.read_string(quote, start)?;
                Token::StringLit(s)
            }
            Some(ch)
                if ch.is_ascii_digit()
                    || (ch == '-' && self.peek_next().is_some_and(|c| c.is_ascii_digit())) =>
            {
                self.read_number(start)?
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                keyword_or_identifier(ident)
            }
            Some(ch) => {
                self.advance();
                return Err(SyntaxError::new(
                    format!("Unrecognized character '{}'", ch),
                    start,
                ));
            }
        };

        Ok(SpannedToken {
            token,
            position: start,
        })
    }
}

/// Map a raw identifier to a keyword token where applicable
fn keyword_or_identifier(ident: String) -> Token {
    match ident.to_uppercase().as_str() {
        "SELECT" => Token::Select,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "LIKE" => Token::Like,
        "IN" => Token::In,
        "EXISTS" => Token::Exists,
        "BETWEEN" => Token::Between,
        "FUZZY" => Token::Fuzzy,
        "SOUNDS_LIKE" => Token::SoundsLike,
        "SEARCH_FIELDS" => Token::SearchFields,
        "ORDER" => Token::Order,
        "BY" => Token::By,
        "SCORE" => Token::Score,
        "ASC" => Token::Asc,
        "DESC" => Token::Desc,
        "TRUE" => Token::BoolLit(true),
        "FALSE" => Token::BoolLit(false),
        _ => Token::Identifier(ident),
    }
}
