//! Lexing of Swail source.
//!
//! [`Token`] is the flat token stream produced by [`logos`]. Swail blocks are delimited
//! by indentation, so [`layout`] turns line endings into [`Lexeme::Newline`],
//! [`Lexeme::Indent`] and [`Lexeme::Dedent`] the way the parser expects them.

use core::fmt;

pub use logos::Span;
use logos::{Lexer, Logos};

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("malformed string")]
    MalformedString,
    #[error("invalid Unicode codepoint: {0}")]
    InvalidCodepoint(u32),
    #[error("dedent to column {0} does not match any enclosing block")]
    InconsistentDedent(usize),
}

// reads hex escapes in the form `x[0-9a-fA-F]+;` and outputs the corresponding character
fn read_hex_escape(
    iter: &mut std::iter::Peekable<impl Iterator<Item = char>>,
) -> Result<char, LexerError> {
    // consume the x
    let _ = iter.next();

    let mut char_code = 0u32;
    while let Some(digit) = iter.peek().and_then(|c| c.to_digit(16)) {
        char_code = char_code
            .checked_mul(16)
            .and_then(|code| code.checked_add(digit))
            .ok_or(LexerError::MalformedString)?;
        _ = iter.next();
    }
    if iter.next() != Some(';') {
        return Err(LexerError::MalformedString);
    }
    char::from_u32(char_code).ok_or(LexerError::InvalidCodepoint(char_code))
}

fn process_string(lexer: &mut Lexer<Token>) -> Result<Box<str>, LexerError> {
    let slice = lexer.slice();
    // strip the quotes
    let mut chars = slice[1..slice.len() - 1].chars().peekable();
    let mut string = String::new();

    while let Some(c) = chars.next() {
        if c != '\\' {
            string.push(c);
            continue;
        }
        match chars.peek() {
            Some('x' | 'X') => string.push(read_hex_escape(&mut chars)?),
            Some(escape) => {
                string.push(match escape {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '\\' => '\\',
                    '"' => '"',
                    _ => return Err(LexerError::MalformedString),
                });
                _ = chars.next(); // consume
            }
            None => return Err(LexerError::MalformedString),
        }
    }

    Ok(Box::from(string.as_str()))
}

/// Width of the indentation that follows the last line break of the slice
fn indentation(lexer: &mut Lexer<Token>) -> usize {
    lexer
        .slice()
        .rsplit('\n')
        .next()
        .map_or(0, |indent| indent.chars().count())
}

#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\r\n]*")]
pub enum Token {
    /// One or more line breaks, carrying the indentation of the line after them
    #[regex(r"(\r?\n[ \t\f]*)+", indentation)]
    LineEnding(usize),
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |l| Box::from(l.slice()))]
    Name(Box<str>),
    #[regex(r"-?[0-9]+", |l| Box::from(l.slice()))]
    Integer(Box<str>),
    #[regex(r#""([^\\"\r\n]|\\[^\r\n])*""#, process_string)]
    Text(Box<str>),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineEnding(_) => write!(f, "line break"),
            Self::LParen => write!(f, "`(`"),
            Self::RParen => write!(f, "`)`"),
            Self::Comma => write!(f, "`,`"),
            Self::Dot => write!(f, "`.`"),
            Self::Colon => write!(f, "`:`"),
            Self::Name(name) => write!(f, "`{name}`"),
            Self::Integer(digits) => write!(f, "`{digits}`"),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// What the parser consumes: tokens plus the block structure implied by indentation
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Token(Token),
    /// end of a logical line
    Newline,
    Indent,
    Dedent,
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(token) => token.fmt(f),
            Self::Newline => write!(f, "newline"),
            Self::Indent => write!(f, "indent"),
            Self::Dedent => write!(f, "dedent"),
        }
    }
}

/// Lexes `source` and resolves its indentation.
///
/// Line breaks inside parentheses are ignored. Blank lines and comment lines produce
/// nothing. Every dedent is followed by a newline, since it also ends the line that
/// opened the block. At the end of input the current line is ended and all open
/// blocks are closed.
pub fn layout(source: &str) -> Result<Vec<(Lexeme, Span)>, (LexerError, Span)> {
    let mut lexemes = vec![];
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut pending: Option<(usize, Span)> = None;

    for (token, span) in Token::lexer(source).spanned() {
        let token = token.map_err(|error| (error, span.clone()))?;
        match token {
            Token::LineEnding(_) if depth > 0 => continue,
            Token::LineEnding(width) => {
                pending = Some((width, span));
                continue;
            }
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }

        if let Some((width, span)) = pending.take() {
            // leading blank lines do not end anything
            if !lexemes.is_empty() {
                lexemes.push((Lexeme::Newline, span.clone()));
                let current = indents.last().copied().unwrap_or(0);
                if width > current {
                    indents.push(width);
                    lexemes.push((Lexeme::Indent, span));
                } else {
                    while indents.last().is_some_and(|&indent| width < indent) {
                        indents.pop();
                        lexemes.push((Lexeme::Dedent, span.clone()));
                        lexemes.push((Lexeme::Newline, span.clone()));
                    }
                    if indents.last() != Some(&width) {
                        return Err((LexerError::InconsistentDedent(width), span));
                    }
                }
            }
        }
        lexemes.push((Lexeme::Token(token), span));
    }

    if !lexemes.is_empty() {
        let end = source.len()..source.len();
        lexemes.push((Lexeme::Newline, end.clone()));
        for _ in 1..indents.len() {
            lexemes.push((Lexeme::Dedent, end.clone()));
            lexemes.push((Lexeme::Newline, end.clone()));
        }
    }
    Ok(lexemes)
}
