//! Recursive descent parser from Swail source to AST values.
//!
//! ```text
//! file        := NEWLINE* (statement NEWLINE+)* statement? NEWLINE*
//! statement   := headered | expression
//! headered    := dotted_name NAME arg_list (":" NEWLINE INDENT file DEDENT)?
//! expression  := callable arg_list*
//! callable    := dotted_name | INTEGER | TEXT | "(" expression ")"
//! arg_list    := "(" (expression ("," expression)* ","?)? ")"
//! dotted_name := NAME ("." NAME)*
//! ```

use gc_arena::Mutation;

use crate::{
    ast::{Expression, Statement},
    lexer::{layout, Lexeme, LexerError, Span, Token},
    num::Integer,
    world::{
        cons_list::List,
        value::{Value, ValuePtr},
    },
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: Box<str>,
    },
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("malformed integer literal {0}")]
    BadInteger(Box<str>),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// Parses a whole source file into a list of statement values.
pub fn parse<'gc>(mc: &Mutation<'gc>, source: &str) -> Result<List<'gc>, ParseError> {
    let lexemes = layout(source).map_err(|(error, span)| ParseError {
        kind: error.into(),
        span,
    })?;
    let mut parser = Parser {
        mc,
        lexemes,
        position: 0,
        end: source.len(),
    };
    let statements = parser.file()?;
    match parser.peek() {
        None => Ok(statements),
        Some(_) => Err(parser.unexpected("a statement")),
    }
}

struct Parser<'a, 'gc> {
    mc: &'a Mutation<'gc>,
    lexemes: Vec<(Lexeme, Span)>,
    position: usize,
    end: usize,
}

impl<'a, 'gc> Parser<'a, 'gc> {
    fn peek(&self) -> Option<&Lexeme> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Lexeme> {
        self.lexemes
            .get(self.position + offset)
            .map(|(lexeme, _)| lexeme)
    }

    fn next(&mut self) -> Option<(Lexeme, Span)> {
        let next = self.lexemes.get(self.position).cloned();
        if next.is_some() {
            self.position += 1;
        }
        next
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.lexemes.get(self.position) {
            Some((lexeme, span)) => ParseError {
                kind: ParseErrorKind::UnexpectedToken {
                    expected,
                    found: lexeme.to_string().into(),
                },
                span: span.clone(),
            },
            None => ParseError {
                kind: ParseErrorKind::UnexpectedEnd(expected),
                span: self.end..self.end,
            },
        }
    }

    /// Consumes the next lexeme if it is `expected`.
    fn eat(&mut self, expected: &Lexeme) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Lexeme, description: &'static str) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    fn name(&mut self, description: &'static str) -> Result<Box<str>, ParseError> {
        match self.peek() {
            Some(Lexeme::Token(Token::Name(name))) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(description)),
        }
    }

    fn file(&mut self) -> Result<List<'gc>, ParseError> {
        let mut statements = vec![];
        loop {
            while self.eat(&Lexeme::Newline) {}
            if matches!(self.peek(), None | Some(Lexeme::Dedent)) {
                break;
            }
            statements.push(self.statement()?);
            if !matches!(self.peek(), None | Some(Lexeme::Newline | Lexeme::Dedent)) {
                return Err(self.unexpected("a newline"));
            }
        }
        Ok(List::from_values(self.mc, &statements))
    }

    /// Whether a dotted name followed by another name starts here.
    fn at_headered(&self) -> bool {
        let name = |offset| matches!(self.peek_at(offset), Some(Lexeme::Token(Token::Name(_))));
        if !name(0) {
            return false;
        }
        let mut offset = 1;
        while self.peek_at(offset) == Some(&Lexeme::Token(Token::Dot)) && name(offset + 1) {
            offset += 2;
        }
        name(offset)
    }

    fn statement(&mut self) -> Result<ValuePtr<'gc>, ParseError> {
        if self.at_headered() {
            return self.headered();
        }
        let expression = self.expression()?;
        Ok(Statement::expression(self.mc, expression))
    }

    fn headered(&mut self) -> Result<ValuePtr<'gc>, ParseError> {
        let header = self.dotted_name()?;
        let name = self.name("a declared name")?;
        let args = self.arg_list()?;
        let body = if self.eat(&Lexeme::Token(Token::Colon)) {
            self.expect(Lexeme::Newline, "a newline")?;
            self.expect(Lexeme::Indent, "an indented block")?;
            let body = self.file()?;
            self.expect(Lexeme::Dedent, "the end of the block")?;
            body
        } else {
            List::empty()
        };
        Ok(Statement::declaration(
            self.mc,
            header,
            Value::text(self.mc, name),
            args,
            body,
        ))
    }

    fn dotted_name(&mut self) -> Result<List<'gc>, ParseError> {
        let mut parts = vec![Value::text(self.mc, self.name("a name")?)];
        while self.eat(&Lexeme::Token(Token::Dot)) {
            parts.push(Value::text(self.mc, self.name("an attribute name")?));
        }
        Ok(List::from_values(self.mc, &parts))
    }

    fn expression(&mut self) -> Result<ValuePtr<'gc>, ParseError> {
        let mut expression = self.callable()?;
        while self.peek() == Some(&Lexeme::Token(Token::LParen)) {
            let args = self.arg_list()?;
            expression = Expression::apply(self.mc, expression, args);
        }
        Ok(expression)
    }

    fn callable(&mut self) -> Result<ValuePtr<'gc>, ParseError> {
        match self.peek() {
            Some(Lexeme::Token(Token::Name(_))) => {
                let name = self.dotted_name()?;
                Ok(Expression::name_access(self.mc, name))
            }
            Some(Lexeme::Token(Token::LParen)) => {
                self.position += 1;
                let expression = self.expression()?;
                self.expect(Lexeme::Token(Token::RParen), "`)`")?;
                Ok(expression)
            }
            Some(Lexeme::Token(Token::Integer(_) | Token::Text(_))) => match self.next() {
                Some((Lexeme::Token(Token::Integer(digits)), span)) => {
                    let integer = Integer::from_decimal(&digits).map_err(|_| ParseError {
                        kind: ParseErrorKind::BadInteger(digits.clone()),
                        span,
                    })?;
                    Ok(Expression::from_int(self.mc, integer))
                }
                Some((Lexeme::Token(Token::Text(text)), _)) => {
                    Ok(Expression::base_value(self.mc, Value::text(self.mc, text)))
                }
                _ => Err(self.unexpected("an expression")),
            },
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn arg_list(&mut self) -> Result<List<'gc>, ParseError> {
        self.expect(Lexeme::Token(Token::LParen), "`(`")?;
        let mut args = vec![];
        while !self.eat(&Lexeme::Token(Token::RParen)) {
            args.push(self.expression()?);
            if !self.eat(&Lexeme::Token(Token::Comma)) {
                self.expect(Lexeme::Token(Token::RParen), "`,` or `)`")?;
                break;
            }
        }
        Ok(List::from_values(self.mc, &args))
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{parse, ParseErrorKind};
    use crate::{
        ast::{dotted_name, Expression, Statement},
        lexer::LexerError,
        test_util::with_mutation,
        world::{
            cons_list::List,
            value::{values_equal, Value},
        },
    };

    #[test]
    fn calls_and_literals() {
        with_mutation(|mc| {
            let statements = parse(mc, "print(\"hi\", 37, a.b)\n\n").unwrap();
            let expected = Statement::expression(
                mc,
                Expression::apply(
                    mc,
                    Expression::dotted(mc, &["print"]),
                    List::from_values(
                        mc,
                        &[
                            Expression::base_value(mc, Value::text(mc, "hi")),
                            Expression::from_int(mc, 37),
                            Expression::dotted(mc, &["a", "b"]),
                        ],
                    ),
                ),
            );
            check!(statements.length() == 1);
            check!(values_equal(statements.head().unwrap(), expected));
        });
    }

    #[test]
    fn chained_application() {
        with_mutation(|mc| {
            let statements = parse(mc, "f(1)()\n(g)(2,)").unwrap();
            let first = Statement::expression(
                mc,
                Expression::apply(
                    mc,
                    Expression::apply(
                        mc,
                        Expression::dotted(mc, &["f"]),
                        List::singleton(mc, Expression::from_int(mc, 1)),
                    ),
                    List::empty(),
                ),
            );
            let second = Statement::expression(
                mc,
                Expression::apply(
                    mc,
                    Expression::dotted(mc, &["g"]),
                    List::singleton(mc, Expression::from_int(mc, 2)),
                ),
            );
            check!(statements.equals(List::from_values(mc, &[first, second])));
        });
    }

    #[test]
    fn declarations() {
        with_mutation(|mc| {
            let source = "def greet(name):\n    print(name)\n    name\nstruct.thing empty()\n";
            let statements = parse(mc, source).unwrap();
            let greet = Statement::declaration(
                mc,
                dotted_name(mc, &["def"]),
                Value::text(mc, "greet"),
                List::singleton(mc, Expression::dotted(mc, &["name"])),
                List::from_values(
                    mc,
                    &[
                        Statement::expression(
                            mc,
                            Expression::apply(
                                mc,
                                Expression::dotted(mc, &["print"]),
                                List::singleton(mc, Expression::dotted(mc, &["name"])),
                            ),
                        ),
                        Statement::expression(mc, Expression::dotted(mc, &["name"])),
                    ],
                ),
            );
            let empty = Statement::declaration(
                mc,
                dotted_name(mc, &["struct", "thing"]),
                Value::text(mc, "empty"),
                List::empty(),
                List::empty(),
            );
            check!(statements.equals(List::from_values(mc, &[greet, empty])));
        });
    }

    #[test]
    fn nested_blocks() {
        with_mutation(|mc| {
            let source = "def outer():\n  def inner():\n    pass\n  inner\nouter()()";
            let statements = parse(mc, source).unwrap();
            check!(statements.length() == 2);
            let outer = statements.head().unwrap();
            let body = outer.borrow().get(mc, "body").unwrap();
            let body = body.borrow().as_list().unwrap();
            check!(body.length() == 2);
            let inner = body.head().unwrap();
            check!(inner.borrow().name() == "declaration");
        });
    }

    #[test]
    fn empty_sources() {
        with_mutation(|mc| {
            check!(parse(mc, "").unwrap().is_empty());
            check!(parse(mc, "# only a comment\n\n").unwrap().is_empty());
        });
    }

    #[test]
    fn errors() {
        with_mutation(|mc| {
            let_assert!(Err(error) = parse(mc, "print(1"));
            check!(error.kind == ParseErrorKind::UnexpectedToken {
                expected: "`,` or `)`",
                found: "newline".into()
            });

            let_assert!(Err(error) = parse(mc, "a b"));
            let_assert!(ParseErrorKind::UnexpectedToken { expected: "`(`", .. } = error.kind);
            check!(error.span == (3..3));

            let_assert!(Err(error) = parse(mc, "f() g()"));
            let_assert!(ParseErrorKind::UnexpectedToken { expected: "a newline", .. } = error.kind);
            check!(error.span == (4..5));

            let_assert!(Err(error) = parse(mc, "def f():\nx"));
            let_assert!(ParseErrorKind::UnexpectedToken { expected: "an indented block", .. } = error.kind);

            let_assert!(Err(error) = parse(mc, "  x\n    y\n  z\n"));
            check!(error.kind == ParseErrorKind::Lexer(LexerError::InconsistentDedent(2)));

            let_assert!(Err(error) = parse(mc, ")"));
            let_assert!(ParseErrorKind::UnexpectedToken { expected: "an expression", .. } = error.kind);
        });
    }
}
