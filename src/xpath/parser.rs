/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::BooleanOp;
use super::CompareOp;
use super::Expr;
use super::Location;
use super::Predicate;
use super::error::BadXPath;
use super::error::description;
use super::functions::Function;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Star,
    At,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Name(String),
    Str(String),
    Number(usize),
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, BadXPath> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos: usize = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'/') {
                    pos += 1;
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            b'*' => Token::Star,
            b'@' => Token::At,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            b'=' => Token::Eq,
            b'!' => {
                if bytes.get(pos + 1) != Some(&b'=') {
                    return Err(BadXPath {
                        description: description::UNEXPECTED_CHAR,
                        position: pos,
                    });
                }
                pos += 1;
                Token::Ne
            }
            b'\'' | b'"' => {
                let Some(len) = bytes[pos + 1..].iter().position(|b| *b == c) else {
                    return Err(BadXPath {
                        description: description::UNTERMINATED_STRING,
                        position: pos,
                    });
                };
                let value = &text[pos + 1..pos + 1 + len];
                pos += len + 1;
                Token::Str(value.to_string())
            }
            b'0'..=b'9' => {
                let mut end = pos + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let number = text[pos..end].parse::<usize>().map_err(|_| BadXPath {
                    description: description::BAD_INDEX,
                    position: pos,
                })?;
                pos = end - 1;
                Token::Number(number)
            }
            _ if is_name_start(c) => {
                let mut end = pos + 1;
                while end < bytes.len() && is_name_char(bytes[end]) {
                    end += 1;
                }
                let name = &text[pos..end];
                pos = end - 1;
                Token::Name(name.to_string())
            }
            _ => {
                return Err(BadXPath {
                    description: description::UNEXPECTED_CHAR,
                    position: pos,
                });
            }
        };
        tokens.push((token, start));
        pos += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    current: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        match self.tokens.get(self.current) {
            Some((_, position)) => *position,
            None => self.end,
        }
    }

    fn error(&self, description: &'static str) -> BadXPath {
        BadXPath {
            description,
            position: self.position(),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).map(|(token, _)| token.clone());
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, description: &'static str) -> Result<(), BadXPath> {
        if self.accept(token) {
            Ok(())
        } else {
            Err(self.error(description))
        }
    }

    fn parse_location(&mut self) -> Result<Location, BadXPath> {
        let deep = match self.peek() {
            Some(Token::Slash) => false,
            Some(Token::DoubleSlash) => true,
            _ => return Err(self.error(description::EXPECTED_STEP)),
        };
        self.current += 1;

        let name = match self.peek() {
            Some(Token::Name(name)) => Some(name.clone()),
            Some(Token::Star) => None,
            _ => return Err(self.error(description::EXPECTED_NAME)),
        };
        self.current += 1;

        let mut predicates = Vec::new();
        while self.accept(&Token::LBracket) {
            predicates.push(self.parse_predicate()?);
            self.expect(&Token::RBracket, description::EXPECTED_BRACKET)?;
        }

        let child = match self.peek() {
            None => None,
            Some(_) => Some(Box::new(self.parse_location()?)),
        };

        Ok(Location {
            deep,
            name,
            predicates,
            child,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, BadXPath> {
        if let Some(Token::Number(index)) = self.peek() {
            if *index == 0 {
                return Err(self.error(description::BAD_INDEX));
            }
            let index = *index;
            self.current += 1;
            return Ok(Predicate::Index(index));
        }
        Ok(Predicate::Expr(self.parse_expr()?))
    }

    fn parse_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Name(name)) if name == "and" => BooleanOp::And,
                Some(Token::Name(name)) if name == "or" => BooleanOp::Or,
                _ => return Ok(lhs),
            };
            self.current += 1;
            let rhs = self.parse_factor()?;
            lhs = Expr::Boolean(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn parse_factor(&mut self) -> Result<Expr, BadXPath> {
        if self.accept(&Token::LParen) {
            let expr = self.parse_expr()?;
            self.expect(&Token::RParen, description::EXPECTED_PAREN)?;
            return Ok(expr);
        }
        let lhs = self.parse_value()?;
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Equal,
            Some(Token::Ne) => CompareOp::NotEqual,
            _ => return Ok(lhs),
        };
        self.current += 1;
        let rhs = self.parse_value()?;
        Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_value(&mut self) -> Result<Expr, BadXPath> {
        let position = self.position();
        match self.next() {
            Some(Token::At) => match self.next() {
                Some(Token::Name(name)) if name == "xmlns" => Ok(Expr::Namespace),
                Some(Token::Name(name)) => Ok(Expr::Attribute(name)),
                _ => Err(BadXPath {
                    description: description::EXPECTED_ATTRIBUTE,
                    position,
                }),
            },
            Some(Token::Str(value)) => Ok(Expr::Literal(value)),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                let Some(function) = Function::lookup(&name) else {
                    return Err(BadXPath {
                        description: description::UNKNOWN_FUNCTION,
                        position,
                    });
                };
                self.current += 1;
                let mut args = Vec::new();
                if !self.accept(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.accept(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen, description::EXPECTED_PAREN)?;
                        break;
                    }
                }
                if args.len() != function.arity() {
                    return Err(BadXPath {
                        description: description::WRONG_ARGUMENT_COUNT,
                        position,
                    });
                }
                Ok(Expr::Call(function, args))
            }
            _ => Err(BadXPath {
                description: description::EXPECTED_VALUE,
                position,
            }),
        }
    }
}

/// Compiles query text into a chain of locations.
pub(super) fn compile(text: &str) -> Result<Location, BadXPath> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(BadXPath {
            description: description::EMPTY_QUERY,
            position: 0,
        });
    }
    let mut parser = Parser {
        tokens,
        current: 0,
        end: text.len(),
    };
    parser.parse_location()
}
