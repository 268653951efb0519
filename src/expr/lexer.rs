//! Hand-rolled tokenizer for the expression language. Small enough that
//! pulling in a parser-combinator crate would be overkill.

use super::ast::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Null,
    True,
    False,
    Int(i64),
    Float(f64),
    String(String),
    Ident(String),
    Variable(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Question,
    Colon,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, (String, Span)> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                out.push(Token {
                    tok: Tok::Eof,
                    span: Span::new(start, start),
                });
                break;
            };

            let tok = match c {
                '#' => {
                    self.advance();
                    let name = self.read_identifier();
                    Tok::Variable(name)
                }
                c if c.is_ascii_digit() => self.read_number(),
                c if c == '_' || c.is_alphabetic() => {
                    let ident = self.read_identifier();
                    match ident.as_str() {
                        "null" => Tok::Null,
                        "true" => Tok::True,
                        "false" => Tok::False,
                        _ => Tok::Ident(ident),
                    }
                }
                '\'' | '"' => self.read_string(c)?,
                '+' => {
                    self.advance();
                    Tok::Plus
                }
                '-' => {
                    self.advance();
                    Tok::Minus
                }
                '*' => {
                    self.advance();
                    Tok::Star
                }
                '/' => {
                    self.advance();
                    Tok::Slash
                }
                '%' => {
                    self.advance();
                    Tok::Percent
                }
                '(' => {
                    self.advance();
                    Tok::LParen
                }
                ')' => {
                    self.advance();
                    Tok::RParen
                }
                '[' => {
                    self.advance();
                    Tok::LBracket
                }
                ']' => {
                    self.advance();
                    Tok::RBracket
                }
                '.' => {
                    self.advance();
                    Tok::Dot
                }
                ',' => {
                    self.advance();
                    Tok::Comma
                }
                '?' => {
                    self.advance();
                    Tok::Question
                }
                ':' => {
                    self.advance();
                    Tok::Colon
                }
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Tok::NotEq
                    } else {
                        Tok::Bang
                    }
                }
                '=' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Tok::EqEq
                    } else {
                        return Err(("unexpected '='".into(), Span::new(start, self.pos)));
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Tok::Le
                    } else {
                        Tok::Lt
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Tok::Ge
                    } else {
                        Tok::Gt
                    }
                }
                '&' if self.peek_at(1) == Some('&') => {
                    self.advance();
                    self.advance();
                    Tok::AndAnd
                }
                '|' if self.peek_at(1) == Some('|') => {
                    self.advance();
                    self.advance();
                    Tok::OrOr
                }
                other => {
                    return Err((
                        format!("unexpected character '{other}'"),
                        Span::new(start, start + 1),
                    ))
                }
            };

            out.push(Token {
                tok,
                span: Span::new(start, self.pos),
            });
        }
        Ok(out)
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == '_' || c.is_alphanumeric()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_number(&mut self) -> Tok {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            Tok::Float(text.parse().unwrap_or(f64::NAN))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Tok::Int(i),
                Err(_) => Tok::Float(text.parse().unwrap_or(f64::NAN)),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Tok, (String, Span)> {
        let start = self.pos;
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some('\\') => {
                    if let Some(escaped) = self.advance() {
                        s.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                Some(c) => s.push(c),
                None => {
                    return Err((
                        "unterminated string literal".into(),
                        Span::new(start, self.pos),
                    ))
                }
            }
        }
        Ok(Tok::String(s))
    }

    #[allow(dead_code)]
    pub fn source(&self) -> &str {
        self.src
    }
}
