//! Recursive-descent parser over the token stream, producing an [`Expr`]
//! tree. Precedence climbs: ternary, or, and, equality, relational,
//! additive, multiplicative, unary, postfix (field/index/method), primary.

use super::ast::{BinaryOp, Expr, Span, UnaryOp};
use super::lexer::{Lexer, Tok, Token};
use crate::error::{ApexError, ExpressionErrorKind, Result};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses `src` into an [`Expr`]. Errors are reported as
/// [`ApexError::Expression`] carrying the offending span.
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = Lexer::new(src)
        .tokenize()
        .map_err(|(msg, span)| expr_err(msg, span))?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    parser.expect_eof()?;
    Ok(expr)
}

fn expr_err(message: impl Into<String>, span: Span) -> ApexError {
    ApexError::Expression {
        kind: ExpressionErrorKind::ParseError,
        message: message.into(),
        span_start: span.start,
        span_end: span.end,
    }
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if matches!(self.peek(), Tok::Eof) {
            Ok(())
        } else {
            Err(expr_err(
                format!("unexpected trailing token {:?}", self.peek()),
                self.peek_span(),
            ))
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_or()?;
        if self.eat(&Tok::Question) {
            let when_true = self.parse_ternary()?;
            if !self.eat(&Tok::Colon) {
                return Err(expr_err("expected ':' in ternary expression", self.peek_span()));
            }
            let when_false = self.parse_ternary()?;
            let span = cond.span().merge(when_false.span());
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
                span,
            })
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.parse_and()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.parse_equality()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinaryOp::Eq,
                Tok::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Tok::Bang => {
                let start = self.peek_span();
                self.advance();
                let expr = self.parse_unary()?;
                let span = start.merge(expr.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::Minus => {
                let start = self.peek_span();
                self.advance();
                let expr = self.parse_unary()?;
                let span = start.merge(expr.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.advance();
                    let name_tok = self.advance();
                    let Tok::Ident(name) = name_tok.tok else {
                        return Err(expr_err("expected identifier after '.'", name_tok.span));
                    };
                    if matches!(self.peek(), Tok::LParen) {
                        self.advance();
                        let mut args = Vec::new();
                        if !matches!(self.peek(), Tok::RParen) {
                            loop {
                                args.push(self.parse_ternary()?);
                                if !self.eat(&Tok::Comma) {
                                    break;
                                }
                            }
                        }
                        let end = self.peek_span();
                        if !self.eat(&Tok::RParen) {
                            return Err(expr_err("expected ')' after method arguments", end));
                        }
                        let span = expr.span().merge(end);
                        expr = Expr::MethodCall {
                            base: Box::new(expr),
                            method: name,
                            args,
                            span,
                        };
                    } else {
                        let span = expr.span().merge(name_tok.span);
                        expr = Expr::FieldAccess {
                            base: Box::new(expr),
                            field: name,
                            span,
                        };
                    }
                }
                Tok::LBracket => {
                    self.advance();
                    let index = self.parse_ternary()?;
                    let end = self.peek_span();
                    if !self.eat(&Tok::RBracket) {
                        return Err(expr_err("expected ']'", end));
                    }
                    let span = expr.span().merge(end);
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.tok {
            Tok::Null => Ok(Expr::Null),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::Int(i) => Ok(Expr::Int(i)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::String(s) => Ok(Expr::String(s)),
            Tok::Variable(name) => Ok(Expr::Variable(name, token.span)),
            Tok::Ident(name) => Ok(Expr::Identifier(name, token.span)),
            Tok::LParen => {
                let expr = self.parse_ternary()?;
                if !self.eat(&Tok::RParen) {
                    return Err(expr_err("expected ')'", self.peek_span()));
                }
                Ok(expr)
            }
            other => Err(expr_err(format!("unexpected token {other:?}"), token.span)),
        }
    }
}
