//! Recursive-descent parser for cuescript.
//!
//! Grammar (precedence low to high):
//!   script   := expr (';' expr)* ';'? EOF
//!   expr     := or
//!   or       := and ('||' and)*
//!   and      := equality ('&&' equality)*
//!   equality := compare (('==' | '!=') compare)*
//!   compare  := additive (('<' | '<=' | '>' | '>=') additive)*
//!   additive := term (('+' | '-') term)*
//!   term     := unary (('*' | '/') unary)*
//!   unary    := ('-' | '!') unary | postfix
//!   postfix  := primary ('.' ident | '[' expr ']')*
//!   primary  := literal | ident | call | '[' ... ']' | '{' ... '}' | '(' expr ')'
//!
//! Denylisted identifiers (dynamic code evaluation, function
//! definition, host page globals) are rejected here with
//! [`ParseError::Forbidden`] — structurally, so string literals may
//! mention them freely.

use crate::ast::{BinaryOp, Expr, Literal, Script, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{self, Spanned, Token};

/// Identifiers a script may never reference, whatever the host bound.
const FORBIDDEN_IDENTS: &[&str] = &[
    "eval",
    "function",
    "Function",
    "window",
    "document",
    "globalThis",
];

/// Lex and parse a script.
pub fn parse(src: &str) -> Result<Script, ParseError> {
    if src.trim().is_empty() {
        return Err(ParseError::EmptyScript);
    }
    let tokens = lexer::lex(src)?;
    let mut parser = Parser::new(&tokens);
    let script = parser.script()?;
    if script.statements.is_empty() {
        // Comment-only input lexes to bare EOF.
        return Err(ParseError::EmptyScript);
    }
    Ok(script)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {}, got {:?}", what, self.peek())))
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::syntax(self.cur_line(), msg)
    }

    fn script(&mut self) -> Result<Script, ParseError> {
        let mut statements = Vec::new();
        loop {
            // Tolerate stray semicolons between statements.
            while self.eat(&Token::Semi) {}
            if self.peek() == &Token::Eof {
                break;
            }
            statements.push(self.expr()?);
            match self.peek() {
                Token::Semi | Token::Eof => {}
                other => {
                    return Err(self.err(format!("expected ';' or end of script, got {:?}", other)))
                }
            }
        }
        Ok(Script { statements })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.compare()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::Neq => BinaryOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.compare()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn compare(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Lte => BinaryOp::Lte,
                Token::Gt => BinaryOp::Gt,
                Token::Gte => BinaryOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = self.take_ident("field name after '.'")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    field,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.expr()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur_line();
        match self.peek().clone() {
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            Token::Ident(name) => {
                self.check_allowed(&name, line)?;
                self.advance();
                match name.as_str() {
                    "null" => return Ok(Expr::Literal(Literal::Null)),
                    "true" => return Ok(Expr::Literal(Literal::Bool(true))),
                    "false" => return Ok(Expr::Literal(Literal::Bool(false))),
                    _ => {}
                }
                if self.eat(&Token::LParen) {
                    let args = self.call_args()?;
                    return Ok(Expr::Call { name, args, line });
                }
                Ok(Expr::Ident { name, line })
            }
            Token::LParen => {
                self.advance();
                let expr = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = match self.peek().clone() {
                            Token::Ident(name) => {
                                self.advance();
                                name
                            }
                            Token::Str(s) => {
                                self.advance();
                                s
                            }
                            other => {
                                return Err(
                                    self.err(format!("expected object key, got {:?}", other))
                                )
                            }
                        };
                        self.expect(Token::Colon, "':'")?;
                        let value = self.expr()?;
                        entries.push((key, value));
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RBrace, "'}'")?;
                        break;
                    }
                }
                Ok(Expr::Object(entries))
            }
            other => Err(self.err(format!("unexpected token {:?}", other))),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen, "')'")?;
            break;
        }
        Ok(args)
    }

    fn take_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err(format!("expected {}, got {:?}", what, other))),
        }
    }

    fn check_allowed(&self, name: &str, line: u32) -> Result<(), ParseError> {
        if FORBIDDEN_IDENTS.contains(&name) {
            return Err(ParseError::forbidden(line, name));
        }
        Ok(())
    }
}
