//! Recursive-descent parser.
//!
//! Precedence, loosest first: `|`, `&`, comparisons, `+ -`, `* / %`,
//! prefix `- ! ~`, `**` (right associative), atoms.

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::ExpressionError;

pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((token, position)) => Err(ExpressionError::UnexpectedToken {
            found: token.text(),
            expected: "end of expression",
            position: *position,
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, wanted: Token, expected: &'static str) -> Result<(), ExpressionError> {
        match self.advance() {
            Some((token, _)) if token == wanted => Ok(()),
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                found: token.text(),
                expected,
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd { expected }),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            let right = self.and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.comparison()?;
        while self.peek() == Some(&Token::Amp) {
            self.pos += 1;
            let right = self.comparison()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Self::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Plus) => None,
            _ => return self.power(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(match op {
            Some(op) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            None => operand,
        })
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::StarStar) {
            self.pos += 1;
            // Right associative, and the exponent may carry a sign.
            let exponent = self.unary()?;
            return Ok(Self::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let expected = "a number, variable, function call or '('";
        let Some((token, position)) = self.advance() else {
            return Err(ExpressionError::UnexpectedEnd { expected });
        };
        match token {
            Token::Number(value) => Ok(Expr::Literal(value)),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let function = Function::from_name(&name)
                    .ok_or_else(|| ExpressionError::UnknownFunction { name: name.clone() })?;
                let mut args = vec![self.or()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.or()?);
                }
                self.expect(Token::RParen, "')'")?;
                if args.len() != 1 {
                    return Err(ExpressionError::WrongArity {
                        name,
                        found: args.len(),
                    });
                }
                Ok(Expr::Call {
                    function,
                    argument: Box::new(args.remove(0)),
                })
            }
            Token::Ident(name) => Ok(Expr::Variable(name)),
            other => Err(ExpressionError::UnexpectedToken {
                found: other.text(),
                expected,
                position,
            }),
        }
    }
}
