use crate::value::Value;

use super::lexer::{Lexer, Spanned, Token};
use super::{BinaryOp, Expr, SyntaxError, UnaryOp};

const PREFIX_BP: u8 = 15;

/// Parse a formatted expression into an [`Expr`] tree.
pub(super) fn parse(src: &str) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    if parser.at(&Token::Eof) {
        return Err(SyntaxError::new("empty expression", 0));
    }
    let expr = parser.expression(0)?;
    if !parser.at(&Token::Eof) {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn infix_bp(token: &Token) -> Option<(u8, u8)> {
    let Token::Punct(p) = token else { return None };
    Some(match *p {
        "?" => (2, 1),
        "||" => (3, 4),
        "&&" => (5, 6),
        "==" | "!=" | "===" | "!==" => (7, 8),
        "<" | "<=" | ">" | ">=" => (9, 10),
        "+" | "-" => (11, 12),
        "*" | "/" | "%" => (13, 14),
        _ => return None,
    })
}

fn binary_op(p: &str) -> Option<BinaryOp> {
    Some(match p {
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "===" => BinaryOp::StrictEq,
        "!==" => BinaryOp::StrictNe,
        "&&" => BinaryOp::And,
        "||" => BinaryOp::Or,
        _ => return None,
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |s| s.offset)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if matches!(self.peek(), Token::Punct(q) if *q == p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), SyntaxError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{p}`")))
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.offset())
    }

    // ── Pratt loop ────────────────────────────────────────────────────────

    fn expression(&mut self, min_bp: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.prefix()?;

        loop {
            lhs = match self.peek() {
                Token::Punct(".") => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(name) => Expr::Member(Box::new(lhs), name),
                        _ => return Err(self.error("expected property name after `.`")),
                    }
                }
                Token::Punct("[") => {
                    self.advance();
                    let index = self.expression(0)?;
                    self.expect_punct("]")?;
                    Expr::Index(Box::new(lhs), Box::new(index))
                }
                Token::Punct("(") => {
                    return Err(self.error("function calls are not supported"));
                }
                token => {
                    let Some((l_bp, r_bp)) = infix_bp(token) else { break };
                    if l_bp < min_bp {
                        break;
                    }
                    let Token::Punct(op) = self.advance() else { break };
                    if op == "?" {
                        let then = self.expression(0)?;
                        self.expect_punct(":")?;
                        let otherwise = self.expression(r_bp)?;
                        Expr::Conditional(Box::new(lhs), Box::new(then), Box::new(otherwise))
                    } else {
                        let rhs = self.expression(r_bp)?;
                        let op = binary_op(op).ok_or_else(|| self.error("unknown operator"))?;
                        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
                    }
                }
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, SyntaxError> {
        let offset = self.offset();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(word) => self.word(word, offset),
            Token::Punct("(") => {
                let inner = self.expression(0)?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Token::Punct("[") => self.array(),
            Token::Punct("{") => self.object(),
            Token::Punct(p @ ("!" | "-" | "+")) => {
                let op = match p {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Neg,
                    _ => UnaryOp::Plus,
                };
                let operand = self.expression(PREFIX_BP)?;
                Ok(Expr::Unary(op, Box::new(operand)))
            }
            Token::Eof => Err(SyntaxError::new("unexpected end of expression", offset)),
            Token::Punct(p) => Err(SyntaxError::new(format!("unexpected `{p}`"), offset)),
        }
    }

    fn word(&mut self, word: String, offset: usize) -> Result<Expr, SyntaxError> {
        let literal = match word.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            "typeof" => {
                let operand = self.expression(PREFIX_BP)?;
                return Ok(Expr::Unary(UnaryOp::TypeOf, Box::new(operand)));
            }
            "context" => return self.context_lookup().map(Expr::Field),
            _ => {
                return Err(SyntaxError::new(
                    format!("`{word}` is not supported in template expressions"),
                    offset,
                ));
            }
        };
        Ok(Expr::Literal(literal))
    }

    /// The remainder of `context['name']` after the `context` keyword.
    fn context_lookup(&mut self) -> Result<String, SyntaxError> {
        self.expect_punct("[")?;
        let Token::Str(name) = self.advance() else {
            return Err(self.error("expected field name in context lookup"));
        };
        self.expect_punct("]")?;
        Ok(name)
    }

    fn array(&mut self) -> Result<Expr, SyntaxError> {
        let mut items = Vec::new();
        while !self.eat_punct("]") {
            items.push(self.expression(0)?);
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }

    fn object(&mut self) -> Result<Expr, SyntaxError> {
        let mut entries = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.advance() {
                Token::Str(s) => s,
                Token::Number(n) => Value::Number(n).to_string(),
                Token::Ident(word) if word == "context" => self.context_lookup()?,
                Token::Ident(word) => word,
                _ => return Err(self.error("expected object key")),
            };
            self.expect_punct(":")?;
            entries.push((key, self.expression(0)?));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Box<Expr> {
        Box::new(Expr::Field(name.into()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Number(n)))
    }

    // ── precedence ────────────────────────────────────────────────────────

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                num(1.0),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2.0), num(3.0)))
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, num(1.0), num(2.0))),
                num(3.0)
            )
        );
    }

    #[test]
    fn conditional_is_right_associative() {
        let e = parse("context['a'] ? 1 : context['b'] ? 2 : 3").unwrap();
        let Expr::Conditional(cond, _, otherwise) = e else { panic!("expected conditional") };
        assert_eq!(cond, field("a"));
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn unary_binds_tighter_than_logical_operators() {
        assert_eq!(
            parse("!context['a'] && context['b']").unwrap(),
            Expr::Binary(BinaryOp::And, Box::new(Expr::Unary(UnaryOp::Not, field("a"))), field("b"))
        );
    }

    // ── postfix ───────────────────────────────────────────────────────────

    #[test]
    fn member_and_index_chain() {
        assert_eq!(
            parse("context['a'].b[0]").unwrap(),
            Expr::Index(Box::new(Expr::Member(field("a"), "b".into())), num(0.0))
        );
    }

    #[test]
    fn typeof_applies_to_postfix_expression() {
        assert_eq!(
            parse("typeof context['a'].b").unwrap(),
            Expr::Unary(UnaryOp::TypeOf, Box::new(Expr::Member(field("a"), "b".into())))
        );
    }

    // ── literals ──────────────────────────────────────────────────────────

    #[test]
    fn object_keys_read_back_from_context_lookups() {
        assert_eq!(
            parse("{context['a']: 1, 'b': 2, c: 3}").unwrap(),
            Expr::Object(vec![
                ("a".into(), *num(1.0)),
                ("b".into(), *num(2.0)),
                ("c".into(), *num(3.0)),
            ])
        );
    }

    #[test]
    fn arrays_allow_trailing_comma() {
        assert_eq!(parse("[1, 2,]").unwrap(), Expr::Array(vec![*num(1.0), *num(2.0)]));
        assert_eq!(parse("[]").unwrap(), Expr::Array(vec![]));
    }

    // ── rejections ────────────────────────────────────────────────────────

    #[test]
    fn calls_are_rejected() {
        let err = parse("context['f'](1)").unwrap_err();
        assert!(err.message.contains("function calls"));
    }

    #[test]
    fn unknown_globals_are_rejected() {
        assert!(parse("Math.max").is_err());
        assert!(parse("this").is_err());
    }

    #[test]
    fn malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("context.a").is_err());
    }
}
