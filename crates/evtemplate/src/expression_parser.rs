/*
 * expression_parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser for the expression language.
//!
//! Precedence, loosest first:
//!
//! | level          | operators                                              |
//! |----------------|--------------------------------------------------------|
//! | disjunction    | `or`                                                   |
//! | conjunction    | `and`                                                  |
//! | comparison     | `=` `<>` `<` `<=` `>` `>=` `like` `in` `is null` (+ `not` forms) |
//! | additive       | `+` `-`                                                |
//! | multiplicative | `*` `/` `%`                                            |
//! | power          | `^` (right-associative)                                |
//! | unary          | `not` `-`                                              |
//!
//! Keywords are case-insensitive.

use crate::ast::{
    ArrayElement, BinaryOp, BuiltinProperty, Expr, ObjectMember, UnaryOp, WildcardKind,
};
use crate::error::{TemplateError, TemplateResult};
use crate::lexer::{Lexer, Token, TokenKind};
use evtemplate_events::Scalar;

/// Parse a standalone expression, requiring the whole input to be consumed.
pub fn parse_expression(source: &str) -> TemplateResult<Expr> {
    let mut parser = ExpressionParser::new(source, 0)?;
    let expr = parser.parse_expression()?;
    match &parser.current().kind {
        TokenKind::Eof => Ok(expr),
        other => Err(TemplateError::parse(
            format!("unexpected {} after expression", other.describe()),
            parser.current().start,
        )),
    }
}

pub struct ExpressionParser<'s> {
    lexer: Lexer<'s>,
    current: Token,
}

impl<'s> ExpressionParser<'s> {
    pub fn new(source: &'s str, start: usize) -> TemplateResult<Self> {
        let mut lexer = Lexer::new(source, start);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// The one-token lookahead. After [`Self::parse_expression`] returns, this is
    /// the first token that is not part of the expression.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Consume the lookahead and return it.
    pub fn advance(&mut self) -> TemplateResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> TemplateResult<Token> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(self.unexpected(&format!("expected {}", kind.describe())))
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> TemplateResult<Token> {
        if self.current.is_keyword(keyword) {
            self.advance()
        } else {
            Err(self.unexpected(&format!("expected `{}`", keyword)))
        }
    }

    pub(crate) fn accept_keyword(&mut self, keyword: &str) -> TemplateResult<bool> {
        if self.current.is_keyword(keyword) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn unexpected(&self, expectation: &str) -> TemplateError {
        TemplateError::parse(
            format!(
                "{}, found {}",
                expectation,
                self.current.kind.describe()
            ),
            self.current.start,
        )
    }

    pub fn parse_expression(&mut self) -> TemplateResult<Expr> {
        self.parse_or()
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr, ci: bool, position: usize) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            case_insensitive: ci,
            position,
        }
    }

    fn parse_or(&mut self) -> TemplateResult<Expr> {
        let mut left = self.parse_and()?;
        while self.current.is_keyword("or") {
            let position = self.advance()?.start;
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right, false, position);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> TemplateResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.current.is_keyword("and") {
            let position = self.advance()?.start;
            let right = self.parse_comparison()?;
            left = Self::binary(BinaryOp::And, left, right, false, position);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> TemplateResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let position = self.current.start;
            let op = match self.current.kind {
                TokenKind::Equal => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessOrEqual => BinaryOp::LessOrEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterOrEqual => BinaryOp::GreaterOrEqual,
                _ if self.current.is_keyword("like") => BinaryOp::Like,
                _ if self.current.is_keyword("in") => BinaryOp::In,
                _ if self.current.is_keyword("not") => {
                    self.advance()?;
                    if self.current.is_keyword("like") {
                        BinaryOp::NotLike
                    } else if self.current.is_keyword("in") {
                        BinaryOp::NotIn
                    } else {
                        return Err(self.unexpected("expected `like` or `in` after `not`"));
                    }
                }
                _ if self.current.is_keyword("is") => {
                    self.advance()?;
                    let op = if self.accept_keyword("not")? {
                        UnaryOp::IsNotNull
                    } else {
                        UnaryOp::IsNull
                    };
                    self.expect_keyword("null")?;
                    left = Expr::Unary {
                        op,
                        operand: Box::new(left),
                    };
                    continue;
                }
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_additive()?;
            let ci = self.accept_keyword("ci")?;
            left = Self::binary(op, left, right, ci, position);
        }
    }

    fn parse_additive(&mut self) -> TemplateResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            let position = self.advance()?.start;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right, false, position);
        }
    }

    fn parse_multiplicative(&mut self) -> TemplateResult<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            let position = self.advance()?.start;
            let right = self.parse_power()?;
            left = Self::binary(op, left, right, false, position);
        }
    }

    fn parse_power(&mut self) -> TemplateResult<Expr> {
        let base = self.parse_unary()?;
        if self.current.kind == TokenKind::Caret {
            let position = self.advance()?.start;
            let exponent = self.parse_power()?;
            return Ok(Self::binary(
                BinaryOp::Power,
                base,
                exponent,
                false,
                position,
            ));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> TemplateResult<Expr> {
        if self.current.is_keyword("not") {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.current.kind == TokenKind::Minus {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Expr::Constant(Scalar::Int(n)) if n != i64::MIN => Expr::Constant(Scalar::Int(-n)),
                Expr::Constant(Scalar::Float(n)) => Expr::Constant(Scalar::Float(-n)),
                operand => Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> TemplateResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let token = self.advance()?;
                    let TokenKind::Identifier(name) = token.kind else {
                        return Err(TemplateError::parse(
                            format!("expected a member name, found {}", token.kind.describe()),
                            token.start,
                        ));
                    };
                    expr = Expr::Member {
                        target: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let wildcard = match self.current.kind {
                        TokenKind::Question => Some(WildcardKind::Any),
                        TokenKind::Star => Some(WildcardKind::All),
                        _ => None,
                    };
                    expr = match wildcard {
                        Some(kind) => {
                            self.advance()?;
                            Expr::Wildcard {
                                target: Box::new(expr),
                                kind,
                            }
                        }
                        None => Expr::Indexer {
                            target: Box::new(expr),
                            index: Box::new(self.parse_expression()?),
                        },
                    };
                    self.expect(TokenKind::RBracket)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> TemplateResult<Expr> {
        let token = self.current.clone();
        match token.kind {
            TokenKind::Integer(n) => {
                self.advance()?;
                Ok(Expr::Constant(Scalar::Int(n)))
            }
            TokenKind::Float(n) => {
                self.advance()?;
                Ok(Expr::Constant(Scalar::Float(n)))
            }
            TokenKind::String(s) => {
                self.advance()?;
                Ok(Expr::Constant(Scalar::String(s)))
            }
            TokenKind::Builtin(name) => {
                self.advance()?;
                BuiltinProperty::from_name(&name)
                    .map(Expr::Builtin)
                    .ok_or_else(|| {
                        TemplateError::parse(
                            format!("`@{}` is not a recognized built-in property", name),
                            token.start,
                        )
                    })
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::Identifier(name) => {
                if name.eq_ignore_ascii_case("true") {
                    self.advance()?;
                    return Ok(Expr::Constant(Scalar::Bool(true)));
                }
                if name.eq_ignore_ascii_case("false") {
                    self.advance()?;
                    return Ok(Expr::Constant(Scalar::Bool(false)));
                }
                if name.eq_ignore_ascii_case("null") {
                    self.advance()?;
                    return Ok(Expr::Constant(Scalar::Null));
                }
                if name.eq_ignore_ascii_case("if") {
                    return self.parse_conditional();
                }
                self.advance()?;
                if self.current.kind == TokenKind::LParen {
                    return self.parse_call(name, token.start);
                }
                Ok(Expr::Property(name))
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_conditional(&mut self) -> TemplateResult<Expr> {
        self.expect_keyword("if")?;
        let condition = self.parse_expression()?;
        self.expect_keyword("then")?;
        let consequent = self.parse_expression()?;
        let alternative = if self.accept_keyword("else")? {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            consequent: Box::new(consequent),
            alternative,
        })
    }

    fn parse_call(&mut self, name: String, position: usize) -> TemplateResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.current.kind != TokenKind::RParen {
            loop {
                args.push(self.parse_expression()?);
                if self.current.kind != TokenKind::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RParen)?;
        let case_insensitive = self.accept_keyword("ci")?;
        Ok(Expr::Call {
            name,
            args,
            case_insensitive,
            position,
        })
    }

    fn parse_array(&mut self) -> TemplateResult<Expr> {
        self.expect(TokenKind::LBracket)?;
        let mut elements = Vec::new();
        if self.current.kind != TokenKind::RBracket {
            loop {
                if self.current.kind == TokenKind::DotDot {
                    self.advance()?;
                    elements.push(ArrayElement::Spread(self.parse_expression()?));
                } else {
                    elements.push(ArrayElement::Item(self.parse_expression()?));
                }
                if self.current.kind != TokenKind::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::Array(elements))
    }

    fn parse_object(&mut self) -> TemplateResult<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        if self.current.kind != TokenKind::RBrace {
            loop {
                members.push(self.parse_object_member()?);
                if self.current.kind != TokenKind::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::Object(members))
    }

    fn parse_object_member(&mut self) -> TemplateResult<ObjectMember> {
        if self.current.kind == TokenKind::DotDot {
            self.advance()?;
            return Ok(ObjectMember::Spread(self.parse_expression()?));
        }

        let token = self.advance()?;
        let (name, shorthand) = match token.kind {
            TokenKind::Identifier(name) => {
                let value = Expr::Property(name.clone());
                (name, Some(value))
            }
            TokenKind::Builtin(name) => {
                let builtin = BuiltinProperty::from_name(&name).ok_or_else(|| {
                    TemplateError::parse(
                        format!("`@{}` is not a recognized built-in property", name),
                        token.start,
                    )
                })?;
                (builtin.token().to_string(), Some(Expr::Builtin(builtin)))
            }
            TokenKind::String(name) => (name, None),
            other => {
                return Err(TemplateError::parse(
                    format!("expected a member name, found {}", other.describe()),
                    token.start,
                ));
            }
        };

        if self.current.kind == TokenKind::Colon {
            self.advance()?;
            let value = self.parse_expression()?;
            return Ok(ObjectMember::Property { name, value });
        }

        match shorthand {
            Some(value) => Ok(ObjectMember::Property { name, value }),
            None => Err(self.unexpected("expected `:` after a quoted member name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prop(name: &str) -> Box<Expr> {
        Box::new(Expr::Property(name.into()))
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Constant(Scalar::Int(n)))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("A + 2 * 3 = 7 and not B").unwrap();
        let expected = Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Equal,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: prop("A"),
                    right: Box::new(Expr::Binary {
                        op: BinaryOp::Multiply,
                        left: int(2),
                        right: int(3),
                        case_insensitive: false,
                        position: 6,
                    }),
                    case_insensitive: false,
                    position: 2,
                }),
                right: int(7),
                case_insensitive: false,
                position: 10,
            }),
            right: Box::new(Expr::Unary {
                op: UnaryOp::Not,
                operand: prop("B"),
            }),
            case_insensitive: false,
            position: 14,
        };
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_expression("2 ^ 3 ^ 2").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Power);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Power, .. }));
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(
            parse_expression("-5").unwrap(),
            Expr::Constant(Scalar::Int(-5))
        );
    }

    #[test]
    fn test_is_null_and_not_forms() {
        assert_eq!(
            parse_expression("A is not null").unwrap(),
            Expr::Unary {
                op: UnaryOp::IsNotNull,
                operand: prop("A"),
            }
        );
        assert!(matches!(
            parse_expression("A not like 'x%'").unwrap(),
            Expr::Binary {
                op: BinaryOp::NotLike,
                ..
            }
        ));
        assert!(matches!(
            parse_expression("A NOT IN [1, 2]").unwrap(),
            Expr::Binary {
                op: BinaryOp::NotIn,
                ..
            }
        ));
    }

    #[test]
    fn test_call_with_ci() {
        assert_eq!(
            parse_expression("StartsWith(Name, 'a') ci").unwrap(),
            Expr::Call {
                name: "StartsWith".into(),
                args: vec![
                    Expr::Property("Name".into()),
                    Expr::Constant(Scalar::String("a".into())),
                ],
                case_insensitive: true,
                position: 0,
            }
        );
    }

    #[test]
    fn test_operator_ci() {
        assert!(matches!(
            parse_expression("A = 'x' ci").unwrap(),
            Expr::Binary {
                op: BinaryOp::Equal,
                case_insensitive: true,
                ..
            }
        ));
    }

    #[test]
    fn test_accessors_and_wildcards() {
        assert_eq!(
            parse_expression("Items[?].Name").unwrap(),
            Expr::Member {
                target: Box::new(Expr::Wildcard {
                    target: prop("Items"),
                    kind: WildcardKind::Any,
                }),
                name: "Name".into(),
            }
        );
        assert_eq!(
            parse_expression("@p['a b'][0]").unwrap(),
            Expr::Indexer {
                target: Box::new(Expr::Indexer {
                    target: Box::new(Expr::Builtin(BuiltinProperty::Properties)),
                    index: Box::new(Expr::Constant(Scalar::String("a b".into()))),
                }),
                index: int(0),
            }
        );
    }

    #[test]
    fn test_object_literal_shorthand_and_spread() {
        assert_eq!(
            parse_expression("{@t, Name, 'x y': 1, ..@p}").unwrap(),
            Expr::Object(vec![
                ObjectMember::Property {
                    name: "@t".into(),
                    value: Expr::Builtin(BuiltinProperty::Timestamp),
                },
                ObjectMember::Property {
                    name: "Name".into(),
                    value: Expr::Property("Name".into()),
                },
                ObjectMember::Property {
                    name: "x y".into(),
                    value: Expr::Constant(Scalar::Int(1)),
                },
                ObjectMember::Spread(Expr::Builtin(BuiltinProperty::Properties)),
            ])
        );
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(
            parse_expression("[1, ..Rest]").unwrap(),
            Expr::Array(vec![
                ArrayElement::Item(Expr::Constant(Scalar::Int(1))),
                ArrayElement::Spread(Expr::Property("Rest".into())),
            ])
        );
        assert_eq!(parse_expression("[]").unwrap(), Expr::Array(vec![]));
    }

    #[test]
    fn test_conditional() {
        assert_eq!(
            parse_expression("if A then 1 else 2").unwrap(),
            Expr::Conditional {
                condition: prop("A"),
                consequent: int(1),
                alternative: Some(int(2)),
            }
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            parse_expression("TRUE").unwrap(),
            Expr::Constant(Scalar::Bool(true))
        );
        assert!(matches!(
            parse_expression("a OR b").unwrap(),
            Expr::Binary { op: BinaryOp::Or, .. }
        ));
    }

    #[test]
    fn test_errors() {
        assert!(parse_expression("@nope").is_err());
        assert!(parse_expression("A +").is_err());
        assert!(parse_expression("(A").is_err());
        let err = parse_expression("A B").unwrap_err();
        assert_eq!(err.position(), 2);
    }
}
