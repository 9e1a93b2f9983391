//! Recursive-descent parser implementing the §4.2 grammar exactly:
//!
//! ```text
//! expr      = or_expr
//! or_expr   = and_expr  ( "OR"  and_expr )*
//! and_expr  = not_expr  ( ("AND"|ε) not_expr )*
//! not_expr  = "!" not_expr | atom
//! atom      = group | attr_term | term
//! group     = "(" expr ")"
//! attr_term = ident  op  value
//! ```

use crate::error::CatalogError;

use super::ast::{AttrTerm, Expr};
use super::lexer::{tokenize, Token};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<Expr, CatalogError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CatalogError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CatalogError> {
        let mut lhs = self.parse_not()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    let rhs = self.parse_not()?;
                    lhs = Expr::And(Box::new(lhs), Box::new(rhs));
                }
                // adjacent terms imply AND
                Some(Token::LParen | Token::Bang | Token::Ident(_) | Token::Str(_)) => {
                    let rhs = self.parse_not()?;
                    lhs = Expr::And(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, CatalogError> {
        if matches!(self.peek(), Some(Token::Bang)) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, CatalogError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(CatalogError::syntax("expected closing ')'")),
                }
            }
            Some(Token::Ident(ident)) => {
                if let Some(Token::Op(op)) = self.peek().cloned() {
                    self.advance();
                    let value = self.parse_value()?;
                    Ok(Expr::Attr(AttrTerm { ident, op, value }))
                } else {
                    Ok(Expr::Term(ident))
                }
            }
            Some(Token::Str(s)) => Ok(Expr::Term(s)),
            other => Err(CatalogError::syntax(format!(
                "unexpected token in query: {other:?}"
            ))),
        }
    }

    fn parse_value(&mut self) -> Result<String, CatalogError> {
        match self.advance() {
            Some(Token::Ident(s)) | Some(Token::Str(s)) => Ok(s),
            // `AND`/`OR` spelled exactly as the keyword can still appear as
            // a value after an operator (e.g. `label=AND`); accept them.
            Some(Token::And) => Ok("AND".to_string()),
            Some(Token::Or) => Ok("OR".to_string()),
            other => Err(CatalogError::syntax(format!(
                "expected a value after operator, found {other:?}"
            ))),
        }
    }
}

/// Parse a query string into an [`Expr`]. An empty (or whitespace-only)
/// query has no AST — callers should treat that case as "match
/// everything" before calling this, per §4.1's `Find` semantics.
pub fn parse(input: &str) -> Result<Expr, CatalogError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CatalogError::syntax("empty query"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(CatalogError::syntax(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::ast::Op;

    #[test]
    fn parses_implicit_and() {
        let e = parse("tag:go owner:team-a").unwrap();
        assert!(matches!(e, Expr::And(_, _)));
    }

    #[test]
    fn precedence_not_and_or() {
        // !a AND (b OR c) parses with precedence (!a) AND (b OR c)
        let e = parse("!a AND (b OR c)").unwrap();
        match e {
            Expr::And(lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Not(_)));
                assert!(matches!(*rhs, Expr::Or(_, _)));
            }
            _ => panic!("expected AND at top level: {e:?}"),
        }
    }

    #[test]
    fn attr_term_with_operator() {
        let e = parse("name~^pay.*").unwrap();
        match e {
            Expr::Attr(AttrTerm { ident, op, value }) => {
                assert_eq!(ident, "name");
                assert_eq!(op, Op::Regex);
                assert_eq!(value, "^pay.*");
            }
            _ => panic!("expected attr term"),
        }
    }

    #[test]
    fn parse_format_parse_is_structurally_stable() {
        // Parse, print the AST back to source via `Display`, reparse, and
        // compare the two trees — a real exercise of the printed form,
        // not just parser determinism on an unchanged string.
        let e1 = parse("owner:team-a AND (tag:go OR lifecycle:experimental)").unwrap();
        let printed = e1.to_string();
        let e2 = parse(&printed).unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn parse_format_parse_round_trips_negated_group() {
        let e1 = parse("!a AND (b OR c)").unwrap();
        let e2 = parse(&e1.to_string()).unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn parse_format_parse_round_trips_quoted_keyword_term() {
        let e1 = parse("'AND' OR name:foo").unwrap();
        let e2 = parse(&e1.to_string()).unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn unbalanced_group_is_syntax_error() {
        assert!(parse("(a AND b").is_err());
    }

    #[test]
    fn empty_query_is_syntax_error() {
        assert!(parse("   ").is_err());
    }
}
