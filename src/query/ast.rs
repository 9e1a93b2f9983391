//! The query AST. Built by [`super::parser::parse`], walked by
//! [`super::evaluator::Evaluator`], and printed back to source by the
//! `Display` impl below so `parse(expr.to_string())` round-trips to a
//! structurally equivalent tree (§8 "parse → format → parse").

use std::fmt;

/// A single attribute-term operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `:` substring match (case-insensitive).
    Substring,
    /// `=` exact match (case-insensitive).
    Exact,
    /// `~` regular expression match (case-insensitive).
    Regex,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Op::Substring => ':',
            Op::Exact => '=',
            Op::Regex => '~',
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrTerm {
    pub ident: String,
    pub op: Op,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Attr(AttrTerm),
    /// A bare identifier/string: matches against the entity's qname.
    Term(String),
}

/// Characters the lexer treats as token boundaries (`lexer::EXCLUDED`,
/// duplicated here rather than shared since the lexer keeps it private).
const EXCLUDED: &[char] = &['(', ')', '!', ':', '~', '\'', '"', '='];

/// Whether `s` needs quoting to re-lex as the same single `Ident`/`Str`
/// token it was parsed from — i.e. it isn't a valid bare identifier, or
/// it's spelled exactly like an `AND`/`OR` keyword.
fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s == "AND"
        || s == "OR"
        || s.chars().any(|c| c.is_whitespace() || EXCLUDED.contains(&c))
}

/// Quote `s` with whichever of `'`/`"` doesn't appear in it. The grammar
/// has no in-string escape sequence, so a value containing both quote
/// characters can't be re-quoted losslessly; such values are not
/// produced by this crate's accessors and are out of scope here.
fn quoted(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        format!("'{s}'")
    }
}

fn fmt_atom_value(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if needs_quoting(s) {
        write!(f, "{}", quoted(s))
    } else {
        write!(f, "{s}")
    }
}

/// Binding power of each node, used to decide whether a child needs
/// parenthesizing when printed in a given slot. Precedence high→low:
/// atom/attr/term (3), `!` (2), `AND` (1), `OR` (0) — matches §4.2.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Or(..) => 0,
        Expr::And(..) => 1,
        Expr::Not(..) => 2,
        Expr::Attr(_) | Expr::Term(_) => 3,
    }
}

fn fmt_expr(expr: &Expr, min_prec: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let own_prec = precedence(expr);
    let needs_parens = own_prec < min_prec;
    if needs_parens {
        write!(f, "(")?;
    }
    match expr {
        Expr::Or(lhs, rhs) => {
            fmt_expr(lhs, 0, f)?;
            write!(f, " OR ")?;
            fmt_expr(rhs, 1, f)?;
        }
        Expr::And(lhs, rhs) => {
            fmt_expr(lhs, 1, f)?;
            write!(f, " AND ")?;
            fmt_expr(rhs, 2, f)?;
        }
        Expr::Not(inner) => {
            write!(f, "!")?;
            fmt_expr(inner, 2, f)?;
        }
        Expr::Attr(AttrTerm { ident, op, value }) => {
            write!(f, "{ident}{op}")?;
            fmt_atom_value(value, f)?;
        }
        Expr::Term(value) => fmt_atom_value(value, f)?,
    }
    if needs_parens {
        write!(f, ")")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(self, 0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::parser::parse;

    #[test]
    fn formats_simple_attr_term() {
        let e = parse("owner:team-a").unwrap();
        assert_eq!(e.to_string(), "owner:team-a");
    }

    #[test]
    fn formats_and_or_without_redundant_parens() {
        let e = parse("owner:team-a AND (tag:go OR lifecycle:experimental)").unwrap();
        assert_eq!(e.to_string(), "owner:team-a AND (tag:go OR lifecycle:experimental)");
    }

    #[test]
    fn formats_not_over_compound_with_parens() {
        let e = parse("!(a AND b)").unwrap();
        assert_eq!(e.to_string(), "!(a AND b)");
    }

    #[test]
    fn quotes_a_term_spelled_like_a_keyword() {
        let e = parse("'AND'").unwrap();
        assert_eq!(e.to_string(), "'AND'");
    }

    #[test]
    fn quotes_a_value_containing_excluded_characters() {
        let e = parse("rel='component:cache-loader'").unwrap();
        assert_eq!(e.to_string(), "rel='component:cache-loader'");
    }
}
