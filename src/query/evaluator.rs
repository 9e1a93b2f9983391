//! Evaluates a parsed query against a single entity (§4.2 "Evaluation",
//! §5 "stateless except for its regex cache").

use std::cell::RefCell;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;

use super::accessors::{builtin, PropertyProvider};
use super::ast::{AttrTerm, Expr, Op};

/// One evaluator per query parse, as §5 expects. Not `Sync` — the regex
/// cache is a plain `RefCell`, matching "cache access is serialised per
/// evaluator. One evaluator per query parse is expected."
pub struct Evaluator {
    regex_cache: RefCell<HashMap<String, Regex>>,
    providers: Vec<Box<dyn PropertyProvider>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator {
            regex_cache: RefCell::new(HashMap::new()),
            providers: Vec::new(),
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(providers: Vec<Box<dyn PropertyProvider>>) -> Self {
        Evaluator {
            regex_cache: RefCell::new(HashMap::new()),
            providers,
        }
    }

    pub fn matches(&self, expr: &Expr, entity: &Entity) -> Result<bool, CatalogError> {
        match expr {
            Expr::Term(value) => Ok(entity
                .qname()
                .to_ascii_lowercase()
                .contains(&value.to_ascii_lowercase())),
            Expr::Not(inner) => Ok(!self.matches(inner, entity)?),
            Expr::And(lhs, rhs) => Ok(self.matches(lhs, entity)? && self.matches(rhs, entity)?),
            Expr::Or(lhs, rhs) => Ok(self.matches(lhs, entity)? || self.matches(rhs, entity)?),
            Expr::Attr(term) => self.matches_attr(term, entity),
        }
    }

    fn matches_attr(&self, term: &AttrTerm, entity: &Entity) -> Result<bool, CatalogError> {
        let values = self.resolve(&term.ident, entity)?;
        for value in &values {
            if self.value_matches(term.op, value, &term.value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn resolve(&self, ident: &str, entity: &Entity) -> Result<Vec<String>, CatalogError> {
        if let Some(values) = builtin(ident, entity) {
            return Ok(values);
        }
        for provider in &self.providers {
            if let Some(values) = provider.resolve(ident, entity) {
                return Ok(values);
            }
        }
        Err(CatalogError::UnknownAttribute(ident.to_string()))
    }

    fn value_matches(&self, op: Op, candidate: &str, pattern: &str) -> Result<bool, CatalogError> {
        match op {
            Op::Substring => Ok(candidate
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase())),
            Op::Exact => Ok(candidate.eq_ignore_ascii_case(pattern)),
            Op::Regex => {
                if let Some(re) = self.regex_cache.borrow().get(pattern) {
                    return Ok(re.is_match(candidate));
                }
                let compiled = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CatalogError::syntax(format!("invalid regex /{pattern}/: {e}")))?;
                let matched = compiled.is_match(candidate);
                self.regex_cache
                    .borrow_mut()
                    .insert(pattern.to_string(), compiled);
                Ok(matched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ComponentEntity;
    use crate::query::parser::parse;
    use crate::reference::{EntityKind, EntityRef};

    fn component(name: &str, owner: &str, lifecycle: &str, tag: &str) -> Entity {
        let mut c = ComponentEntity::default();
        c.metadata.name = name.to_string();
        c.metadata.tags.push(tag.to_string());
        c.lifecycle = Some(lifecycle.to_string());
        c.owner = Some(EntityRef::new(EntityKind::Group, "default", owner));
        Entity::Component(c)
    }

    #[test]
    fn evaluates_compound_query() {
        let e = component("c2", "team-b", "experimental", "go");
        let expr = parse("tag:go AND (owner:team-b OR lifecycle:experimental)").unwrap();
        let ev = Evaluator::new();
        assert!(ev.matches(&expr, &e).unwrap());
    }

    #[test]
    fn regex_cache_reuses_compiled_pattern() {
        let e = component("payments-api", "team-a", "production", "go");
        let expr = parse("name~^pay.*").unwrap();
        let ev = Evaluator::new();
        assert!(ev.matches(&expr, &e).unwrap());
        assert!(ev.matches(&expr, &e).unwrap());
        assert_eq!(ev.regex_cache.borrow().len(), 1);
    }

    #[test]
    fn unknown_attribute_errors() {
        let e = component("c1", "team-a", "production", "go");
        let expr = parse("bogus:value").unwrap();
        let ev = Evaluator::new();
        assert!(matches!(
            ev.matches(&expr, &e),
            Err(CatalogError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn negation_and_inapplicable_attribute() {
        let e = component("c1", "team-a", "production", "go");
        // `providedby` only applies to API entities; a Component has none.
        let expr = parse("!providedby:x").unwrap();
        let ev = Evaluator::new();
        assert!(ev.matches(&expr, &e).unwrap());
    }

    #[test]
    fn bad_regex_surfaces_at_evaluation_time() {
        let e = component("c1", "team-a", "production", "go");
        let expr = parse("name~*bad").unwrap();
        let ev = Evaluator::new();
        assert!(matches!(ev.matches(&expr, &e), Err(CatalogError::Syntax(_))));
    }
}
