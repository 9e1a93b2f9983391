//! Entity references and the name/namespace/label/tag syntax rules that
//! every catalog entity's metadata is checked against.
//!
//! An [`EntityRef`] is the triple `(kind, namespace, name)` that identifies
//! an entity anywhere in the catalog. A [`LabelRef`] extends that with an
//! optional `label` and a small attribute map, used on dependency edges
//! (`component:foo@v2`-style references).

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// One of the six entity kinds the catalog understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Domain,
    System,
    Component,
    Resource,
    #[serde(rename = "API", alias = "api")]
    Api,
    Group,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Domain,
        EntityKind::System,
        EntityKind::Component,
        EntityKind::Resource,
        EntityKind::Api,
        EntityKind::Group,
    ];

    /// Lowercase string form, used in canonical reference strings.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::System => "system",
            EntityKind::Component => "component",
            EntityKind::Resource => "resource",
            EntityKind::Api => "api",
            EntityKind::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s.to_ascii_lowercase().as_str() {
            "domain" => Some(EntityKind::Domain),
            "system" => Some(EntityKind::System),
            "component" => Some(EntityKind::Component),
            "resource" => Some(EntityKind::Resource),
            "api" => Some(EntityKind::Api),
            "group" => Some(EntityKind::Group),
            _ => None,
        }
    }

    /// Whether this kind carries a `system` reference (§ "system part").
    pub fn is_system_part(self) -> bool {
        matches!(
            self,
            EntityKind::Component | EntityKind::Api | EntityKind::Resource
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const DEFAULT_NAMESPACE: &str = "default";

/// A fully resolved `(kind, namespace, name)` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub namespace: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        EntityRef {
            kind,
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace
            },
            name: name.into(),
        }
    }

    /// Parse `[<kind>:][<namespace>/]<name>`, defaulting kind and
    /// namespace when absent. Validates the resulting name/namespace
    /// syntax.
    pub fn parse(reference: &str, default_kind: EntityKind) -> Result<Self, CatalogError> {
        let (kind, rest) = match reference.split_once(':') {
            Some((k, rest)) => {
                let kind = EntityKind::parse(k)
                    .ok_or_else(|| CatalogError::syntax(format!("unknown entity kind: {k}")))?;
                (kind, rest)
            }
            None => (default_kind, reference),
        };

        let (namespace, name) = match rest.split_once('/') {
            Some((ns, name)) => (ns.to_string(), name.to_string()),
            None => (DEFAULT_NAMESPACE.to_string(), rest.to_string()),
        };

        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            namespace
        };

        validate_name(&name).map_err(CatalogError::syntax)?;
        validate_namespace(&namespace).map_err(CatalogError::syntax)?;

        Ok(EntityRef {
            kind,
            namespace,
            name,
        })
    }

    /// Canonical `kind:namespace/name` string, eliding the default
    /// namespace.
    pub fn canonical(&self) -> String {
        if self.namespace == DEFAULT_NAMESPACE {
            format!("{}:{}", self.kind, self.name)
        } else {
            format!("{}:{}/{}", self.kind, self.namespace, self.name)
        }
    }

    /// Sort key used everywhere inverse-relation lists must be
    /// deterministically ordered: `(kind, namespace, name)`.
    pub fn sort_key(&self) -> (EntityKind, &str, &str) {
        (self.kind, self.namespace.as_str(), self.name.as_str())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// A reference plus an optional label and attribute map, used on
/// dependency edges. One recognized attribute key is `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub entity_ref: EntityRef,
    pub label: Option<String>,
    pub attributes: std::collections::BTreeMap<String, String>,
}

impl LabelRef {
    pub fn new(entity_ref: EntityRef) -> Self {
        LabelRef {
            entity_ref,
            label: None,
            attributes: std::collections::BTreeMap::new(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.attributes.get("version").map(String::as_str)
    }

    /// Sort key for deterministic ordering: `(kind, namespace, name, label)`.
    pub fn sort_key(&self) -> (EntityKind, &str, &str, Option<&str>) {
        (
            self.entity_ref.kind,
            self.entity_ref.namespace.as_str(),
            self.entity_ref.name.as_str(),
            self.label.as_deref(),
        )
    }
}

// --- name / namespace / label / tag syntax rules -------------------------

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_.-]{0,61}[A-Za-z0-9])?$").unwrap());

static DNS_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static TAG_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9:+#]+$").unwrap());

/// Name: starts and ends with an alphanumeric; interior may contain
/// `-_.`; length 1..63.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.len() > 63 {
        return Err(format!("name too long ({} > 63): {name}", name.len()));
    }
    if !NAME_RE.is_match(name) {
        return Err(format!("invalid name: {name}"));
    }
    Ok(())
}

/// Namespace uses the same alphabet as Name.
pub fn validate_namespace(namespace: &str) -> Result<(), String> {
    validate_name(namespace).map_err(|_| format!("invalid namespace: {namespace}"))
}

/// A DNS-subdomain: lowercase DNS labels separated by dots, <= 253 chars.
pub fn validate_dns_subdomain(value: &str) -> Result<(), String> {
    if value.len() > 253 {
        return Err(format!("dns subdomain too long: {value}"));
    }
    if value.is_empty() || !value.split('.').all(|label| DNS_LABEL_RE.is_match(label)) {
        return Err(format!("invalid dns subdomain: {value}"));
    }
    Ok(())
}

/// Label key: optional DNS-subdomain prefix (<=253 chars) `/` required
/// qualified-name tail (<=63 chars).
pub fn validate_label_key(key: &str) -> Result<(), String> {
    match key.split_once('/') {
        Some((prefix, tail)) => {
            validate_dns_subdomain(prefix)?;
            validate_name(tail).map_err(|_| format!("invalid label key tail: {key}"))
        }
        None => validate_name(key).map_err(|_| format!("invalid label key: {key}")),
    }
}

/// Label value: empty OR a qualified-name (<=63 chars).
pub fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name(value).map_err(|_| format!("invalid label value: {value}"))
}

/// Annotation key uses the label-key grammar; the value is unrestricted.
pub fn validate_annotation_key(key: &str) -> Result<(), String> {
    validate_label_key(key)
}

/// Tag: <=63 chars; one or more segments of `[a-z0-9:+#]` joined by a
/// single `-`.
pub fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() || tag.len() > 63 {
        return Err(format!("tag length out of range: {tag}"));
    }
    if tag.starts_with('-') || tag.ends_with('-') || tag.contains("--") {
        return Err(format!("invalid tag segmentation: {tag}"));
    }
    if !tag.split('-').all(|seg| TAG_SEGMENT_RE.is_match(seg)) {
        return Err(format!("invalid tag: {tag}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variations() {
        let r = EntityRef::parse("component:default/my-service", EntityKind::Component).unwrap();
        assert_eq!(r.kind, EntityKind::Component);
        assert_eq!(r.namespace, "default");
        assert_eq!(r.name, "my-service");

        let r2 = EntityRef::parse("my-service", EntityKind::Component).unwrap();
        assert_eq!(r2.canonical(), "component:my-service");

        let r3 = EntityRef::parse("api:my-api", EntityKind::Component).unwrap();
        assert_eq!(r3.kind, EntityKind::Api);
        assert_eq!(r3.namespace, "default");

        let r4 = EntityRef::parse("production/my-service", EntityKind::System).unwrap();
        assert_eq!(r4.kind, EntityKind::System);
        assert_eq!(r4.namespace, "production");
    }

    #[test]
    fn canonical_elides_default_namespace() {
        let r = EntityRef::new(EntityKind::Component, "default", "svc");
        assert_eq!(r.canonical(), "component:svc");
        let r2 = EntityRef::new(EntityKind::Component, "prod", "svc");
        assert_eq!(r2.canonical(), "component:prod/svc");
    }

    #[test]
    fn round_trip_parse_format() {
        for s in ["component:prod/svc", "system:my-sys", "api:default/my-api"] {
            let r = EntityRef::parse(s, EntityKind::Component).unwrap();
            let r2 = EntityRef::parse(&r.canonical(), EntityKind::Component).unwrap();
            assert_eq!(r, r2);
        }
    }

    #[test]
    fn name_boundary_lengths() {
        let ok63 = "a".repeat(63);
        assert!(validate_name(&ok63).is_ok());
        let bad64 = "a".repeat(64);
        assert!(validate_name(&bad64).is_err());
        assert!(validate_name("a").is_ok());
        assert!(validate_name("-bad").is_err());
        assert!(validate_name("bad-").is_err());
    }

    #[test]
    fn tag_boundary_lengths() {
        let ok = format!("{}{}", "go", "#".repeat(61));
        assert_eq!(ok.len(), 63);
        assert!(validate_tag(&ok).is_ok());
        let bad = format!("{ok}x");
        assert!(validate_tag(&bad).is_err());
        assert!(validate_tag("go").is_ok());
        assert!(validate_tag("c++:v1").is_ok());
        assert!(validate_tag("-bad").is_err());
        assert!(validate_tag("bad-").is_err());
    }

    #[test]
    fn label_value_boundary() {
        assert!(validate_label_value("").is_ok());
        assert!(validate_label_value(&"a".repeat(63)).is_ok());
        assert!(validate_label_value(&"a".repeat(64)).is_err());
    }

    #[test]
    fn label_key_with_prefix() {
        assert!(validate_label_key("swcat.io/visibility").is_ok());
        assert!(validate_label_key("visibility").is_ok());
        assert!(validate_label_key(&format!("{}/tail", "x".repeat(254))).is_err());
        assert!(validate_label_key("Bad_Prefix.COM/tail").is_err());
    }

    #[test]
    fn unknown_kind_is_syntax_error() {
        let err = EntityRef::parse("widget:default/x", EntityKind::Component).unwrap_err();
        assert!(matches!(err, CatalogError::Syntax(_)));
    }
}
