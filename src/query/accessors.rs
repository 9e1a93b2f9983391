//! Built-in attribute accessors (§4.2). Each returns the candidate
//! string values for an identifier against an entity, or `None` if the
//! identifier isn't one of the built-ins — in which case the evaluator
//! falls through to externally registered [`PropertyProvider`]s.

use crate::entity::{CatalogEntity, Entity};
use crate::reference::LabelRef;

/// An externally registered resolver for attributes this crate doesn't
/// know about. Returns `None` if it doesn't recognize the identifier
/// either; `Some(vec![])` means "recognized, not applicable here".
pub trait PropertyProvider: Send + Sync {
    fn resolve(&self, ident: &str, entity: &Entity) -> Option<Vec<String>>;
}

fn refs(v: &[LabelRef]) -> Vec<String> {
    v.iter().map(|r| r.entity_ref.canonical()).collect()
}

fn kv(map: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    map.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/// All refs the entity directly touches, incoming and outgoing.
fn rel(entity: &Entity) -> Vec<String> {
    let mut out = Vec::new();
    match entity {
        Entity::Domain(d) => {
            out.extend(d.owner.iter().map(|r| r.canonical()));
            out.extend(d.subdomain_of.iter().map(|r| r.canonical()));
            out.extend(d.systems.iter().map(|r| r.canonical()));
        }
        Entity::System(s) => {
            out.extend(s.owner.iter().map(|r| r.canonical()));
            out.extend(s.domain.iter().map(|r| r.canonical()));
            out.extend(s.components.iter().map(|r| r.canonical()));
            out.extend(s.apis.iter().map(|r| r.canonical()));
            out.extend(s.resources.iter().map(|r| r.canonical()));
        }
        Entity::Component(c) => {
            out.extend(c.owner.iter().map(|r| r.canonical()));
            out.extend(c.system.iter().map(|r| r.canonical()));
            out.extend(c.subcomponent_of.iter().map(|r| r.canonical()));
            out.extend(refs(&c.provides_apis));
            out.extend(refs(&c.consumes_apis));
            out.extend(refs(&c.depends_on));
            out.extend(refs(&c.dependents));
            out.extend(c.subcomponents.iter().map(|r| r.canonical()));
        }
        Entity::Api(a) => {
            out.extend(a.owner.iter().map(|r| r.canonical()));
            out.extend(a.system.iter().map(|r| r.canonical()));
            out.extend(refs(&a.providers));
            out.extend(refs(&a.consumers));
        }
        Entity::Resource(r) => {
            out.extend(r.owner.iter().map(|r| r.canonical()));
            out.extend(r.system.iter().map(|r| r.canonical()));
            out.extend(refs(&r.depends_on));
            out.extend(refs(&r.dependents));
        }
        Entity::Group(g) => {
            out.extend(g.parent.iter().map(|r| r.canonical()));
            out.extend(g.children.iter().map(|r| r.canonical()));
            out.extend(g.members.iter().map(|r| r.canonical()));
        }
    }
    out
}

/// `*`: full-text values over metadata scalars and kind-specific spec
/// scalars.
fn full_text(entity: &Entity) -> Vec<String> {
    let mut out = entity.metadata().all_scalars();
    if let Some(t) = entity.entity_type() {
        out.push(t.to_string());
    }
    if let Some(l) = entity.lifecycle() {
        out.push(l.to_string());
    }
    out.extend(rel(entity));
    out
}

/// Resolve a built-in accessor. Returns `None` when `ident` isn't a
/// recognized built-in name at all (distinct from "recognized but not
/// applicable", which is `Some(vec![])`).
pub fn builtin(ident: &str, entity: &Entity) -> Option<Vec<String>> {
    let meta = entity.metadata();
    Some(match ident.to_ascii_lowercase().as_str() {
        "*" => full_text(entity),
        "meta" => meta.all_scalars(),
        "kind" => vec![entity.kind().as_str().to_string()],
        "name" => vec![meta.name.clone()],
        "namespace" => vec![meta.namespace().to_string()],
        "title" => meta.title.clone().into_iter().collect(),
        "description" => meta.description.clone().into_iter().collect(),
        "tag" => meta.tags.clone(),
        "label" => kv(&meta.labels),
        "annotation" => kv(&meta.annotations),
        "owner" => entity.owner().map(|r| vec![r.canonical()]).unwrap_or_default(),
        "system" => entity.system().map(|r| vec![r.canonical()]).unwrap_or_default(),
        "type" => entity.entity_type().map(|t| vec![t.to_string()]).unwrap_or_default(),
        "lifecycle" => entity.lifecycle().map(|l| vec![l.to_string()]).unwrap_or_default(),
        "consumesapis" => entity.as_component().map(|c| refs(&c.consumes_apis)).unwrap_or_default(),
        "providesapis" => entity.as_component().map(|c| refs(&c.provides_apis)).unwrap_or_default(),
        "dependson" => match entity {
            Entity::Component(c) => refs(&c.depends_on),
            Entity::Resource(r) => refs(&r.depends_on),
            _ => Vec::new(),
        },
        "dependents" => match entity {
            Entity::Component(c) => refs(&c.dependents),
            Entity::Resource(r) => refs(&r.dependents),
            _ => Vec::new(),
        },
        "providedby" => entity.as_api().map(|a| refs(&a.providers)).unwrap_or_default(),
        "consumedby" => entity.as_api().map(|a| refs(&a.consumers)).unwrap_or_default(),
        "rel" => rel(entity),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ComponentEntity;
    use crate::reference::{EntityKind, EntityRef};

    fn sample() -> Entity {
        let mut c = ComponentEntity::default();
        c.metadata.name = "svc".to_string();
        c.lifecycle = Some("production".to_string());
        c.owner = Some(EntityRef::new(EntityKind::Group, "default", "team-a"));
        c.depends_on.push(LabelRef::new(EntityRef::new(
            EntityKind::Resource,
            "default",
            "db",
        )));
        Entity::Component(c)
    }

    #[test]
    fn owner_accessor() {
        let e = sample();
        assert_eq!(builtin("owner", &e).unwrap(), vec!["group:team-a"]);
    }

    #[test]
    fn dependson_accessor_only_applies_to_component_or_resource() {
        let e = sample();
        assert_eq!(builtin("dependson", &e).unwrap(), vec!["resource:db"]);
        let d = Entity::Domain(crate::entity::DomainEntity::default());
        assert_eq!(builtin("dependson", &d).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unknown_ident_returns_none() {
        assert!(builtin("not-a-real-attribute", &sample()).is_none());
    }
}
