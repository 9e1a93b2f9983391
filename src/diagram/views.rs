//! Graph-view generators (§4.3): each takes the repository plus an
//! entity (or entity set) and returns a populated diagram source plus
//! its sidecar metadata.

use std::collections::{HashMap, HashSet};

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;
use crate::reference::EntityRef;
use crate::repository::CatalogRepository;

use super::builder::{DiagramBuilder, DiagramMetadata, Edge, EdgeLayout, EdgeStyle, Node, NodeLayout, Shape};

fn shape_for(entity: &Entity) -> Shape {
    match entity {
        Entity::System(_) | Entity::Domain(_) => Shape::RoundedBox,
        Entity::Api(_) | Entity::Group(_) => Shape::Ellipse,
        Entity::Component(_) | Entity::Resource(_) => Shape::Box,
    }
}

fn entity_node(entity: &Entity) -> Node {
    Node {
        id: entity.qname(),
        layout: NodeLayout {
            label: entity.metadata().display_name().to_string(),
            fill_color: None,
            shape: shape_for(entity),
        },
    }
}

fn edge(from: EntityRef, to: EntityRef, style: EdgeStyle) -> Edge {
    Edge {
        from: from.canonical(),
        to: to.canonical(),
        layout: EdgeLayout {
            label: None,
            style,
            tooltip_attrs: Vec::new(),
        },
    }
}

fn get_typed(repo: &CatalogRepository, r: &EntityRef) -> Result<Entity, CatalogError> {
    repo.get(r).ok_or_else(|| CatalogError::Missing {
        from: r.clone(),
        field: "ref",
        target: r.clone(),
    })
}

/// Every forward relation edge an entity carries. Inverse-derived lists
/// (dependents, providers, consumers, subcomponents, systems, ...) are
/// deliberately excluded — the mirrored forward edge from the other
/// endpoint already represents the same relationship once, which is all
/// an edge-both-endpoints-in-set view needs.
fn forward_edges(entity: &Entity) -> Vec<(EntityRef, EntityRef, EdgeStyle)> {
    let from = entity.entity_ref();
    let mut out = Vec::new();
    match entity {
        Entity::Group(g) => {
            if let Some(p) = &g.parent {
                out.push((from.clone(), p.clone(), EdgeStyle::Subcomponent));
            }
        }
        Entity::Domain(d) => {
            if let Some(o) = &d.owner {
                out.push((from.clone(), o.clone(), EdgeStyle::Owner));
            }
            if let Some(sd) = &d.subdomain_of {
                out.push((from.clone(), sd.clone(), EdgeStyle::Contains));
            }
        }
        Entity::System(s) => {
            if let Some(o) = &s.owner {
                out.push((from.clone(), o.clone(), EdgeStyle::Owner));
            }
            if let Some(d) = &s.domain {
                out.push((from.clone(), d.clone(), EdgeStyle::Contains));
            }
        }
        Entity::Component(c) => {
            if let Some(o) = &c.owner {
                out.push((from.clone(), o.clone(), EdgeStyle::Owner));
            }
            if let Some(s) = &c.system {
                out.push((from.clone(), s.clone(), EdgeStyle::Contains));
            }
            if let Some(p) = &c.subcomponent_of {
                out.push((from.clone(), p.clone(), EdgeStyle::Subcomponent));
            }
            for lr in &c.provides_apis {
                out.push((from.clone(), lr.entity_ref.clone(), EdgeStyle::ProvidedBy));
            }
            for lr in &c.consumes_apis {
                out.push((from.clone(), lr.entity_ref.clone(), EdgeStyle::Normal));
            }
            for lr in &c.depends_on {
                out.push((from.clone(), lr.entity_ref.clone(), EdgeStyle::DependsOn));
            }
        }
        Entity::Api(a) => {
            if let Some(o) = &a.owner {
                out.push((from.clone(), o.clone(), EdgeStyle::Owner));
            }
            if let Some(s) = &a.system {
                out.push((from.clone(), s.clone(), EdgeStyle::Contains));
            }
        }
        Entity::Resource(r) => {
            if let Some(o) = &r.owner {
                out.push((from.clone(), o.clone(), EdgeStyle::Owner));
            }
            if let Some(s) = &r.system {
                out.push((from.clone(), s.clone(), EdgeStyle::Contains));
            }
            for lr in &r.depends_on {
                out.push((from.clone(), lr.entity_ref.clone(), EdgeStyle::DependsOn));
            }
        }
    }
    out
}

/// Cluster `domain.qname`; nodes for each member system.
pub fn domain_view(repo: &CatalogRepository, domain_ref: &EntityRef) -> Result<(String, DiagramMetadata), CatalogError> {
    let entity = get_typed(repo, domain_ref)?;
    let domain = entity.as_domain().ok_or_else(|| CatalogError::KindMismatch {
        from: domain_ref.clone(),
        field: "kind",
        expected: "domain",
        found: domain_ref.clone(),
    })?;

    let mut b = DiagramBuilder::new();
    b.start();
    b.start_cluster(&entity.qname());
    for sys_ref in &domain.systems {
        if let Ok(sys_entity) = get_typed(repo, sys_ref) {
            b.add_node(entity_node(&sys_entity));
        }
    }
    b.end_cluster();
    b.end();
    Ok((b.source(), b.metadata()))
}

fn system_parts(repo: &CatalogRepository, system_ref: &EntityRef) -> Result<Vec<Entity>, CatalogError> {
    let entity = get_typed(repo, system_ref)?;
    let sys = entity.as_system().ok_or_else(|| CatalogError::KindMismatch {
        from: system_ref.clone(),
        field: "kind",
        expected: "system",
        found: system_ref.clone(),
    })?;
    let mut parts = Vec::new();
    for r in sys.components.iter().chain(sys.apis.iter()).chain(sys.resources.iter()) {
        if let Ok(e) = get_typed(repo, r) {
            parts.push(e);
        }
    }
    Ok(parts)
}

fn build_system_internal(
    repo: &CatalogRepository,
    system_ref: &EntityRef,
) -> Result<(DiagramBuilder, Vec<Entity>), CatalogError> {
    let entity = get_typed(repo, system_ref)?;
    let parts = system_parts(repo, system_ref)?;
    let part_ids: HashSet<EntityRef> = parts.iter().map(|e| e.entity_ref()).collect();

    let mut b = DiagramBuilder::new();
    b.start();
    b.start_cluster(&entity.qname());
    for part in &parts {
        b.add_node(entity_node(part));
    }
    b.end_cluster();

    for part in &parts {
        for (from, to, style) in forward_edges(part) {
            if part_ids.contains(&to) {
                b.add_edge(edge(from, to, style));
            }
        }
    }
    Ok((b, parts))
}

/// Cluster `system.qname`; nodes for each component/API/resource of the
/// system; no external edges.
pub fn system_internal_view(repo: &CatalogRepository, system_ref: &EntityRef) -> Result<(String, DiagramMetadata), CatalogError> {
    let (mut b, _parts) = build_system_internal(repo, system_ref)?;
    b.end();
    Ok((b.source(), b.metadata()))
}

fn external_candidate_edges(entity: &Entity) -> Vec<(EntityRef, EdgeStyle)> {
    match entity {
        Entity::Component(c) => {
            let mut out: Vec<(EntityRef, EdgeStyle)> =
                c.provides_apis.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::ProvidedBy)).collect();
            out.extend(c.consumes_apis.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::Normal)));
            out.extend(c.depends_on.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::DependsOn)));
            out.extend(c.dependents.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::Backward)));
            out
        }
        Entity::Api(a) => {
            let mut out: Vec<(EntityRef, EdgeStyle)> =
                a.providers.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::Backward)).collect();
            out.extend(a.consumers.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::Normal)));
            out
        }
        Entity::Resource(r) => {
            let mut out: Vec<(EntityRef, EdgeStyle)> =
                r.depends_on.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::DependsOn)).collect();
            out.extend(r.dependents.iter().map(|l| (l.entity_ref.clone(), EdgeStyle::Backward)));
            out
        }
        _ => Vec::new(),
    }
}

/// As [`system_internal_view`], plus external-side nodes/edges for every
/// relation that crosses a system boundary. `expand_context` lists
/// remote systems to expand into their own cluster (only the touched
/// parts); `exclude` lists remote systems to suppress entirely.
pub fn system_external_view(
    repo: &CatalogRepository,
    system_ref: &EntityRef,
    expand_context: &HashSet<EntityRef>,
    exclude: &HashSet<EntityRef>,
) -> Result<(String, DiagramMetadata), CatalogError> {
    let (mut b, parts) = build_system_internal(repo, system_ref)?;

    let mut external_system_nodes: HashSet<EntityRef> = HashSet::new();
    let mut expanded: HashMap<EntityRef, Vec<(Entity, EdgeStyle, EntityRef)>> = HashMap::new();

    for part in &parts {
        for (target_ref, style) in external_candidate_edges(part) {
            let Ok(target_entity) = get_typed(repo, &target_ref) else {
                continue;
            };
            let Some(target_system) = target_entity.system().cloned() else {
                continue;
            };
            if &target_system == system_ref {
                continue;
            }
            if exclude.contains(&target_system) {
                continue;
            }
            if expand_context.contains(&target_system) {
                expanded
                    .entry(target_system.clone())
                    .or_default()
                    .push((target_entity, style, part.entity_ref()));
            } else {
                if external_system_nodes.insert(target_system.clone()) {
                    if let Ok(sys_entity) = get_typed(repo, &target_system) {
                        b.add_node(entity_node(&sys_entity));
                    }
                }
                b.add_edge(edge(part.entity_ref(), target_system.clone(), EdgeStyle::SystemLink));
            }
        }
    }

    for (remote_system, touches) in expanded {
        let Ok(sys_entity) = get_typed(repo, &remote_system) else {
            continue;
        };
        b.start_cluster(&sys_entity.qname());
        let mut seen = HashSet::new();
        for (touched_entity, _, _) in &touches {
            if seen.insert(touched_entity.entity_ref()) {
                b.add_node(entity_node(touched_entity));
            }
        }
        b.end_cluster();
        for (touched_entity, style, from_ref) in touches {
            b.add_edge(edge(from_ref, touched_entity.entity_ref(), style));
        }
    }

    b.end();
    Ok((b.source(), b.metadata()))
}

fn add_owner_and_system(b: &mut DiagramBuilder, repo: &CatalogRepository, entity: &Entity) {
    if let Some(owner_ref) = entity.owner() {
        if let Ok(owner_entity) = get_typed(repo, owner_ref) {
            b.add_node(entity_node(&owner_entity));
            b.add_edge(edge(entity.entity_ref(), owner_ref.clone(), EdgeStyle::Owner));
        }
    }
    if let Some(sys_ref) = entity.system() {
        if let Ok(sys_entity) = get_typed(repo, sys_ref) {
            b.add_node(entity_node(&sys_entity));
            b.add_edge(edge(entity.entity_ref(), sys_ref.clone(), EdgeStyle::Contains));
        }
    }
}

/// The component, its owner, its containing system, provided/consumed
/// APIs, dependencies/dependents, and subcomponents.
pub fn component_view(repo: &CatalogRepository, component_ref: &EntityRef) -> Result<(String, DiagramMetadata), CatalogError> {
    let entity = get_typed(repo, component_ref)?;
    let c = entity.as_component().ok_or_else(|| CatalogError::KindMismatch {
        from: component_ref.clone(),
        field: "kind",
        expected: "component",
        found: component_ref.clone(),
    })?;

    let mut b = DiagramBuilder::new();
    b.start();
    b.add_node(entity_node(&entity));
    add_owner_and_system(&mut b, repo, &entity);

    for lr in &c.provides_apis {
        if let Ok(api) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&api));
            b.add_edge(edge(component_ref.clone(), lr.entity_ref.clone(), EdgeStyle::ProvidedBy));
        }
    }
    for lr in &c.consumes_apis {
        if let Ok(api) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&api));
            b.add_edge(edge(component_ref.clone(), lr.entity_ref.clone(), EdgeStyle::Normal));
        }
    }
    for lr in &c.depends_on {
        if let Ok(dep) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&dep));
            b.add_edge(edge(component_ref.clone(), lr.entity_ref.clone(), EdgeStyle::DependsOn));
        }
    }
    for lr in &c.dependents {
        if let Ok(dependent) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&dependent));
            b.add_edge(edge(lr.entity_ref.clone(), component_ref.clone(), EdgeStyle::DependsOn));
        }
    }
    for sub_ref in &c.subcomponents {
        if let Ok(sub) = get_typed(repo, sub_ref) {
            b.add_node(entity_node(&sub));
            b.add_edge(edge(sub_ref.clone(), component_ref.clone(), EdgeStyle::Subcomponent));
        }
    }

    b.end();
    Ok((b.source(), b.metadata()))
}

/// The API, owner, system, providers, and consumers.
pub fn api_view(repo: &CatalogRepository, api_ref: &EntityRef) -> Result<(String, DiagramMetadata), CatalogError> {
    let entity = get_typed(repo, api_ref)?;
    let a = entity.as_api().ok_or_else(|| CatalogError::KindMismatch {
        from: api_ref.clone(),
        field: "kind",
        expected: "api",
        found: api_ref.clone(),
    })?;

    let mut b = DiagramBuilder::new();
    b.start();
    b.add_node(entity_node(&entity));
    add_owner_and_system(&mut b, repo, &entity);

    for lr in &a.providers {
        if let Ok(provider) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&provider));
            b.add_edge(edge(lr.entity_ref.clone(), api_ref.clone(), EdgeStyle::ProvidedBy));
        }
    }
    for lr in &a.consumers {
        if let Ok(consumer) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&consumer));
            b.add_edge(edge(lr.entity_ref.clone(), api_ref.clone(), EdgeStyle::Normal));
        }
    }

    b.end();
    Ok((b.source(), b.metadata()))
}

/// The resource, owner, system, and dependents.
pub fn resource_view(repo: &CatalogRepository, resource_ref: &EntityRef) -> Result<(String, DiagramMetadata), CatalogError> {
    let entity = get_typed(repo, resource_ref)?;
    let r = entity.as_resource().ok_or_else(|| CatalogError::KindMismatch {
        from: resource_ref.clone(),
        field: "kind",
        expected: "resource",
        found: resource_ref.clone(),
    })?;

    let mut b = DiagramBuilder::new();
    b.start();
    b.add_node(entity_node(&entity));
    add_owner_and_system(&mut b, repo, &entity);

    for lr in &r.dependents {
        if let Ok(dependent) = get_typed(repo, &lr.entity_ref) {
            b.add_node(entity_node(&dependent));
            b.add_edge(edge(lr.entity_ref.clone(), resource_ref.clone(), EdgeStyle::DependsOn));
        }
    }

    b.end();
    Ok((b.source(), b.metadata()))
}

/// Given an arbitrary set of entity refs, include only edges whose both
/// endpoints are in the set.
pub fn arbitrary_set_view(repo: &CatalogRepository, refs: &[EntityRef]) -> Result<(String, DiagramMetadata), CatalogError> {
    let mut entities = Vec::new();
    for r in refs {
        entities.push(get_typed(repo, r)?);
    }
    let ids: HashSet<EntityRef> = entities.iter().map(|e| e.entity_ref()).collect();

    let mut b = DiagramBuilder::new();
    b.start();
    for e in &entities {
        b.add_node(entity_node(e));
    }
    for e in &entities {
        for (from, to, style) in forward_edges(e) {
            if ids.contains(&from) && ids.contains(&to) {
                b.add_edge(edge(from, to, style));
            }
        }
    }
    b.end();
    Ok((b.source(), b.metadata()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ApiEntity, ComponentEntity, DomainEntity, GroupEntity, ResourceEntity, SystemEntity};
    use crate::reference::{EntityKind, LabelRef};
    use crate::repository::CatalogRepository;

    fn meta(name: &str) -> crate::metadata::Metadata {
        crate::metadata::Metadata {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn eref(kind: EntityKind, name: &str) -> EntityRef {
        EntityRef::new(kind, "default", name)
    }

    fn seeded_repo() -> CatalogRepository {
        let repo = CatalogRepository::new(Vec::new());
        repo.add(Entity::Group(GroupEntity {
            metadata: meta("team-a"),
            group_type: Some("team".into()),
            ..Default::default()
        }))
        .unwrap();
        repo.add(Entity::Domain(DomainEntity {
            metadata: meta("d1"),
            owner: Some(eref(EntityKind::Group, "team-a")),
            ..Default::default()
        }))
        .unwrap();
        repo.add(Entity::System(SystemEntity {
            metadata: meta("s1"),
            owner: Some(eref(EntityKind::Group, "team-a")),
            domain: Some(eref(EntityKind::Domain, "d1")),
            ..Default::default()
        }))
        .unwrap();
        repo.add(Entity::Api(ApiEntity {
            metadata: meta("a1"),
            api_type: Some("openapi".into()),
            lifecycle: Some("production".into()),
            owner: Some(eref(EntityKind::Group, "team-a")),
            system: Some(eref(EntityKind::System, "s1")),
            ..Default::default()
        }))
        .unwrap();
        repo.add(Entity::Resource(ResourceEntity {
            metadata: meta("db"),
            resource_type: Some("database".into()),
            owner: Some(eref(EntityKind::Group, "team-a")),
            system: Some(eref(EntityKind::System, "s1")),
            ..Default::default()
        }))
        .unwrap();
        let mut c = ComponentEntity {
            metadata: meta("c1"),
            component_type: Some("service".into()),
            lifecycle: Some("production".into()),
            owner: Some(eref(EntityKind::Group, "team-a")),
            system: Some(eref(EntityKind::System, "s1")),
            ..Default::default()
        };
        c.consumes_apis.push(LabelRef::new(eref(EntityKind::Api, "a1")));
        c.depends_on.push(LabelRef::new(eref(EntityKind::Resource, "db")));
        repo.add(Entity::Component(c)).unwrap();
        repo.validate().unwrap();
        repo
    }

    #[test]
    fn domain_view_includes_member_system() {
        let repo = seeded_repo();
        let (_src, meta) = domain_view(&repo, &eref(EntityKind::Domain, "d1")).unwrap();
        assert!(meta.nodes.contains_key("system:s1"));
        assert_eq!(meta.clusters.len(), 1);
    }

    #[test]
    fn system_internal_view_has_no_external_edges() {
        let repo = seeded_repo();
        let (_src, meta) = system_internal_view(&repo, &eref(EntityKind::System, "s1")).unwrap();
        assert!(meta.nodes.contains_key("component:c1"));
        assert!(meta.nodes.contains_key("api:a1"));
        assert!(meta.nodes.contains_key("resource:db"));
        for e in meta.edges.values() {
            assert!(meta.nodes.contains_key(&e.from));
            assert!(meta.nodes.contains_key(&e.to));
        }
    }

    #[test]
    fn component_view_includes_owner_system_and_dependencies() {
        let repo = seeded_repo();
        let (_src, meta) = component_view(&repo, &eref(EntityKind::Component, "c1")).unwrap();
        assert!(meta.nodes.contains_key("group:team-a"));
        assert!(meta.nodes.contains_key("system:s1"));
        assert!(meta.nodes.contains_key("api:a1"));
        assert!(meta.nodes.contains_key("resource:db"));
    }

    #[test]
    fn arbitrary_set_view_drops_edges_outside_set() {
        let repo = seeded_repo();
        let refs = vec![eref(EntityKind::Component, "c1"), eref(EntityKind::Resource, "db")];
        let (_src, meta) = arbitrary_set_view(&repo, &refs).unwrap();
        assert_eq!(meta.nodes.len(), 2);
        assert_eq!(meta.edges.len(), 1);
    }
}
