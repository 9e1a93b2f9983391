//! The in-memory, copy-on-write catalog repository (§4.1). A
//! [`parking_lot::RwLock<Arc<RepoState>>`] holds the live graph: readers
//! clone the `Arc` (cheap, then lock-free); writers build a full shadow
//! `RepoState`, validate it, and swap the `Arc` under the write lock —
//! this is the "atomic state swap" the design calls for.

pub mod link_template;

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;
use crate::metadata::Link;
use crate::query::Evaluator;
use crate::reference::{EntityKind, EntityRef, LabelRef};

pub use link_template::{LinkTemplate, TemplateContext};

/// One compiled annotation-triggered link template (§4.1
/// `addGeneratedLinks`).
pub struct LinkTemplateConfig {
    pub annotation_key: String,
    url: LinkTemplate,
    title: LinkTemplate,
}

impl LinkTemplateConfig {
    pub fn compile(
        annotation_key: impl Into<String>,
        url_template: &str,
        title_template: &str,
    ) -> Result<Self, CatalogError> {
        Ok(LinkTemplateConfig {
            annotation_key: annotation_key.into(),
            url: LinkTemplate::compile(url_template)?,
            title: LinkTemplate::compile(title_template)?,
        })
    }
}

/// Combined index: every entity keyed by its canonical reference. A
/// per-kind view is obtained by filtering this one map rather than
/// maintaining separate physical maps kept in sync by hand.
#[derive(Default, Clone)]
struct RepoState {
    entities: IndexMap<EntityRef, Entity>,
}

pub struct CatalogRepository {
    state: RwLock<Arc<RepoState>>,
    link_templates: Vec<LinkTemplateConfig>,
}

const VALIDATION_ORDER: [EntityKind; 6] = [
    EntityKind::Group,
    EntityKind::Component,
    EntityKind::Api,
    EntityKind::Resource,
    EntityKind::System,
    EntityKind::Domain,
];

impl CatalogRepository {
    pub fn new(link_templates: Vec<LinkTemplateConfig>) -> Self {
        CatalogRepository {
            state: RwLock::new(Arc::new(RepoState::default())),
            link_templates,
        }
    }

    fn snapshot(&self) -> Arc<RepoState> {
        self.state.read().clone()
    }

    fn swap(&self, next: Arc<RepoState>) {
        *self.state.write() = next;
    }

    /// Add an entity during initial, unvalidated load. Fails if the
    /// reference already exists.
    pub fn add(&self, entity: Entity) -> Result<(), CatalogError> {
        let snap = self.snapshot();
        let r = entity.entity_ref();
        if snap.entities.contains_key(&r) {
            return Err(CatalogError::Duplicate(r));
        }
        let mut shadow = (*snap).clone();
        shadow.entities.insert(r.clone(), entity);
        self.swap(Arc::new(shadow));
        info!(entity = %r, "added entity");
        Ok(())
    }

    pub fn exists(&self, r: &EntityRef) -> bool {
        self.snapshot().entities.contains_key(r)
    }

    pub fn get(&self, r: &EntityRef) -> Option<Entity> {
        self.snapshot().entities.get(r).cloned()
    }

    /// Parse `query` and evaluate it against every entity of `kind`,
    /// returning matches sorted by canonical ref. An empty query matches
    /// everything.
    pub fn find(&self, kind: EntityKind, query: &str) -> Result<Vec<Entity>, CatalogError> {
        let snap = self.snapshot();
        let expr = if query.trim().is_empty() {
            None
        } else {
            Some(crate::query::parse(query)?)
        };
        let evaluator = Evaluator::new();
        let mut out = Vec::new();
        for e in snap.entities.values() {
            if e.kind() != kind {
                continue;
            }
            let matched = match &expr {
                None => true,
                Some(expr) => evaluator.matches(expr, e)?,
            };
            if matched {
                out.push(e.clone());
            }
        }
        out.sort_by(|a, b| a.entity_ref().canonical().cmp(&b.entity_ref().canonical()));
        Ok(out)
    }

    /// Revalidate the current repository in place: recomputes inverse
    /// relations and generated links from scratch. Used after a batch of
    /// [`Self::add`] calls during initial load.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let snap = self.snapshot();
        let mut shadow = (*snap).clone();
        Self::run_validation(&mut shadow, &self.link_templates)?;
        self.swap(Arc::new(shadow));
        Ok(())
    }

    /// Build a shadow repository with `entity` inserted/replacing its
    /// prior version, validate it, and atomically publish on success.
    pub fn insert_or_update(&self, entity: Entity) -> Result<(), CatalogError> {
        let snap = self.snapshot();
        let mut shadow = (*snap).clone();
        let r = entity.entity_ref();
        shadow.entities.insert(r.clone(), entity);
        Self::run_validation(&mut shadow, &self.link_templates)?;
        self.swap(Arc::new(shadow));
        info!(entity = %r, "inserted or updated entity");
        Ok(())
    }

    /// Delete `r`. Fails with [`CatalogError::IngoingRefs`] if any
    /// inverse-relation list on the entity is non-empty.
    pub fn delete(&self, r: &EntityRef) -> Result<(), CatalogError> {
        let snap = self.snapshot();
        let Some(entity) = snap.entities.get(r) else {
            return Ok(());
        };
        let ingoing = Self::ingoing_refs(entity);
        if !ingoing.is_empty() {
            return Err(CatalogError::IngoingRefs(r.clone(), ingoing));
        }
        let mut shadow = (*snap).clone();
        shadow.entities.shift_remove(r);
        Self::run_validation(&mut shadow, &self.link_templates)?;
        self.swap(Arc::new(shadow));
        info!(entity = %r, "deleted entity");
        Ok(())
    }

    fn ingoing_refs(entity: &Entity) -> Vec<EntityRef> {
        match entity {
            Entity::Domain(d) => d.systems.clone(),
            Entity::System(s) => s
                .components
                .iter()
                .chain(s.apis.iter())
                .chain(s.resources.iter())
                .cloned()
                .collect(),
            Entity::Component(c) => c.dependents.iter().map(|l| l.entity_ref.clone()).collect(),
            Entity::Api(a) => a
                .providers
                .iter()
                .chain(a.consumers.iter())
                .map(|l| l.entity_ref.clone())
                .collect(),
            Entity::Resource(r) => r.dependents.iter().map(|l| l.entity_ref.clone()).collect(),
            Entity::Group(_) => Vec::new(),
        }
    }

    /// Systems, other than `system`, that are the parent system of any
    /// entity referenced from — or referring to — any part of `system`.
    pub fn surrounding_systems(&self, system: &EntityRef) -> Result<Vec<EntityRef>, CatalogError> {
        let snap = self.snapshot();
        let sys = snap
            .entities
            .get(system)
            .and_then(Entity::as_system)
            .ok_or_else(|| CatalogError::syntax(format!("not a system: {system}")))?;

        let mut parts: Vec<EntityRef> = Vec::new();
        parts.extend(sys.components.iter().cloned());
        parts.extend(sys.apis.iter().cloned());
        parts.extend(sys.resources.iter().cloned());

        let mut out = BTreeSet::new();
        for part_ref in &parts {
            let Some(part) = snap.entities.get(part_ref) else {
                continue;
            };
            for touched in Self::directly_related(part) {
                if let Some(touched_entity) = snap.entities.get(&touched) {
                    if let Some(touched_system) = touched_entity.system() {
                        if touched_system != system {
                            out.insert(touched_system.clone());
                        }
                    }
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    fn directly_related(entity: &Entity) -> Vec<EntityRef> {
        let mut out = Vec::new();
        match entity {
            Entity::Component(c) => {
                out.extend(c.owner.clone());
                out.extend(c.subcomponent_of.clone());
                out.extend(c.provides_apis.iter().map(|l| l.entity_ref.clone()));
                out.extend(c.consumes_apis.iter().map(|l| l.entity_ref.clone()));
                out.extend(c.depends_on.iter().map(|l| l.entity_ref.clone()));
                out.extend(c.dependents.iter().map(|l| l.entity_ref.clone()));
                out.extend(c.subcomponents.clone());
            }
            Entity::Api(a) => {
                out.extend(a.owner.clone());
                out.extend(a.providers.iter().map(|l| l.entity_ref.clone()));
                out.extend(a.consumers.iter().map(|l| l.entity_ref.clone()));
            }
            Entity::Resource(r) => {
                out.extend(r.owner.clone());
                out.extend(r.depends_on.iter().map(|l| l.entity_ref.clone()));
                out.extend(r.dependents.iter().map(|l| l.entity_ref.clone()));
            }
            _ => {}
        }
        out
    }

    /// Distinct values observed for a scalar spec field across entities
    /// of `kind`.
    pub fn spec_field_values(&self, kind: EntityKind, field: &str) -> Result<Vec<String>, CatalogError> {
        let snap = self.snapshot();
        let mut out = BTreeSet::new();
        for e in snap.entities.values().filter(|e| e.kind() == kind) {
            let value = match field {
                "type" => e.entity_type().map(str::to_string),
                "lifecycle" => e.lifecycle().map(str::to_string),
                _ => return Err(CatalogError::UnknownAttribute(field.to_string())),
            };
            if let Some(v) = value {
                out.insert(v);
            }
        }
        Ok(out.into_iter().collect())
    }

    // --- validation pipeline ---------------------------------------------

    fn run_validation(
        shadow: &mut RepoState,
        templates: &[LinkTemplateConfig],
    ) -> Result<(), CatalogError> {
        for e in shadow.entities.values_mut() {
            *e = e.clear_inverses();
        }
        for kind in VALIDATION_ORDER {
            let mut refs: Vec<EntityRef> = shadow
                .entities
                .values()
                .filter(|e| e.kind() == kind)
                .map(Entity::entity_ref)
                .collect();
            refs.sort();
            for r in refs {
                let entity = shadow.entities.get(&r).expect("just collected");
                Self::validate_entity_fields(entity, &shadow.entities)?;
            }
        }
        Self::populate_relationships(shadow);
        Self::sort_references(shadow);
        Self::add_generated_links(shadow, templates)?;
        Ok(())
    }

    fn validate_entity_fields(
        entity: &Entity,
        entities: &IndexMap<EntityRef, Entity>,
    ) -> Result<(), CatalogError> {
        let from = entity.entity_ref();
        match entity {
            Entity::Group(g) => {
                require_field(g.group_type.is_some(), &from, "type")?;
                check_ref_opt(&g.parent, EntityKind::Group, &from, "parent", entities)?;
                check_refs(&g.children, EntityKind::Group, &from, "children", entities)?;
                check_refs(&g.members, EntityKind::Group, &from, "members", entities)?;
            }
            Entity::Domain(d) => {
                check_ref_required(&d.owner, EntityKind::Group, &from, "owner", entities)?;
                check_ref_opt(
                    &d.subdomain_of,
                    EntityKind::Domain,
                    &from,
                    "subdomainOf",
                    entities,
                )?;
            }
            Entity::System(s) => {
                check_ref_required(&s.owner, EntityKind::Group, &from, "owner", entities)?;
                check_ref_required(&s.domain, EntityKind::Domain, &from, "domain", entities)?;
            }
            Entity::Component(c) => {
                require_field(c.component_type.is_some(), &from, "type")?;
                require_field(c.lifecycle.is_some(), &from, "lifecycle")?;
                check_ref_required(&c.owner, EntityKind::Group, &from, "owner", entities)?;
                check_ref_required(&c.system, EntityKind::System, &from, "system", entities)?;
                check_ref_opt(
                    &c.subcomponent_of,
                    EntityKind::Component,
                    &from,
                    "subcomponentOf",
                    entities,
                )?;
                check_label_refs(&c.provides_apis, EntityKind::Api, &from, "providesApis", entities)?;
                check_label_refs(&c.consumes_apis, EntityKind::Api, &from, "consumesApis", entities)?;
                check_label_refs_any(
                    &c.depends_on,
                    &[EntityKind::Component, EntityKind::Resource],
                    &from,
                    "dependsOn",
                    entities,
                )?;
            }
            Entity::Api(a) => {
                require_field(a.api_type.is_some(), &from, "type")?;
                require_field(a.lifecycle.is_some(), &from, "lifecycle")?;
                check_ref_required(&a.owner, EntityKind::Group, &from, "owner", entities)?;
                check_ref_required(&a.system, EntityKind::System, &from, "system", entities)?;
            }
            Entity::Resource(r) => {
                require_field(r.resource_type.is_some(), &from, "type")?;
                check_ref_required(&r.owner, EntityKind::Group, &from, "owner", entities)?;
                check_ref_required(&r.system, EntityKind::System, &from, "system", entities)?;
                check_label_refs_any(
                    &r.depends_on,
                    &[EntityKind::Component, EntityKind::Resource],
                    &from,
                    "dependsOn",
                    entities,
                )?;
            }
        }
        Ok(())
    }

    fn populate_relationships(shadow: &mut RepoState) {
        enum Edge {
            ApiProvider(LabelRef),
            ApiConsumer(LabelRef),
            Dependent(LabelRef),
            SystemComponent(EntityRef),
            SystemApi(EntityRef),
            SystemResource(EntityRef),
            DomainSystem(EntityRef),
            Subcomponent(EntityRef),
        }

        let mut edges: Vec<(EntityRef, Edge)> = Vec::new();
        for e in shadow.entities.values() {
            let self_ref = e.entity_ref();
            match e {
                Entity::Component(c) => {
                    if let Some(sys) = &c.system {
                        edges.push((sys.clone(), Edge::SystemComponent(self_ref.clone())));
                    }
                    if let Some(parent) = &c.subcomponent_of {
                        edges.push((parent.clone(), Edge::Subcomponent(self_ref.clone())));
                    }
                    for lr in &c.provides_apis {
                        edges.push((
                            lr.entity_ref.clone(),
                            Edge::ApiProvider(relabel(lr, &self_ref)),
                        ));
                    }
                    for lr in &c.consumes_apis {
                        edges.push((
                            lr.entity_ref.clone(),
                            Edge::ApiConsumer(relabel(lr, &self_ref)),
                        ));
                    }
                    for lr in &c.depends_on {
                        edges.push((lr.entity_ref.clone(), Edge::Dependent(relabel(lr, &self_ref))));
                    }
                }
                Entity::Api(a) => {
                    if let Some(sys) = &a.system {
                        edges.push((sys.clone(), Edge::SystemApi(self_ref.clone())));
                    }
                }
                Entity::Resource(r) => {
                    if let Some(sys) = &r.system {
                        edges.push((sys.clone(), Edge::SystemResource(self_ref.clone())));
                    }
                    for lr in &r.depends_on {
                        edges.push((lr.entity_ref.clone(), Edge::Dependent(relabel(lr, &self_ref))));
                    }
                }
                Entity::System(s) => {
                    if let Some(dom) = &s.domain {
                        edges.push((dom.clone(), Edge::DomainSystem(self_ref.clone())));
                    }
                }
                _ => {}
            }
        }

        for (target, edge) in edges {
            let Some(t) = shadow.entities.get_mut(&target) else {
                continue;
            };
            match (t, edge) {
                (Entity::Api(a), Edge::ApiProvider(lr)) => a.providers.push(lr),
                (Entity::Api(a), Edge::ApiConsumer(lr)) => a.consumers.push(lr),
                (Entity::Component(c), Edge::Dependent(lr)) => c.dependents.push(lr),
                (Entity::Resource(r), Edge::Dependent(lr)) => r.dependents.push(lr),
                (Entity::System(s), Edge::SystemComponent(r)) => s.components.push(r),
                (Entity::System(s), Edge::SystemApi(r)) => s.apis.push(r),
                (Entity::System(s), Edge::SystemResource(r)) => s.resources.push(r),
                (Entity::Domain(d), Edge::DomainSystem(r)) => d.systems.push(r),
                (Entity::Component(c), Edge::Subcomponent(r)) => c.subcomponents.push(r),
                // Target kind mismatches were already rejected during the
                // mandatory-field validation pass above.
                _ => {}
            }
        }
    }

    fn sort_references(shadow: &mut RepoState) {
        for e in shadow.entities.values_mut() {
            match e {
                Entity::Domain(d) => d.systems.sort_by(|a, b| a.sort_key().cmp(&b.sort_key())),
                Entity::System(s) => {
                    s.components.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                    s.apis.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                    s.resources.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                }
                Entity::Component(c) => {
                    c.dependents.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                    c.subcomponents.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                }
                Entity::Api(a) => {
                    a.providers.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
                    a.consumers.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
                }
                Entity::Resource(r) => r.dependents.sort_by(|a, b| a.sort_key().cmp(&b.sort_key())),
                Entity::Group(_) => {}
            }
        }
    }

    fn add_generated_links(
        shadow: &mut RepoState,
        templates: &[LinkTemplateConfig],
    ) -> Result<(), CatalogError> {
        for e in shadow.entities.values_mut() {
            e.metadata_mut().links.retain(|l| !l.is_generated);
            let versions = match e {
                Entity::Api(a) => a.versions.clone(),
                _ => Vec::new(),
            };
            for tpl in templates {
                let meta = e.metadata();
                if !meta.annotations.contains_key(&tpl.annotation_key) {
                    continue;
                }
                let mut ctx = TemplateContext::default();
                ctx.set("name", meta.name.clone())
                    .set("namespace", meta.namespace().to_string())
                    .set("title", meta.display_name().to_string())
                    .set("description", meta.description.clone().unwrap_or_default())
                    .set("kind", e.kind().as_str());
                ctx.set_list("tags", meta.tags.clone());

                if versions.is_empty() {
                    let link = Link {
                        url: Some(tpl.url.render(&ctx)),
                        title: Some(tpl.title.render(&ctx)),
                        icon: None,
                        link_type: None,
                        is_generated: true,
                    };
                    e.metadata_mut().links.push(link);
                } else {
                    for v in &versions {
                        let mut vctx = ctx.clone();
                        vctx.set("version", v.clone());
                        let link = Link {
                            url: Some(tpl.url.render(&vctx)),
                            title: Some(tpl.title.render(&vctx)),
                            icon: None,
                            link_type: None,
                            is_generated: true,
                        };
                        e.metadata_mut().links.push(link);
                    }
                }
            }
        }
        Ok(())
    }
}

fn relabel(lr: &LabelRef, new_ref: &EntityRef) -> LabelRef {
    LabelRef {
        entity_ref: new_ref.clone(),
        label: lr.label.clone(),
        attributes: lr.attributes.clone(),
    }
}

fn require_field(present: bool, from: &EntityRef, field: &'static str) -> Result<(), CatalogError> {
    if present {
        Ok(())
    } else {
        warn!(entity = %from, field, "missing mandatory field");
        Err(CatalogError::syntax(format!(
            "{from} missing mandatory field {field}"
        )))
    }
}

fn check_kind_and_exists(
    r: &EntityRef,
    expected: EntityKind,
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    if r.kind != expected {
        return Err(CatalogError::KindMismatch {
            from: from.clone(),
            field,
            expected: expected.as_str(),
            found: r.clone(),
        });
    }
    if !entities.contains_key(r) {
        return Err(CatalogError::Missing {
            from: from.clone(),
            field,
            target: r.clone(),
        });
    }
    Ok(())
}

fn check_ref_required(
    r: &Option<EntityRef>,
    expected: EntityKind,
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    let r = r
        .as_ref()
        .ok_or_else(|| CatalogError::syntax(format!("{from} missing mandatory field {field}")))?;
    check_kind_and_exists(r, expected, from, field, entities)
}

fn check_ref_opt(
    r: &Option<EntityRef>,
    expected: EntityKind,
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    match r {
        Some(r) => check_kind_and_exists(r, expected, from, field, entities),
        None => Ok(()),
    }
}

fn check_refs(
    list: &[EntityRef],
    expected: EntityKind,
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    for r in list {
        check_kind_and_exists(r, expected, from, field, entities)?;
    }
    Ok(())
}

fn check_label_refs(
    list: &[LabelRef],
    expected: EntityKind,
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    for lr in list {
        check_kind_and_exists(&lr.entity_ref, expected, from, field, entities)?;
    }
    Ok(())
}

fn check_label_refs_any(
    list: &[LabelRef],
    allowed: &[EntityKind],
    from: &EntityRef,
    field: &'static str,
    entities: &IndexMap<EntityRef, Entity>,
) -> Result<(), CatalogError> {
    for lr in list {
        if !allowed.contains(&lr.entity_ref.kind) {
            return Err(CatalogError::KindMismatch {
                from: from.clone(),
                field,
                expected: allowed.first().map(|k| k.as_str()).unwrap_or("?"),
                found: lr.entity_ref.clone(),
            });
        }
        if !entities.contains_key(&lr.entity_ref) {
            return Err(CatalogError::Missing {
                from: from.clone(),
                field,
                target: lr.entity_ref.clone(),
            });
        }
    }
    Ok(())
}
