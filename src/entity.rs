//! Typed catalog entities: per-kind spec structs, the capability traits
//! callers use to work with any kind uniformly, and the untyped-to-typed
//! conversion step named in the crate's dataflow (§2: "YAML files →
//! parsed into untyped API objects → converted to typed catalog
//! entities").
//!
//! Inverse-relation fields (the `*_derived` lists below) start empty and
//! are populated by [`crate::repository::CatalogRepository::validate`];
//! nothing outside that one pass ever mutates them.

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::reference::{EntityKind, EntityRef, LabelRef};

/// Capability set shared by every entity kind (design note: "Polymorphism").
pub trait CatalogEntity {
    fn kind(&self) -> EntityKind;
    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.metadata().namespace(), &self.metadata().name)
    }

    fn qname(&self) -> String {
        self.entity_ref().canonical()
    }

    /// The kind-specific `spec.type` scalar, where applicable.
    fn entity_type(&self) -> Option<&str>;
}

/// Marker for entities that carry a `system` reference (Component, API,
/// Resource — the "system part" entities).
pub trait SystemPart: CatalogEntity {
    fn system(&self) -> Option<&EntityRef>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupEntity {
    pub metadata: Metadata,
    pub group_type: Option<String>,
    pub profile: Option<Profile>,
    pub parent: Option<EntityRef>,
    pub children: Vec<EntityRef>,
    pub members: Vec<EntityRef>,
}

impl CatalogEntity for GroupEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.group_type.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomainEntity {
    pub metadata: Metadata,
    pub domain_type: Option<String>,
    pub owner: Option<EntityRef>,
    pub subdomain_of: Option<EntityRef>,
    /// Derived: systems whose `domain` points here.
    pub systems: Vec<EntityRef>,
}

impl CatalogEntity for DomainEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Domain
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.domain_type.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemEntity {
    pub metadata: Metadata,
    pub system_type: Option<String>,
    pub owner: Option<EntityRef>,
    pub domain: Option<EntityRef>,
    /// Derived: components/apis/resources whose `system` points here.
    pub components: Vec<EntityRef>,
    pub apis: Vec<EntityRef>,
    pub resources: Vec<EntityRef>,
}

impl CatalogEntity for SystemEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::System
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.system_type.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentEntity {
    pub metadata: Metadata,
    pub component_type: Option<String>,
    pub lifecycle: Option<String>,
    pub owner: Option<EntityRef>,
    pub system: Option<EntityRef>,
    pub subcomponent_of: Option<EntityRef>,
    pub provides_apis: Vec<LabelRef>,
    pub consumes_apis: Vec<LabelRef>,
    pub depends_on: Vec<LabelRef>,
    /// Derived: components/resources whose `dependsOn` points here.
    pub dependents: Vec<LabelRef>,
    /// Derived: components whose `subcomponentOf` points here.
    pub subcomponents: Vec<EntityRef>,
}

impl CatalogEntity for ComponentEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Component
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.component_type.as_deref()
    }
}

impl SystemPart for ComponentEntity {
    fn system(&self) -> Option<&EntityRef> {
        self.system.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiEntity {
    pub metadata: Metadata,
    pub api_type: Option<String>,
    pub lifecycle: Option<String>,
    pub owner: Option<EntityRef>,
    pub system: Option<EntityRef>,
    pub definition: Option<String>,
    pub versions: Vec<String>,
    /// Derived: components whose `providesApis` points here.
    pub providers: Vec<LabelRef>,
    /// Derived: components whose `consumesApis` points here.
    pub consumers: Vec<LabelRef>,
}

impl CatalogEntity for ApiEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Api
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.api_type.as_deref()
    }
}

impl SystemPart for ApiEntity {
    fn system(&self) -> Option<&EntityRef> {
        self.system.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceEntity {
    pub metadata: Metadata,
    pub resource_type: Option<String>,
    pub owner: Option<EntityRef>,
    pub system: Option<EntityRef>,
    pub depends_on: Vec<LabelRef>,
    /// Derived: components/resources whose `dependsOn` points here.
    pub dependents: Vec<LabelRef>,
}

impl CatalogEntity for ResourceEntity {
    fn kind(&self) -> EntityKind {
        EntityKind::Resource
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn entity_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }
}

impl SystemPart for ResourceEntity {
    fn system(&self) -> Option<&EntityRef> {
        self.system.as_ref()
    }
}

/// A catalog entity of any kind. Narrow tagged-variant dispatch (design
/// note): most code works through [`CatalogEntity`]; kind-specific fields
/// (used by, e.g., the query engine's spec-field accessors) are reached
/// by matching this enum.
#[derive(Debug, Clone)]
pub enum Entity {
    Domain(DomainEntity),
    System(SystemEntity),
    Component(ComponentEntity),
    Api(ApiEntity),
    Resource(ResourceEntity),
    Group(GroupEntity),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Entity::Domain($inner) => $body,
            Entity::System($inner) => $body,
            Entity::Component($inner) => $body,
            Entity::Api($inner) => $body,
            Entity::Resource($inner) => $body,
            Entity::Group($inner) => $body,
        }
    };
}

impl CatalogEntity for Entity {
    fn kind(&self) -> EntityKind {
        dispatch!(self, e => e.kind())
    }
    fn metadata(&self) -> &Metadata {
        dispatch!(self, e => e.metadata())
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        dispatch!(self, e => e.metadata_mut())
    }
    fn entity_type(&self) -> Option<&str> {
        dispatch!(self, e => e.entity_type())
    }
}

impl Entity {
    pub fn system(&self) -> Option<&EntityRef> {
        match self {
            Entity::Component(c) => c.system(),
            Entity::Api(a) => a.system(),
            Entity::Resource(r) => r.system(),
            _ => None,
        }
    }

    pub fn owner(&self) -> Option<&EntityRef> {
        match self {
            Entity::Domain(d) => d.owner.as_ref(),
            Entity::System(s) => s.owner.as_ref(),
            Entity::Component(c) => c.owner.as_ref(),
            Entity::Api(a) => a.owner.as_ref(),
            Entity::Resource(r) => r.owner.as_ref(),
            Entity::Group(_) => None,
        }
    }

    pub fn lifecycle(&self) -> Option<&str> {
        match self {
            Entity::Component(c) => c.lifecycle.as_deref(),
            Entity::Api(a) => a.lifecycle.as_deref(),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentEntity> {
        match self {
            Entity::Component(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_component_mut(&mut self) -> Option<&mut ComponentEntity> {
        match self {
            Entity::Component(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_api(&self) -> Option<&ApiEntity> {
        match self {
            Entity::Api(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_api_mut(&mut self) -> Option<&mut ApiEntity> {
        match self {
            Entity::Api(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_resource(&self) -> Option<&ResourceEntity> {
        match self {
            Entity::Resource(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_resource_mut(&mut self) -> Option<&mut ResourceEntity> {
        match self {
            Entity::Resource(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_system(&self) -> Option<&SystemEntity> {
        match self {
            Entity::System(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_system_mut(&mut self) -> Option<&mut SystemEntity> {
        match self {
            Entity::System(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_domain(&self) -> Option<&DomainEntity> {
        match self {
            Entity::Domain(d) => Some(d),
            _ => None,
        }
    }
    pub fn as_domain_mut(&mut self) -> Option<&mut DomainEntity> {
        match self {
            Entity::Domain(d) => Some(d),
            _ => None,
        }
    }
    pub fn as_group(&self) -> Option<&GroupEntity> {
        match self {
            Entity::Group(g) => Some(g),
            _ => None,
        }
    }
    pub fn as_group_mut(&mut self) -> Option<&mut GroupEntity> {
        match self {
            Entity::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Shallow copy with every inverse-relation list cleared, as used by
    /// the repository's copy-on-write rebuild (design note:
    /// "Copy-on-write mutations").
    pub fn clear_inverses(&self) -> Entity {
        let mut clone = self.clone();
        match &mut clone {
            Entity::Domain(d) => d.systems.clear(),
            Entity::System(s) => {
                s.components.clear();
                s.apis.clear();
                s.resources.clear();
            }
            Entity::Component(c) => {
                c.dependents.clear();
                c.subcomponents.clear();
            }
            Entity::Api(a) => {
                a.providers.clear();
                a.consumers.clear();
            }
            Entity::Resource(r) => r.dependents.clear(),
            Entity::Group(_) => {}
        }
        clone
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub entity: EntityRef,
    pub field: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ref_from_component() {
        let mut c = ComponentEntity::default();
        c.metadata.name = "svc".to_string();
        let e = Entity::Component(c);
        assert_eq!(e.qname(), "component:svc");
    }

    #[test]
    fn clear_inverses_resets_derived_lists_only() {
        let mut c = ComponentEntity::default();
        c.metadata.name = "svc".to_string();
        c.dependents.push(LabelRef::new(EntityRef::new(
            EntityKind::Component,
            "default",
            "other",
        )));
        let e = Entity::Component(c);
        let cleared = e.clear_inverses();
        assert!(cleared.as_component().unwrap().dependents.is_empty());
        assert_eq!(cleared.qname(), e.qname());
    }
}
