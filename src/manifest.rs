//! The "YAML → untyped API object → typed entity" conversion step named
//! in the crate's dataflow.
//!
//! This module does **not** read files or walk directories — that crosses
//! into the "filesystem store abstraction" this crate treats as an
//! external collaborator. Callers read the bytes however they like (a
//! single file, a `GET` body, a test fixture) and hand this module the
//! resulting string.

use serde::Deserialize;

use crate::entity::{
    ApiEntity, ComponentEntity, DomainEntity, Entity, GroupEntity, Profile, ResourceEntity,
    SystemEntity,
};
use crate::error::CatalogError;
use crate::metadata::Metadata;
use crate::reference::{EntityKind, EntityRef, LabelRef};

/// The untyped API object: a manifest document after YAML parsing but
/// before kind-specific conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: serde_yaml::Value,
}

/// Parse a `---`-separated multi-document YAML string into raw entities.
/// A document that fails to deserialize at all is skipped with its error
/// recorded rather than aborting the whole parse — malformed YAML in one
/// document should not hide the well-formed ones around it.
pub fn parse_documents(content: &str) -> Vec<Result<RawEntity, CatalogError>> {
    serde_yaml::Deserializer::from_str(content)
        .map(|doc| {
            RawEntity::deserialize(doc)
                .map_err(|e| CatalogError::syntax(format!("invalid manifest document: {e}")))
        })
        .collect()
}

fn spec_str(spec: &serde_yaml::Value, key: &str) -> Option<String> {
    spec.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn spec_str_seq(spec: &serde_yaml::Value, key: &str) -> Vec<String> {
    spec.get(key)
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_ref(
    raw: &str,
    default_kind: EntityKind,
    allowed: &[EntityKind],
    field: &'static str,
    from: &EntityRef,
) -> Result<EntityRef, CatalogError> {
    let r = EntityRef::parse(raw, default_kind)?;
    if !allowed.contains(&r.kind) {
        return Err(CatalogError::KindMismatch {
            from: from.clone(),
            field,
            expected: allowed.first().map(|k| k.as_str()).unwrap_or("?"),
            found: r,
        });
    }
    Ok(r)
}

/// An entry in a label-ref list may be a bare reference string or a small
/// mapping carrying a label and attributes.
fn parse_label_ref(
    item: &serde_yaml::Value,
    default_kind: EntityKind,
    allowed: &[EntityKind],
    field: &'static str,
    from: &EntityRef,
) -> Result<LabelRef, CatalogError> {
    if let Some(s) = item.as_str() {
        let r = parse_ref(s, default_kind, allowed, field, from)?;
        return Ok(LabelRef::new(r));
    }
    if let Some(map) = item.as_mapping() {
        let raw = map
            .get(serde_yaml::Value::String("ref".to_string()))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CatalogError::syntax(format!("{field} entry missing `ref`")))?;
        let r = parse_ref(raw, default_kind, allowed, field, from)?;
        let mut lr = LabelRef::new(r);
        lr.label = map
            .get(serde_yaml::Value::String("label".to_string()))
            .and_then(|v| v.as_str())
            .map(String::from);
        if let Some(attrs) = map
            .get(serde_yaml::Value::String("attributes".to_string()))
            .and_then(|v| v.as_mapping())
        {
            for (k, v) in attrs {
                if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                    lr.attributes.insert(k.to_string(), v.to_string());
                }
            }
        }
        return Ok(lr);
    }
    Err(CatalogError::syntax(format!(
        "{field} entry must be a string or a {{ref, label, attributes}} mapping"
    )))
}

fn parse_label_ref_list(
    spec: &serde_yaml::Value,
    key: &str,
    default_kind: EntityKind,
    allowed: &[EntityKind],
    field: &'static str,
    from: &EntityRef,
) -> Result<Vec<LabelRef>, CatalogError> {
    let Some(seq) = spec.get(key).and_then(|v| v.as_sequence()) else {
        return Ok(Vec::new());
    };
    seq.iter()
        .map(|item| parse_label_ref(item, default_kind, allowed, field, from))
        .collect()
}

const COMPONENT_OR_RESOURCE: [EntityKind; 2] = [EntityKind::Component, EntityKind::Resource];

impl Entity {
    /// Convert a raw (untyped) manifest document into a typed entity.
    /// Does not enforce mandatory-field presence — that is
    /// [`crate::repository::CatalogRepository::validate`]'s job so that
    /// the first-encountered error names the *entity*, not the decode
    /// step.
    pub fn from_raw(raw: RawEntity) -> Result<Entity, CatalogError> {
        let kind = EntityKind::parse(&raw.kind)
            .ok_or_else(|| CatalogError::syntax(format!("unknown kind: {}", raw.kind)))?;
        raw.metadata.validate_syntax()?;
        let self_ref = EntityRef::new(kind, raw.metadata.namespace(), &raw.metadata.name);
        let spec = &raw.spec;

        Ok(match kind {
            EntityKind::Group => Entity::Group(GroupEntity {
                group_type: spec_str(spec, "type"),
                profile: spec
                    .get("profile")
                    .and_then(|v| serde_yaml::from_value::<Profile>(v.clone()).ok()),
                parent: spec_str(spec, "parent")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "parent", &self_ref))
                    .transpose()?,
                children: spec_str_seq(spec, "children")
                    .iter()
                    .map(|s| parse_ref(s, EntityKind::Group, &[EntityKind::Group], "children", &self_ref))
                    .collect::<Result<_, _>>()?,
                members: spec_str_seq(spec, "members")
                    .iter()
                    .map(|s| parse_ref(s, EntityKind::Group, &[EntityKind::Group], "members", &self_ref))
                    .collect::<Result<_, _>>()?,
                metadata: raw.metadata,
            }),
            EntityKind::Domain => Entity::Domain(DomainEntity {
                domain_type: spec_str(spec, "type"),
                owner: spec_str(spec, "owner")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "owner", &self_ref))
                    .transpose()?,
                subdomain_of: spec_str(spec, "subdomainOf")
                    .map(|s| {
                        parse_ref(
                            &s,
                            EntityKind::Domain,
                            &[EntityKind::Domain],
                            "subdomainOf",
                            &self_ref,
                        )
                    })
                    .transpose()?,
                systems: Vec::new(),
                metadata: raw.metadata,
            }),
            EntityKind::System => Entity::System(SystemEntity {
                system_type: spec_str(spec, "type"),
                owner: spec_str(spec, "owner")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "owner", &self_ref))
                    .transpose()?,
                domain: spec_str(spec, "domain")
                    .map(|s| parse_ref(&s, EntityKind::Domain, &[EntityKind::Domain], "domain", &self_ref))
                    .transpose()?,
                components: Vec::new(),
                apis: Vec::new(),
                resources: Vec::new(),
                metadata: raw.metadata,
            }),
            EntityKind::Component => Entity::Component(ComponentEntity {
                component_type: spec_str(spec, "type"),
                lifecycle: spec_str(spec, "lifecycle"),
                owner: spec_str(spec, "owner")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "owner", &self_ref))
                    .transpose()?,
                system: spec_str(spec, "system")
                    .map(|s| parse_ref(&s, EntityKind::System, &[EntityKind::System], "system", &self_ref))
                    .transpose()?,
                subcomponent_of: spec_str(spec, "subcomponentOf")
                    .map(|s| {
                        parse_ref(
                            &s,
                            EntityKind::Component,
                            &[EntityKind::Component],
                            "subcomponentOf",
                            &self_ref,
                        )
                    })
                    .transpose()?,
                provides_apis: parse_label_ref_list(
                    spec,
                    "providesApis",
                    EntityKind::Api,
                    &[EntityKind::Api],
                    "providesApis",
                    &self_ref,
                )?,
                consumes_apis: parse_label_ref_list(
                    spec,
                    "consumesApis",
                    EntityKind::Api,
                    &[EntityKind::Api],
                    "consumesApis",
                    &self_ref,
                )?,
                depends_on: parse_label_ref_list(
                    spec,
                    "dependsOn",
                    EntityKind::Component,
                    &COMPONENT_OR_RESOURCE,
                    "dependsOn",
                    &self_ref,
                )?,
                dependents: Vec::new(),
                subcomponents: Vec::new(),
                metadata: raw.metadata,
            }),
            EntityKind::Api => Entity::Api(ApiEntity {
                api_type: spec_str(spec, "type"),
                lifecycle: spec_str(spec, "lifecycle"),
                owner: spec_str(spec, "owner")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "owner", &self_ref))
                    .transpose()?,
                system: spec_str(spec, "system")
                    .map(|s| parse_ref(&s, EntityKind::System, &[EntityKind::System], "system", &self_ref))
                    .transpose()?,
                definition: spec_str(spec, "definition"),
                versions: spec_str_seq(spec, "versions"),
                providers: Vec::new(),
                consumers: Vec::new(),
                metadata: raw.metadata,
            }),
            EntityKind::Resource => Entity::Resource(ResourceEntity {
                resource_type: spec_str(spec, "type"),
                owner: spec_str(spec, "owner")
                    .map(|s| parse_ref(&s, EntityKind::Group, &[EntityKind::Group], "owner", &self_ref))
                    .transpose()?,
                system: spec_str(spec, "system")
                    .map(|s| parse_ref(&s, EntityKind::System, &[EntityKind::System], "system", &self_ref))
                    .transpose()?,
                depends_on: parse_label_ref_list(
                    spec,
                    "dependsOn",
                    EntityKind::Component,
                    &COMPONENT_OR_RESOURCE,
                    "dependsOn",
                    &self_ref,
                )?,
                dependents: Vec::new(),
                metadata: raw.metadata,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CatalogEntity;

    const CATALOG: &str = r#"
apiVersion: backstage.io/v1alpha1
kind: Group
metadata:
  name: team-a
spec:
  type: team
---
apiVersion: backstage.io/v1alpha1
kind: Domain
metadata:
  name: d1
spec:
  owner: team-a
---
apiVersion: backstage.io/v1alpha1
kind: System
metadata:
  name: s1
spec:
  owner: team-a
  domain: d1
---
apiVersion: backstage.io/v1alpha1
kind: Component
metadata:
  name: c1
spec:
  type: service
  lifecycle: prod
  owner: team-a
  system: s1
  dependsOn:
    - component:other
"#;

    #[test]
    fn parses_minimal_catalog() {
        let docs = parse_documents(CATALOG);
        assert_eq!(docs.len(), 4);
        for doc in &docs {
            assert!(doc.is_ok(), "{doc:?}");
        }
        let entities: Vec<Entity> = docs
            .into_iter()
            .map(|d| Entity::from_raw(d.unwrap()).unwrap())
            .collect();
        assert_eq!(entities[3].qname(), "component:c1");
        let c = entities[3].as_component().unwrap();
        assert_eq!(c.system.as_ref().unwrap().name, "s1");
        assert_eq!(c.depends_on[0].entity_ref.name, "other");
    }

    #[test]
    fn depends_on_rejects_api_kind() {
        let yaml = r#"
apiVersion: backstage.io/v1alpha1
kind: Component
metadata:
  name: c1
spec:
  type: service
  lifecycle: prod
  owner: team-a
  system: s1
  dependsOn:
    - api:some-api
"#;
        let doc = parse_documents(yaml).remove(0).unwrap();
        let err = Entity::from_raw(doc).unwrap_err();
        assert!(matches!(err, CatalogError::KindMismatch { .. }));
    }

    #[test]
    fn skips_malformed_document_but_keeps_siblings() {
        let yaml = "kind: [not, a, mapping]\n---\nkind: Group\nmetadata:\n  name: ok\n";
        let docs = parse_documents(yaml);
        assert_eq!(docs.len(), 2);
        assert!(docs[0].is_err());
        assert!(docs[1].is_ok());
    }
}
