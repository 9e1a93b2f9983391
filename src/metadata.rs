//! Entity metadata shared by every kind: name, labels, annotations, tags,
//! links, and a source-info handle used only for error reporting and
//! round-tripping.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::reference::{validate_annotation_key, validate_label_key, validate_label_value, validate_name, validate_tag};

/// Opaque origin pointer to the YAML node an entity was constructed from.
///
/// Real loaders attach [`SourceInfo::File`]; tests and doc examples that
/// build entities by hand use [`SourceInfo::Synthetic`]. Neither variant
/// is interpreted by the catalog itself — it exists purely so error
/// messages and round-tripping tools can point back at the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceInfo {
    #[default]
    Synthetic,
    File {
        path: PathBuf,
        line: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    /// Not part of the wire format; populated by the loader.
    #[serde(skip)]
    pub source: SourceInfo,
}

impl Metadata {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(crate::reference::DEFAULT_NAMESPACE)
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Validate name/namespace/label/annotation/tag syntax per §3.
    pub fn validate_syntax(&self) -> Result<(), CatalogError> {
        validate_name(&self.name).map_err(CatalogError::syntax)?;
        if let Some(ns) = &self.namespace {
            crate::reference::validate_namespace(ns).map_err(CatalogError::syntax)?;
        }
        for key in self.labels.keys() {
            validate_label_key(key).map_err(CatalogError::syntax)?;
        }
        for value in self.labels.values() {
            validate_label_value(value).map_err(CatalogError::syntax)?;
        }
        for key in self.annotations.keys() {
            validate_annotation_key(key).map_err(CatalogError::syntax)?;
        }
        for tag in &self.tags {
            validate_tag(tag).map_err(CatalogError::syntax)?;
        }
        Ok(())
    }

    /// All scalar + label/annotation/tag values, for the `meta` query
    /// accessor.
    pub fn all_scalars(&self) -> Vec<String> {
        let mut out = vec![self.name.clone()];
        out.push(self.namespace().to_string());
        if let Some(t) = &self.title {
            out.push(t.clone());
        }
        if let Some(d) = &self.description {
            out.push(d.clone());
        }
        out.extend(self.tags.iter().cloned());
        out.extend(
            self.labels
                .iter()
                .map(|(k, v)| format!("{k}={v}")),
        );
        out.extend(
            self.annotations
                .iter()
                .map(|(k, v)| format!("{k}={v}")),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> Metadata {
        Metadata {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn namespace_defaults() {
        let m = meta("foo");
        assert_eq!(m.namespace(), "default");
    }

    #[test]
    fn display_name_prefers_title() {
        let mut m = meta("foo");
        assert_eq!(m.display_name(), "foo");
        m.title = Some("Foo Service".to_string());
        assert_eq!(m.display_name(), "Foo Service");
    }

    #[test]
    fn validate_syntax_rejects_bad_label_key() {
        let mut m = meta("foo");
        m.labels.insert("Bad Key".to_string(), "v".to_string());
        assert!(m.validate_syntax().is_err());
    }

    #[test]
    fn validate_syntax_accepts_well_formed_metadata() {
        let mut m = meta("foo");
        m.labels.insert("team".to_string(), "payments".to_string());
        m.annotations
            .insert("swcat.io/visibility".to_string(), "internal".to_string());
        m.tags.push("go".to_string());
        assert!(m.validate_syntax().is_ok());
    }
}
