//! The MavenArtifactExtractor plugin kind (§4.5): composes group/artifact
//! coordinates and hands them to an external helper process.

use std::collections::BTreeMap;
use std::process::Command;

use serde::Deserialize;

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;

use super::super::registry::{Plugin, PluginContext, PluginOutput};

fn default_group_annotation() -> String {
    "swcat.io/maven-group-id".to_string()
}
fn default_artifact_annotation() -> String {
    "swcat.io/maven-artifact-id".to_string()
}
fn default_output_file_name() -> String {
    "artifact.jar".to_string()
}

#[derive(Debug, Deserialize)]
struct MavenSpec {
    helper_command: String,
    #[serde(default)]
    default_group_id: Option<String>,
    #[serde(default = "default_group_annotation")]
    group_annotation: String,
    #[serde(default = "default_artifact_annotation")]
    artifact_annotation: String,
    #[serde(default = "default_output_file_name")]
    output_file_name: String,
}

pub struct MavenArtifactExtractor {
    spec: MavenSpec,
}

impl MavenArtifactExtractor {
    pub fn new(spec: serde_json::Value) -> Result<Self, CatalogError> {
        let spec = serde_json::from_value(spec)
            .map_err(|e| CatalogError::syntax(format!("invalid MavenArtifactExtractor spec: {e}")))?;
        Ok(MavenArtifactExtractor { spec })
    }
}

impl Plugin for MavenArtifactExtractor {
    fn run(&self, ctx: &PluginContext, entity: &Entity) -> Result<PluginOutput, CatalogError> {
        let meta = entity.metadata();
        let group_id = meta
            .annotations
            .get(&self.spec.group_annotation)
            .cloned()
            .or_else(|| self.spec.default_group_id.clone())
            .ok_or_else(|| CatalogError::PluginFailure {
                plugin: "MavenArtifactExtractor".into(),
                entity: entity.entity_ref(),
                message: "no group id configured or annotated".into(),
            })?;
        let artifact_id = meta
            .annotations
            .get(&self.spec.artifact_annotation)
            .cloned()
            .unwrap_or_else(|| meta.name.clone());
        let output_path = ctx.temp_dir.join(&self.spec.output_file_name);

        let status = Command::new(&self.spec.helper_command)
            .arg(&group_id)
            .arg(&artifact_id)
            .arg(&output_path)
            .status()
            .map_err(|e| CatalogError::Subprocess(e.to_string()))?;
        if !status.success() {
            return Err(CatalogError::PluginFailure {
                plugin: "MavenArtifactExtractor".into(),
                entity: entity.entity_ref(),
                message: format!("helper process exited with {status}"),
            });
        }

        Ok(PluginOutput {
            annotations: BTreeMap::new(),
            files: vec![output_path],
        })
    }
}
