//! The External plugin kind (§4.5): a generic escape hatch that
//! marshals entity context as JSON, runs a configured command, and
//! reads back a JSON result.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;

use super::super::registry::{Plugin, PluginContext, PluginOutput};

#[derive(Debug, Deserialize)]
struct ExternalSpec {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Serialize)]
struct ExternalEntityView<'a> {
    #[serde(rename = "ref")]
    entity_ref: String,
    kind: &'a str,
    name: &'a str,
    namespace: &'a str,
}

#[derive(Serialize)]
struct ExternalRequest<'a> {
    entity: ExternalEntityView<'a>,
    config: &'a serde_json::Value,
    #[serde(rename = "tempDir")]
    temp_dir: &'a str,
    args: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ExternalResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "generatedFiles")]
    generated_files: Vec<String>,
    #[serde(default)]
    annotations: std::collections::BTreeMap<String, String>,
}

pub struct ExternalPlugin {
    spec: ExternalSpec,
}

impl ExternalPlugin {
    pub fn new(spec: serde_json::Value) -> Result<Self, CatalogError> {
        let spec = serde_json::from_value(spec).map_err(|e| CatalogError::syntax(format!("invalid External plugin spec: {e}")))?;
        Ok(ExternalPlugin { spec })
    }
}

impl Plugin for ExternalPlugin {
    fn run(&self, ctx: &PluginContext, entity: &Entity) -> Result<PluginOutput, CatalogError> {
        let meta = entity.metadata();
        let request = ExternalRequest {
            entity: ExternalEntityView {
                entity_ref: entity.qname(),
                kind: entity.kind().as_str(),
                name: &meta.name,
                namespace: meta.namespace(),
            },
            config: &self.spec.config,
            temp_dir: ctx.temp_dir.to_str().unwrap_or_default(),
            args: &ctx.args,
        };
        let payload = serde_json::to_vec(&request).map_err(|e| CatalogError::Subprocess(e.to_string()))?;

        let mut child = Command::new(&self.spec.command)
            .args(&self.spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CatalogError::Subprocess(e.to_string()))?;
        child
            .stdin
            .take()
            .expect("piped")
            .write_all(&payload)
            .map_err(|e| CatalogError::Io(e.to_string()))?;
        let output = child.wait_with_output().map_err(|e| CatalogError::Subprocess(e.to_string()))?;

        if !output.status.success() {
            return Err(CatalogError::PluginFailure {
                plugin: self.spec.command.clone(),
                entity: entity.entity_ref(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let response: ExternalResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| CatalogError::Subprocess(format!("malformed plugin response: {e}")))?;
        if !response.success {
            return Err(CatalogError::PluginFailure {
                plugin: self.spec.command.clone(),
                entity: entity.entity_ref(),
                message: response.error.unwrap_or_default(),
            });
        }

        Ok(PluginOutput {
            annotations: response.annotations,
            files: response.generated_files.into_iter().map(PathBuf::from).collect(),
        })
    }
}
