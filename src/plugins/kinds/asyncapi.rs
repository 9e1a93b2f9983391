//! The AsyncAPIImporter plugin kind (§4.5): obtains a spec file from
//! another registered plugin, parses it per AsyncAPI major version, and
//! records the channel/message map as an annotation.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;

use super::super::registry::{Plugin, PluginContext, PluginOutput};

fn default_target_annotation() -> String {
    "swcat.io/asyncapi-channels".to_string()
}

#[derive(Debug, Deserialize)]
struct AsyncApiSpec {
    source_plugin: String,
    #[serde(default = "default_target_annotation")]
    target_annotation: String,
}

pub struct AsyncApiImporter {
    spec: AsyncApiSpec,
}

impl AsyncApiImporter {
    pub fn new(spec: serde_json::Value) -> Result<Self, CatalogError> {
        let spec =
            serde_json::from_value(spec).map_err(|e| CatalogError::syntax(format!("invalid AsyncAPIImporter spec: {e}")))?;
        Ok(AsyncApiImporter { spec })
    }
}

impl Plugin for AsyncApiImporter {
    fn run(&self, ctx: &PluginContext, entity: &Entity) -> Result<PluginOutput, CatalogError> {
        let failure = |message: String| CatalogError::PluginFailure {
            plugin: "AsyncAPIImporter".into(),
            entity: entity.entity_ref(),
            message,
        };

        let upstream = ctx.registry.invoke_named(&self.spec.source_plugin, ctx.temp_dir, entity)?;
        let spec_path = upstream.files.first().ok_or_else(|| failure("source plugin produced no files".into()))?;
        let contents = std::fs::read_to_string(spec_path)?;
        let doc: serde_json::Value = serde_json::from_str(&contents).map_err(|e| failure(e.to_string()))?;

        let version = doc.get("asyncapi").and_then(|v| v.as_str()).unwrap_or_default();
        let channels = if version.starts_with("2.") {
            extract_v2_channels(&doc)
        } else if version.starts_with("3.") {
            extract_v3_channels(&doc)
        } else {
            return Err(failure(format!("unsupported asyncapi version: {version}")));
        };

        let rendered =
            serde_json::to_string(&serde_json::json!({ "channels": channels })).expect("string-keyed map always serializes");
        let mut annotations = BTreeMap::new();
        annotations.insert(self.spec.target_annotation.clone(), rendered);
        Ok(PluginOutput {
            annotations,
            files: Vec::new(),
        })
    }
}

fn extract_v2_channels(doc: &serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    let Some(channels) = doc.get("channels").and_then(|v| v.as_object()) else {
        return out;
    };
    for (name, channel) in channels {
        let mut messages = Vec::new();
        for operation in ["publish", "subscribe"] {
            if let Some(message) = channel.get(operation).and_then(|o| o.get("message")) {
                collect_message_names(message, &mut messages);
            }
        }
        out.insert(name.clone(), messages);
    }
    out
}

fn extract_v3_channels(doc: &serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    let Some(channels) = doc.get("channels").and_then(|v| v.as_object()) else {
        return out;
    };
    for (name, channel) in channels {
        let mut messages = Vec::new();
        if let Some(msgs) = channel.get("messages").and_then(|v| v.as_object()) {
            for message in msgs.values() {
                match message.get("$ref").and_then(|v| v.as_str()) {
                    Some(reference) => match resolve_ref(doc, reference) {
                        Some(resolved) => collect_message_names(&resolved, &mut messages),
                        None => messages.push(ref_basename(reference)),
                    },
                    None => collect_message_names(message, &mut messages),
                }
            }
        }
        out.insert(name.clone(), messages);
    }
    out
}

fn collect_message_names(message: &serde_json::Value, out: &mut Vec<String>) {
    if let Some(name) = message.get("name").and_then(|v| v.as_str()) {
        out.push(name.to_string());
    } else if let Some(reference) = message.get("$ref").and_then(|v| v.as_str()) {
        out.push(ref_basename(reference));
    } else if let Some(one_of) = message.get("oneOf").and_then(|v| v.as_array()) {
        for m in one_of {
            collect_message_names(m, out);
        }
    }
}

fn ref_basename(reference: &str) -> String {
    reference.rsplit('/').next().unwrap_or(reference).to_string()
}

/// Resolve a local `#/a/b/c` JSON pointer against the document root.
fn resolve_ref(doc: &serde_json::Value, reference: &str) -> Option<serde_json::Value> {
    let path = reference.strip_prefix("#/")?;
    let mut cur = doc;
    for segment in path.split('/') {
        cur = cur.get(segment)?;
    }
    Some(cur.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_v2_publish_and_subscribe_messages() {
        let doc = serde_json::json!({
            "asyncapi": "2.6.0",
            "channels": {
                "orders": {
                    "subscribe": { "message": { "name": "OrderPlaced" } },
                    "publish": { "message": { "name": "OrderShipped" } }
                }
            }
        });
        let channels = extract_v2_channels(&doc);
        let mut got = channels["orders"].clone();
        got.sort();
        assert_eq!(got, vec!["OrderPlaced".to_string(), "OrderShipped".to_string()]);
    }

    #[test]
    fn extracts_v3_messages_resolving_refs() {
        let doc = serde_json::json!({
            "asyncapi": "3.0.0",
            "channels": {
                "orders": {
                    "messages": {
                        "orderPlaced": { "$ref": "#/components/messages/OrderPlaced" }
                    }
                }
            },
            "components": {
                "messages": {
                    "OrderPlaced": { "name": "OrderPlaced" }
                }
            }
        });
        let channels = extract_v3_channels(&doc);
        assert_eq!(channels["orders"], vec!["OrderPlaced".to_string()]);
    }
}
