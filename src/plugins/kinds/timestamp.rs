//! The Timestamp plugin (§4.5): a provenance marker, invoked only when
//! some other plugin produced annotations during the same run.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::entity::Entity;
use crate::error::CatalogError;

use super::super::registry::{Plugin, PluginContext, PluginOutput};

pub struct TimestampPlugin;

impl Plugin for TimestampPlugin {
    fn run(&self, _ctx: &PluginContext, _entity: &Entity) -> Result<PluginOutput, CatalogError> {
        let mut annotations = BTreeMap::new();
        annotations.insert("swcat.io/enriched-at".to_string(), Utc::now().to_rfc3339());
        Ok(PluginOutput {
            annotations,
            files: Vec::new(),
        })
    }
}
