//! The plugin registry (§4.5): trigger/inhibit query dispatch over a
//! per-run scratch directory, with last-writer-wins annotation merge.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::entity::{CatalogEntity, Entity};
use crate::error::CatalogError;
use crate::query::{Evaluator, Expr};

use super::kinds::TimestampPlugin;

/// One plugin's output for a single entity run.
#[derive(Debug, Default, Clone)]
pub struct PluginOutput {
    pub annotations: BTreeMap<String, String>,
    pub files: Vec<PathBuf>,
}

/// Everything a plugin needs besides the entity itself: the registry
/// (for composition), the run's scratch directory, and the args it was
/// invoked with (empty for composed re-invocations, to avoid arg leakage).
pub struct PluginContext<'a> {
    pub registry: &'a PluginRegistry,
    pub temp_dir: &'a Path,
    pub args: serde_json::Value,
}

pub trait Plugin: Send + Sync {
    fn run(&self, ctx: &PluginContext, entity: &Entity) -> Result<PluginOutput, CatalogError>;
}

/// `{ kind, trigger, inhibit, spec }` plus a registration `name` used to
/// address this instance from plugin composition (e.g. AsyncAPIImporter's
/// `sourcePlugin`).
pub struct PluginDefinition {
    pub name: String,
    pub kind: String,
    pub trigger: Option<String>,
    pub inhibit: Option<String>,
    pub spec: serde_json::Value,
}

struct Registration {
    definition: PluginDefinition,
    trigger: Option<Expr>,
    inhibit: Option<Expr>,
    plugin: Box<dyn Plugin>,
}

pub struct PluginRegistry {
    registrations: Vec<Registration>,
    timestamp: Box<dyn Plugin>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        PluginRegistry {
            registrations: Vec::new(),
            timestamp: Box::new(TimestampPlugin),
        }
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, compiling its trigger/inhibit queries eagerly
    /// so a malformed query fails at registration, not at the first
    /// matching entity.
    pub fn register(&mut self, definition: PluginDefinition, plugin: Box<dyn Plugin>) -> Result<(), CatalogError> {
        let trigger = definition.trigger.as_deref().map(crate::query::parse).transpose()?;
        let inhibit = definition.inhibit.as_deref().map(crate::query::parse).transpose()?;
        self.registrations.push(Registration {
            definition,
            trigger,
            inhibit,
            plugin,
        });
        Ok(())
    }

    fn matches(reg: &Registration, entity: &Entity, evaluator: &Evaluator) -> Result<bool, CatalogError> {
        let Some(trigger) = &reg.trigger else {
            return Ok(false);
        };
        if !evaluator.matches(trigger, entity)? {
            return Ok(false);
        }
        match &reg.inhibit {
            Some(inhibit) => Ok(!evaluator.matches(inhibit, entity)?),
            None => Ok(true),
        }
    }

    /// `Run(ctx, entity)` (§4.5): every registered trigger that matches
    /// fires in registration order; annotations merge last-writer-wins.
    /// A scratch temp directory is created for the run and removed on
    /// every exit path via `TempDir`'s drop.
    pub fn run(&self, entity: &Entity) -> Result<BTreeMap<String, String>, CatalogError> {
        let scratch = tempfile::TempDir::new()?;
        let evaluator = Evaluator::new();
        let mut accumulator = BTreeMap::new();
        let mut produced_any = false;

        for reg in &self.registrations {
            if !Self::matches(reg, entity, &evaluator)? {
                continue;
            }
            let ctx = PluginContext {
                registry: self,
                temp_dir: scratch.path(),
                args: serde_json::Value::Null,
            };
            let output = reg.plugin.run(&ctx, entity).map_err(|e| wrap_failure(e, &reg.definition.name, entity))?;
            if !output.annotations.is_empty() {
                produced_any = true;
            }
            accumulator.extend(output.annotations);
        }

        if produced_any {
            let ctx = PluginContext {
                registry: self,
                temp_dir: scratch.path(),
                args: serde_json::Value::Null,
            };
            let output = self.timestamp.run(&ctx, entity).map_err(|e| wrap_failure(e, "Timestamp", entity))?;
            accumulator.extend(output.annotations);
        }

        Ok(accumulator)
    }

    /// Invoke a registered plugin by name directly, bypassing trigger
    /// matching — the composition hook used by, e.g., AsyncAPIImporter's
    /// `sourcePlugin`.
    pub fn invoke_named(&self, name: &str, temp_dir: &Path, entity: &Entity) -> Result<PluginOutput, CatalogError> {
        let reg = self
            .registrations
            .iter()
            .find(|r| r.definition.name == name)
            .ok_or_else(|| CatalogError::syntax(format!("no such plugin registered: {name}")))?;
        let ctx = PluginContext {
            registry: self,
            temp_dir,
            args: serde_json::Value::Null,
        };
        reg.plugin.run(&ctx, entity).map_err(|e| wrap_failure(e, name, entity))
    }
}

fn wrap_failure(err: CatalogError, plugin: &str, entity: &Entity) -> CatalogError {
    match err {
        CatalogError::PluginFailure { .. } => err,
        other => {
            warn!(plugin, entity = %entity.entity_ref(), error = %other, "plugin failed");
            CatalogError::PluginFailure {
                plugin: plugin.to_string(),
                entity: entity.entity_ref(),
                message: other.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::GroupEntity;
    use crate::metadata::Metadata;

    struct TaggingPlugin(&'static str, &'static str);
    impl Plugin for TaggingPlugin {
        fn run(&self, _ctx: &PluginContext, _entity: &Entity) -> Result<PluginOutput, CatalogError> {
            let mut annotations = BTreeMap::new();
            annotations.insert(self.0.to_string(), self.1.to_string());
            Ok(PluginOutput {
                annotations,
                files: vec![],
            })
        }
    }

    struct FailingPlugin;
    impl Plugin for FailingPlugin {
        fn run(&self, _ctx: &PluginContext, _entity: &Entity) -> Result<PluginOutput, CatalogError> {
            Err(CatalogError::Io("boom".into()))
        }
    }

    fn entity() -> Entity {
        Entity::Group(GroupEntity {
            metadata: Metadata {
                name: "team-a".into(),
                ..Default::default()
            },
            group_type: Some("team".into()),
            ..Default::default()
        })
    }

    #[test]
    fn trigger_and_inhibit_gate_execution() {
        let mut reg = PluginRegistry::new();
        reg.register(
            PluginDefinition {
                name: "p1".into(),
                kind: "test".into(),
                trigger: Some("kind:group".into()),
                inhibit: Some("name:team-a".into()),
                spec: serde_json::Value::Null,
            },
            Box::new(TaggingPlugin("swcat.io/p1", "ran")),
        )
        .unwrap();
        let out = reg.run(&entity()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn last_writer_wins_on_conflicting_annotation() {
        let mut reg = PluginRegistry::new();
        reg.register(
            PluginDefinition {
                name: "p1".into(),
                kind: "test".into(),
                trigger: Some("kind:group".into()),
                inhibit: None,
                spec: serde_json::Value::Null,
            },
            Box::new(TaggingPlugin("swcat.io/shared", "first")),
        )
        .unwrap();
        reg.register(
            PluginDefinition {
                name: "p2".into(),
                kind: "test".into(),
                trigger: Some("kind:group".into()),
                inhibit: None,
                spec: serde_json::Value::Null,
            },
            Box::new(TaggingPlugin("swcat.io/shared", "second")),
        )
        .unwrap();
        let out = reg.run(&entity()).unwrap();
        assert_eq!(out.get("swcat.io/shared").map(String::as_str), Some("second"));
    }

    #[test]
    fn timestamp_only_runs_when_another_plugin_produced_annotations() {
        let reg = PluginRegistry::new();
        let out = reg.run(&entity()).unwrap();
        assert!(out.is_empty(), "no plugins matched, timestamp should not fire");
    }

    #[test]
    fn timestamp_fires_alongside_a_matching_plugin() {
        let mut reg = PluginRegistry::new();
        reg.register(
            PluginDefinition {
                name: "p1".into(),
                kind: "test".into(),
                trigger: Some("kind:group".into()),
                inhibit: None,
                spec: serde_json::Value::Null,
            },
            Box::new(TaggingPlugin("swcat.io/p1", "ran")),
        )
        .unwrap();
        let out = reg.run(&entity()).unwrap();
        assert!(out.contains_key("swcat.io/p1"));
        assert!(out.contains_key("swcat.io/enriched-at"));
    }

    #[test]
    fn a_failing_plugin_aborts_the_entitys_run() {
        let mut reg = PluginRegistry::new();
        reg.register(
            PluginDefinition {
                name: "p1".into(),
                kind: "test".into(),
                trigger: Some("kind:group".into()),
                inhibit: None,
                spec: serde_json::Value::Null,
            },
            Box::new(FailingPlugin),
        )
        .unwrap();
        let err = reg.run(&entity()).unwrap_err();
        assert!(matches!(err, CatalogError::PluginFailure { .. }));
    }
}
