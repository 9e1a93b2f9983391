//! The plugin pipeline (§4.5): trigger/inhibit-gated enrichment run over
//! a scratch directory, plus the built-in plugin kinds.

mod kinds;
mod registry;

pub use kinds::{AsyncApiImporter, ExternalPlugin, MavenArtifactExtractor, TimestampPlugin};
pub use registry::{Plugin, PluginContext, PluginDefinition, PluginOutput, PluginRegistry};
