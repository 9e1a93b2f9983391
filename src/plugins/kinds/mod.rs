//! Built-in plugin kinds (§4.5).

mod asyncapi;
mod external;
mod maven;
mod timestamp;

pub use asyncapi::AsyncApiImporter;
pub use external::ExternalPlugin;
pub use maven::MavenArtifactExtractor;
pub use timestamp::TimestampPlugin;
