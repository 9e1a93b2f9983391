//! Diagram generation (§4.3): a deterministic builder plus the
//! catalog-specific view generators that drive it.

pub mod builder;
pub mod escape;
pub mod views;

pub use builder::{
    ClusterMeta, DiagramBuilder, DiagramMetadata, Edge, EdgeLayout, EdgeMeta, EdgeStyle, Node, NodeLayout, NodeMeta,
    Shape,
};
pub use escape::escape_label;
pub use views::{
    api_view, arbitrary_set_view, component_view, domain_view, resource_view, system_external_view,
    system_internal_view,
};
