//! Diagram builder (§4.3): accumulates nodes, edges, and clusters with
//! stable synthetic ids and emits `(diagramSource, metadata)`.
//!
//! `IndexMap` gives "first wins on duplicate id" and "insertion-order
//! ids" for free instead of a hand-tracked counter plus a dedup set.

use indexmap::IndexMap;

use super::escape::escape_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    RoundedBox,
    Box,
    Ellipse,
}

impl Shape {
    fn dot_attrs(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Shape::RoundedBox => &[("shape", "box"), ("style", "rounded")],
            Shape::Box => &[("shape", "box")],
            Shape::Ellipse => &[("shape", "ellipse")],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeLayout {
    pub label: String,
    pub fill_color: Option<String>,
    pub shape: Shape,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub layout: NodeLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStyle {
    Normal,
    Backward,
    ProvidedBy,
    DependsOn,
    Owner,
    Contains,
    Subcomponent,
    SystemLink,
}

impl EdgeStyle {
    fn default_label(self) -> Option<&'static str> {
        match self {
            EdgeStyle::Owner => Some("owner"),
            EdgeStyle::Contains => Some("part-of"),
            EdgeStyle::Subcomponent => Some("sub-of"),
            _ => None,
        }
    }

    fn is_reversed(self) -> bool {
        matches!(
            self,
            EdgeStyle::Backward
                | EdgeStyle::ProvidedBy
                | EdgeStyle::Owner
                | EdgeStyle::Contains
                | EdgeStyle::Subcomponent
        )
    }

    fn dot_attrs(self) -> Vec<(&'static str, &'static str)> {
        let mut attrs = Vec::new();
        if self.is_reversed() {
            attrs.push(("dir", "back"));
        }
        match self {
            EdgeStyle::ProvidedBy => attrs.push(("arrowtail", "empty")),
            EdgeStyle::DependsOn => attrs.push(("style", "dashed")),
            EdgeStyle::SystemLink => attrs.push(("class", "system-link")),
            _ => {}
        }
        attrs
    }
}

#[derive(Debug, Clone)]
pub struct EdgeLayout {
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub tooltip_attrs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub layout: EdgeLayout,
}

#[derive(Debug, Clone, Default)]
pub struct NodeMeta {
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeMeta {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub tooltip_attrs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterMeta {
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiagramMetadata {
    pub nodes: IndexMap<String, NodeMeta>,
    pub edges: IndexMap<String, EdgeMeta>,
    pub clusters: IndexMap<String, ClusterMeta>,
}

enum Op {
    StartCluster(String),
    EndCluster,
    Node(String),
    Edge(String),
}

#[derive(Default)]
pub struct DiagramBuilder {
    nodes: IndexMap<String, Node>,
    edges: IndexMap<String, Edge>,
    clusters: IndexMap<String, String>,
    ops: Vec<Op>,
    cluster_depth: usize,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {}

    pub fn end(&mut self) {}

    pub fn start_cluster(&mut self, label: &str) -> String {
        let id = format!("cluster-{}", self.clusters.len());
        self.clusters.insert(id.clone(), label.to_string());
        self.ops.push(Op::StartCluster(id.clone()));
        self.cluster_depth += 1;
        id
    }

    pub fn end_cluster(&mut self) {
        if self.cluster_depth > 0 {
            self.cluster_depth -= 1;
            self.ops.push(Op::EndCluster);
        }
    }

    /// Duplicate ids are silently ignored; first wins.
    pub fn add_node(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            return;
        }
        self.ops.push(Op::Node(node.id.clone()));
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn add_edge(&mut self, edge: Edge) -> String {
        let id = format!("edge-{}", self.edges.len());
        self.ops.push(Op::Edge(id.clone()));
        self.edges.insert(id.clone(), edge);
        id
    }

    pub fn metadata(&self) -> DiagramMetadata {
        let mut meta = DiagramMetadata::default();
        for (id, n) in &self.nodes {
            meta.nodes.insert(
                id.clone(),
                NodeMeta {
                    label: n.layout.label.clone(),
                },
            );
        }
        for (id, e) in &self.edges {
            meta.edges.insert(
                id.clone(),
                EdgeMeta {
                    from: e.from.clone(),
                    to: e.to.clone(),
                    label: e.layout.label.clone().or_else(|| e.layout.style.default_label().map(String::from)),
                    tooltip_attrs: e.layout.tooltip_attrs.clone(),
                },
            );
        }
        for (id, label) in &self.clusters {
            meta.clusters.insert(
                id.clone(),
                ClusterMeta {
                    label: label.clone(),
                },
            );
        }
        meta
    }

    /// Render the diagram source text. Attribute emission order within a
    /// node/edge is alphabetical, for stable output across runs.
    pub fn source(&self) -> String {
        let mut out = String::from("digraph {\n");
        let mut indent = 1usize;
        let mut edge_iter = self.edges.values();
        for op in &self.ops {
            match op {
                Op::StartCluster(id) => {
                    let label = &self.clusters[id];
                    out.push_str(&"  ".repeat(indent));
                    out.push_str(&format!("subgraph \"{id}\" {{\n"));
                    indent += 1;
                    out.push_str(&"  ".repeat(indent));
                    out.push_str(&format!("label=\"{}\";\n", escape_label(label)));
                }
                Op::EndCluster => {
                    indent = indent.saturating_sub(1);
                    out.push_str(&"  ".repeat(indent));
                    out.push_str("}\n");
                }
                Op::Node(id) => {
                    let node = &self.nodes[id];
                    let mut attrs: Vec<(String, String)> = vec![(
                        "label".to_string(),
                        escape_label(&node.layout.label),
                    )];
                    if let Some(fill) = &node.layout.fill_color {
                        attrs.push(("fillcolor".to_string(), fill.clone()));
                    }
                    for (k, v) in node.layout.shape.dot_attrs() {
                        attrs.push((k.to_string(), v.to_string()));
                    }
                    attrs.sort_by(|a, b| a.0.cmp(&b.0));
                    out.push_str(&"  ".repeat(indent));
                    out.push_str(&format!("\"{id}\" [{}];\n", render_attrs(&attrs)));
                }
                Op::Edge(_id) => {
                    let edge = edge_iter.next().expect("ops and edges stay in lockstep");
                    let mut attrs: Vec<(String, String)> = edge
                        .layout
                        .style
                        .dot_attrs()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    let label = edge
                        .layout
                        .label
                        .clone()
                        .or_else(|| edge.layout.style.default_label().map(String::from));
                    if let Some(label) = label {
                        attrs.push(("label".to_string(), escape_label(&label)));
                    }
                    if !edge.layout.tooltip_attrs.is_empty() {
                        attrs.push(("tooltip".to_string(), escape_label(&edge.layout.tooltip_attrs.join("|"))));
                    }
                    attrs.sort_by(|a, b| a.0.cmp(&b.0));
                    out.push_str(&"  ".repeat(indent));
                    out.push_str(&format!(
                        "\"{}\" -> \"{}\" [{}];\n",
                        edge.from,
                        edge.to,
                        render_attrs(&attrs)
                    ));
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

fn render_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            layout: NodeLayout {
                label: id.to_string(),
                fill_color: None,
                shape: Shape::Box,
            },
        }
    }

    #[test]
    fn duplicate_node_id_first_wins() {
        let mut b = DiagramBuilder::new();
        b.add_node(Node {
            id: "n1".into(),
            layout: NodeLayout {
                label: "first".into(),
                fill_color: None,
                shape: Shape::Box,
            },
        });
        b.add_node(Node {
            id: "n1".into(),
            layout: NodeLayout {
                label: "second".into(),
                fill_color: None,
                shape: Shape::Box,
            },
        });
        let meta = b.metadata();
        assert_eq!(meta.nodes["n1"].label, "first");
    }

    #[test]
    fn edge_ids_are_monotonic_insertion_order() {
        let mut b = DiagramBuilder::new();
        b.add_node(node("a"));
        b.add_node(node("b"));
        let e1 = b.add_edge(Edge {
            from: "a".into(),
            to: "b".into(),
            layout: EdgeLayout {
                label: None,
                style: EdgeStyle::Normal,
                tooltip_attrs: vec![],
            },
        });
        let e2 = b.add_edge(Edge {
            from: "b".into(),
            to: "a".into(),
            layout: EdgeLayout {
                label: None,
                style: EdgeStyle::Normal,
                tooltip_attrs: vec![],
            },
        });
        assert_eq!(e1, "edge-0");
        assert_eq!(e2, "edge-1");
    }

    #[test]
    fn cluster_ids_are_monotonic() {
        let mut b = DiagramBuilder::new();
        let c1 = b.start_cluster("first");
        b.end_cluster();
        let c2 = b.start_cluster("second");
        b.end_cluster();
        assert_eq!(c1, "cluster-0");
        assert_eq!(c2, "cluster-1");
    }

    #[test]
    fn edge_style_default_labels() {
        let mut b = DiagramBuilder::new();
        b.add_node(node("c"));
        b.add_node(node("owner"));
        b.add_edge(Edge {
            from: "c".into(),
            to: "owner".into(),
            layout: EdgeLayout {
                label: None,
                style: EdgeStyle::Owner,
                tooltip_attrs: vec![],
            },
        });
        let meta = b.metadata();
        assert_eq!(meta.edges["edge-0"].label.as_deref(), Some("owner"));
    }

    #[test]
    fn source_is_deterministic_for_identical_input() {
        let build = || {
            let mut b = DiagramBuilder::new();
            b.add_node(node("a"));
            b.add_node(node("b"));
            b.add_edge(Edge {
                from: "a".into(),
                to: "b".into(),
                layout: EdgeLayout {
                    label: Some("x".into()),
                    style: EdgeStyle::DependsOn,
                    tooltip_attrs: vec![],
                },
            });
            b.source()
        };
        assert_eq!(build(), build());
    }
}
