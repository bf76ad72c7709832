//! Plain node/edge geometry for drawing tools that do not speak TikZ.

use std::collections::BTreeMap;

use fg_core::{Graph, LineStyle, ParticleLookup};
use fg_layout::LayoutResult;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_STYLE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryNode {
    pub x: f32,
    pub y: f32,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryEdge {
    pub start_node: String,
    pub end_node: String,
    pub start: [f32; 2],
    pub end: [f32; 2],
    #[serde(rename = "type")]
    pub line_style: LineStyle,
    pub label: String,
    pub is_anti: bool,
    pub is_curved: bool,
    /// Curvature offset in construction direction, rounded to two decimals.
    pub bend: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryExport {
    /// Keyed by vertex name (`inx1`, `vx2`, ...).
    pub nodes: BTreeMap<String, GeometryNode>,
    pub edges: Vec<GeometryEdge>,
}

/// Flatten a layout into named node positions and per-edge geometry.
#[must_use]
pub fn export_geometry(
    graph: &Graph,
    layout: &LayoutResult,
    lookup: &impl ParticleLookup,
) -> GeometryExport {
    let nodes = layout
        .vertices
        .iter()
        .map(|entry| {
            let node = GeometryNode {
                x: entry.position.x,
                y: entry.position.y,
                style: entry
                    .style
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NODE_STYLE.to_string()),
            };
            (entry.name.clone(), node)
        })
        .collect();

    let edges = layout
        .edges
        .iter()
        .filter_map(|geometry| {
            let edge = graph.edges.get(geometry.edge_index)?;
            let start = layout.vertex(geometry.from)?;
            let end = layout.vertex(geometry.to)?;
            let info = lookup.lookup(&edge.particle);
            Some(GeometryEdge {
                start_node: start.name.clone(),
                end_node: end.name.clone(),
                start: [start.position.x, start.position.y],
                end: [end.position.x, end.position.y],
                line_style: info.style,
                label: info.label,
                is_anti: info.is_anti,
                is_curved: geometry.is_curved(),
                bend: round_to_hundredths(geometry.offset),
            })
        })
        .collect();

    GeometryExport { nodes, edges }
}

fn round_to_hundredths(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_NODE_STYLE, export_geometry};
    use fg_core::{LineStyle, ParticleRegistry};
    use fg_layout::layout;
    use fg_parser::parse_graph;

    #[test]
    fn exports_named_nodes_and_edges() {
        let parsed = parse_graph("e+ e- > Z0 > mu+ mu-").expect("parse graph");
        let result = layout(&parsed.graph);
        let export = export_geometry(&parsed.graph, &result, &ParticleRegistry::new());

        assert_eq!(export.nodes.len(), 6);
        assert_eq!(export.edges.len(), 5);
        assert_eq!(export.nodes["inx1"].x, 0.0);
        assert_eq!(export.nodes["vx1"].x, 150.0);
        assert_eq!(export.nodes["vx1"].style, DEFAULT_NODE_STYLE);

        let positron = &export.edges[0];
        assert_eq!(positron.start_node, "inx1");
        assert_eq!(positron.end_node, "vx1");
        assert_eq!(positron.line_style, LineStyle::Fermion);
        assert_eq!(positron.label, "e^{+}");
        assert!(positron.is_anti);
        assert!(!positron.is_curved);
        assert_eq!(positron.bend, 0.0);

        let z = &export.edges[2];
        assert_eq!(z.line_style, LineStyle::Boson);
        assert_eq!(z.start, [150.0, 50.0]);
        assert_eq!(z.end, [300.0, 50.0]);
    }

    #[test]
    fn loop_edges_are_curved_and_styles_pass_through() {
        let parsed = parse_graph("e- > [g g]{blob} > e-").expect("parse graph");
        let result = layout(&parsed.graph);
        let export = export_geometry(&parsed.graph, &result, &ParticleRegistry::new());

        let curved: Vec<f32> = export
            .edges
            .iter()
            .filter(|edge| edge.is_curved)
            .map(|edge| edge.bend)
            .collect();
        assert_eq!(curved, vec![-0.2, 0.2]);
        assert!(export.nodes.values().any(|node| node.style == "blob"));
    }

    #[test]
    fn serializes_line_style_as_type() {
        let parsed = parse_graph("u ubar > g > u ubar").expect("parse graph");
        let result = layout(&parsed.graph);
        let export = export_geometry(&parsed.graph, &result, &ParticleRegistry::new());
        let json = serde_json::to_string(&export).expect("serialize export");
        assert!(json.contains("\"type\":\"gluon\""));
        assert!(json.contains("\"start_node\":\"inx1\""));
    }
}
