#![forbid(unsafe_code)]

//! tikz-feynman output for laid-out Feynman topologies.
//!
//! [`render_tikz`] writes a `\feynmandiagram` block with one line per edge,
//! [`render_document`] wraps it into a compilable standalone file, and
//! [`export_geometry`] flattens the layout for tools that draw on their own.

mod document;
mod geometry;

pub use document::TexDocument;
pub use geometry::{
    DEFAULT_NODE_STYLE, GeometryEdge, GeometryExport, GeometryNode, export_geometry,
};

use std::collections::{BTreeMap, BTreeSet};

use fg_core::{Graph, ParticleLookup, VertexId, VertexKind};
use fg_layout::LayoutResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for TikZ rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TikzConfig {
    /// Bend angle in degrees of the outermost edge of a parallel group.
    pub max_bend: f32,
    /// Ask tikz-feynman for its layered layout algorithm.
    pub layered_layout: bool,
    /// Emit a full LaTeX document instead of the bare diagram.
    pub standalone: bool,
    /// Angles at or below this magnitude are drawn straight.
    pub straight_threshold: f32,
}

impl Default for TikzConfig {
    fn default() -> Self {
        Self {
            max_bend: 50.0,
            layered_layout: false,
            standalone: false,
            straight_threshold: 0.1,
        }
    }
}

/// Bend angle in degrees for edge `index` of `count` parallel edges.
///
/// The group fans out symmetrically from `-max_bend` to `max_bend`; a lone
/// edge is straight.
#[must_use]
pub fn parallel_bend_angle(index: usize, count: usize, max_bend: f32) -> f32 {
    if count < 2 {
        return 0.0;
    }
    let step = (max_bend * 2.0) / (count - 1) as f32;
    -max_bend + step * index as f32
}

/// Render a topology as a `\feynmandiagram` block.
#[must_use]
pub fn render_tikz(
    graph: &Graph,
    layout: &LayoutResult,
    config: &TikzConfig,
    lookup: &impl ParticleLookup,
) -> String {
    let styles = graph.styles();
    let mut styled: BTreeSet<VertexId> = BTreeSet::new();
    let mut label_usage: BTreeMap<VertexId, usize> = BTreeMap::new();

    let lines: Vec<String> = layout
        .edges
        .iter()
        .filter_map(|geometry| {
            let edge = graph.edges.get(geometry.edge_index)?;
            let src = graph.vertex_name(edge.from)?;
            let dst = graph.vertex_name(edge.to)?;
            let info = lookup.lookup(&edge.particle);
            let reversed = info.renders_reversed();

            // A vertex style is declared on the first appearance only.
            let mut declare = |vertex: VertexId| match styles.get(&vertex) {
                Some(style) if styled.insert(vertex) => format!("[{style}]"),
                _ => String::new(),
            };
            let src_attr = declare(edge.from);
            let dst_attr = declare(edge.to);

            let mut options = vec![info.style.as_str().to_string()];

            let mut angle = parallel_bend_angle(
                geometry.parallel_index,
                geometry.parallel_count,
                config.max_bend,
            );
            if reversed {
                angle = -angle;
            }
            if angle.abs() > config.straight_threshold {
                let side = if angle > 0.0 { "left" } else { "right" };
                options.push(format!("bend {side}={}", angle.trunc().abs() as i64));
            }

            let usage = label_usage.entry(edge.from).or_insert(0);
            let label_side = if *usage % 2 == 1 { "'" } else { "" };
            *usage += 1;
            if !info.label.is_empty() {
                options.push(format!("edge label{label_side}=\\({}\\)", info.label));
            }

            let options = options.join(", ");
            Some(if reversed {
                format!("  {dst}{dst_attr} -- [{options}] {src}{src_attr}")
            } else {
                format!("  {src}{src_attr} -- [{options}] {dst}{dst_attr}")
            })
        })
        .collect();

    debug!(
        lines = lines.len(),
        styled_vertices = styled.len(),
        "rendered tikz edges"
    );

    let mut output = String::with_capacity(64 + lines.iter().map(String::len).sum::<usize>());
    output.push_str(&diagram_header(graph, config));
    output.push('\n');
    output.push_str(&lines.join(",\n"));
    output.push_str("\n};");
    output
}

/// Render a topology as a standalone LaTeX document.
#[must_use]
pub fn render_document(
    graph: &Graph,
    layout: &LayoutResult,
    config: &TikzConfig,
    lookup: &impl ParticleLookup,
) -> String {
    TexDocument::new()
        .body(render_tikz(graph, layout, config, lookup))
        .to_string()
}

/// [`render_document`] when `config.standalone` is set, otherwise [`render_tikz`].
#[must_use]
pub fn render(
    graph: &Graph,
    layout: &LayoutResult,
    config: &TikzConfig,
    lookup: &impl ParticleLookup,
) -> String {
    if config.standalone {
        render_document(graph, layout, config, lookup)
    } else {
        render_tikz(graph, layout, config, lookup)
    }
}

fn diagram_header(graph: &Graph, config: &TikzConfig) -> String {
    let mut options: Vec<String> = Vec::new();
    if config.layered_layout {
        options.push(String::from("layered layout"));
    }
    let first_named = |kind: VertexKind| {
        graph
            .vertices
            .iter()
            .find(|vertex| vertex.kind == kind)
            .map(|vertex| vertex.name())
    };
    if let (Some(input), Some(output)) = (
        first_named(VertexKind::Input),
        first_named(VertexKind::Final),
    ) {
        options.push(format!("horizontal={input} to {output}"));
    }

    if options.is_empty() {
        String::from("\\feynmandiagram {")
    } else {
        format!("\\feynmandiagram [{}] {{", options.join(", "))
    }
}
