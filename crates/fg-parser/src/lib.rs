#![forbid(unsafe_code)]

//! Reaction string parsing and Feynman topology construction.
//!
//! A reaction such as `u ubar > H > (Z0 > e+ e-) (Z0 > mu+ mu-)` is first read
//! into a [`ReactionTree`] by [`parse`], then interpreted into a [`Graph`] by
//! [`build_graph`]. Both stages are pure and keep no state between calls.

mod graph_builder;
mod reaction_parser;

use fg_core::{EdgeOrigin, FeynError, Graph, ReactionTree, VertexKind};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

pub use graph_builder::DEFAULT_ANCHOR_PARTICLE;

use graph_builder::GraphBuilder;

/// Tree and topology produced from one reaction string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedReaction {
    pub tree: ReactionTree,
    pub graph: Graph,
}

/// Parse a reaction string into its step/token tree.
///
/// # Errors
///
/// Returns [`FeynError::Syntax`] for empty input, unequal delimiter counts, a
/// group left open at the end of its step, or a style tag with nothing to
/// attach to.
pub fn parse(input: &str) -> Result<ReactionTree, FeynError> {
    let tree = reaction_parser::parse_reaction(input)?;
    debug!(steps = tree.len(), depth = tree.depth(), "parsed reaction");
    Ok(tree)
}

/// Interpret a reaction tree as a Feynman topology.
///
/// # Errors
///
/// Returns [`FeynError::Structural`] when the tree shape matches no topology
/// pattern, such as an empty tree or a cascade without a bridging particle.
pub fn build_graph(tree: &ReactionTree) -> Result<Graph, FeynError> {
    let mut builder = GraphBuilder::new();
    builder.build_tree(tree)?;
    let forward_edges = builder.edge_count();
    builder.connect_anchors();
    debug!(
        vertices = builder.vertex_count(),
        edges = builder.edge_count(),
        anchor_edges = builder.edge_count() - forward_edges,
        "built topology"
    );
    Ok(builder.finish())
}

/// [`parse`] followed by [`build_graph`].
///
/// # Errors
///
/// Propagates the error of whichever stage fails first.
pub fn parse_graph(input: &str) -> Result<ParsedReaction, FeynError> {
    let tree = parse(input)?;
    let graph = build_graph(&tree)?;
    Ok(ParsedReaction { tree, graph })
}

#[must_use]
pub fn parse_evidence_json(parsed: &ParsedReaction) -> String {
    let graph = &parsed.graph;
    let anchor_edges = graph
        .edges
        .iter()
        .filter(|edge| edge.origin == EdgeOrigin::Anchor)
        .count();
    json!({
        "step_count": parsed.tree.len(),
        "cascade_depth": parsed.tree.depth(),
        "vertex_count": graph.vertices.len(),
        "input_count": graph.count(VertexKind::Input),
        "internal_count": graph.count(VertexKind::Internal),
        "final_count": graph.count(VertexKind::Final),
        "edge_count": graph.edges.len(),
        "anchor_count": graph.anchors.len(),
        "anchor_edge_count": anchor_edges,
        "styled_vertex_count": graph.styles().len(),
    })
    .to_string()
}
