#![forbid(unsafe_code)]

mod particles;

pub use particles::{
    GREEK_LETTERS, LineStyle, ParticleInfo, ParticleLookup, ParticleRegistry, builtin_particle,
    decompose_name,
};

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub byte: usize,
}

impl Position {
    /// Resolve a byte offset into a 1-based line/column position.
    #[must_use]
    pub fn locate(source: &str, byte: usize) -> Self {
        let byte = byte.min(source.len());
        let prefix = source.get(..byte).unwrap_or(source);
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map_or(0, |index| index + 1);
        let col = prefix[line_start..].chars().count() + 1;
        Self { line, col, byte }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn from_bytes(source: &str, start: usize, end: usize) -> Self {
        Self::new(Position::locate(source, start), Position::locate(source, end))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FeynErrorCode {
    #[default]
    Syntax,
    Structural,
}

impl FeynErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "feyngraph/error/syntax",
            Self::Structural => "feyngraph/error/structural",
        }
    }
}

/// Failure raised while turning a reaction string into a topology.
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum FeynError {
    /// Malformed reaction text.
    #[error("{message}")]
    Syntax { message: String, span: Span },
    /// A well-formed tree whose shape matches no topology pattern.
    #[error("{message}")]
    Structural { message: String },
}

impl FeynError {
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> FeynErrorCode {
        match self {
            Self::Syntax { .. } => FeynErrorCode::Syntax,
            Self::Structural { .. } => FeynErrorCode::Structural,
        }
    }

    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => Some(*span),
            Self::Structural { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reaction tree
// ---------------------------------------------------------------------------

/// One lexical unit of a reaction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Particle(String),
    /// Parenthesised sub-reaction; its first step starts with the bridging particle.
    Cascade(ReactionTree),
    /// Particles that all flow from the current vertex into one merge vertex.
    Loop(Vec<String>),
    Anchor {
        name: String,
        particle: Option<String>,
    },
    Styled {
        token: Box<Token>,
        style: String,
    },
}

impl Token {
    #[must_use]
    pub fn particle(name: impl Into<String>) -> Self {
        Self::Particle(name.into())
    }

    /// Attach a style tag. An existing tag is replaced, never nested.
    #[must_use]
    pub fn with_style(self, style: impl Into<String>) -> Self {
        let token = match self {
            Self::Styled { token, .. } => token,
            other => Box::new(other),
        };
        Self::Styled {
            token,
            style: style.into(),
        }
    }

    #[must_use]
    pub fn style(&self) -> Option<&str> {
        match self {
            Self::Styled { style, .. } => Some(style),
            _ => None,
        }
    }

    /// The token without its style decorator.
    #[must_use]
    pub fn unstyled(&self) -> &Token {
        match self {
            Self::Styled { token, .. } => token.unstyled(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Step {
    pub tokens: Vec<Token>,
}

impl Step {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReactionTree {
    pub steps: Vec<Step>,
}

impl ReactionTree {
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Deepest cascade nesting, 0 for a flat reaction.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|step| &step.tokens)
            .filter_map(|token| match token.unstyled() {
                Token::Cascade(inner) => Some(inner.depth() + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Topology graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    /// External incoming leg.
    Input,
    Internal,
    /// External outgoing leg.
    Final,
}

impl VertexKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Internal => "internal",
            Self::Final => "final",
        }
    }

    /// Name prefix used when vertices are written out.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Input => "inx",
            Self::Internal => "vx",
            Self::Final => "fx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub kind: VertexKind,
    /// 1-based position among vertices of the same kind.
    pub ordinal: usize,
    pub style: Option<String>,
}

impl Vertex {
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.ordinal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrigin {
    Incoming,
    Propagation,
    Branch,
    Loop,
    Anchor,
}

impl EdgeOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Propagation => "propagation",
            Self::Branch => "branch",
            Self::Loop => "loop",
            Self::Anchor => "anchor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub particle: String,
    pub origin: EdgeOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub vertex: VertexId,
    pub particle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEntry {
    pub name: String,
    pub points: Vec<AnchorPoint>,
}

/// Named anchor points, iterated in first-registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<AnchorEntry>", into = "Vec<AnchorEntry>")]
pub struct AnchorRegistry {
    entries: Vec<AnchorEntry>,
    index: FxHashMap<String, usize>,
}

impl AnchorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, vertex: VertexId, particle: Option<String>) {
        let point = AnchorPoint { vertex, particle };
        if let Some(slot) = self.index.get(name).copied() {
            self.entries[slot].points.push(point);
            return;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(AnchorEntry {
            name: name.to_string(),
            points: vec![point],
        });
    }

    #[must_use]
    pub fn points(&self, name: &str) -> Option<&[AnchorPoint]> {
        self.index
            .get(name)
            .map(|slot| self.entries[*slot].points.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<AnchorEntry>> for AnchorRegistry {
    fn from(entries: Vec<AnchorEntry>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            for point in entry.points {
                registry.register(&entry.name, point.vertex, point.particle);
            }
        }
        registry
    }
}

impl From<AnchorRegistry> for Vec<AnchorEntry> {
    fn from(registry: AnchorRegistry) -> Self {
        registry.entries
    }
}

/// Feynman-diagram topology built from one reaction tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub vertices: Vec<Vertex>,
    /// Construction order; anchor edges come last.
    pub edges: Vec<Edge>,
    pub anchors: AnchorRegistry,
}

impl Graph {
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0).filter(|vertex| vertex.id == id)
    }

    #[must_use]
    pub fn vertex_name(&self, id: VertexId) -> Option<String> {
        self.vertex(id).map(Vertex::name)
    }

    #[must_use]
    pub fn count(&self, kind: VertexKind) -> usize {
        self.vertices
            .iter()
            .filter(|vertex| vertex.kind == kind)
            .count()
    }

    pub fn incoming(&self, id: VertexId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    pub fn outgoing(&self, id: VertexId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// Vertices carrying a style tag.
    #[must_use]
    pub fn styles(&self) -> BTreeMap<VertexId, &str> {
        self.vertices
            .iter()
            .filter_map(|vertex| vertex.style.as_deref().map(|style| (vertex.id, style)))
            .collect()
    }

    /// Indexes of edges that reference a vertex missing from the graph.
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| self.vertex(edge.from).is_none() || self.vertex(edge.to).is_none())
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnchorRegistry, Edge, EdgeOrigin, FeynError, FeynErrorCode, Graph, Position,
        ReactionTree, Span, Step, Token, Vertex, VertexId, VertexKind,
    };

    fn vertex(id: usize, kind: VertexKind, ordinal: usize) -> Vertex {
        Vertex {
            id: VertexId(id),
            kind,
            ordinal,
            style: None,
        }
    }

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(FeynErrorCode::Syntax.as_str(), "feyngraph/error/syntax");
        assert_eq!(
            FeynErrorCode::Structural.as_str(),
            "feyngraph/error/structural"
        );
    }

    #[test]
    fn syntax_errors_carry_span_and_structural_do_not() {
        let span = Span::from_bytes("a b", 2, 3);
        let syntax = FeynError::syntax("bad", span);
        assert_eq!(syntax.code(), FeynErrorCode::Syntax);
        assert_eq!(syntax.span(), Some(span));
        assert_eq!(syntax.to_string(), "bad");

        let structural = FeynError::structural("no pattern");
        assert_eq!(structural.code(), FeynErrorCode::Structural);
        assert_eq!(structural.span(), None);
    }

    #[test]
    fn position_locates_lines_and_columns() {
        let source = "a b\n> c";
        let position = Position::locate(source, 6);
        assert_eq!(position.line, 2);
        assert_eq!(position.col, 3);
        assert_eq!(position.byte, 6);

        let clamped = Position::locate(source, 100);
        assert_eq!(clamped.byte, source.len());
    }

    #[test]
    fn restyling_replaces_instead_of_nesting() {
        let token = Token::particle("Z0").with_style("blob").with_style("dot");
        assert_eq!(token.style(), Some("dot"));
        assert_eq!(token.unstyled(), &Token::particle("Z0"));
        match token {
            Token::Styled { token, .. } => assert_eq!(*token, Token::particle("Z0")),
            other => panic!("expected styled token, got {other:?}"),
        }
    }

    #[test]
    fn tree_depth_counts_cascade_nesting() {
        let inner = ReactionTree::new(vec![Step::new(vec![Token::particle("Z0")])]);
        let middle = ReactionTree::new(vec![Step::new(vec![
            Token::particle("H"),
            Token::Cascade(inner),
        ])]);
        let outer = ReactionTree::new(vec![Step::new(vec![
            Token::Cascade(middle).with_style("blob"),
        ])]);
        assert_eq!(outer.depth(), 2);
        assert_eq!(ReactionTree::default().depth(), 0);
    }

    #[test]
    fn vertex_names_use_kind_prefix_and_ordinal() {
        assert_eq!(vertex(0, VertexKind::Internal, 1).name(), "vx1");
        assert_eq!(vertex(1, VertexKind::Input, 2).name(), "inx2");
        assert_eq!(vertex(2, VertexKind::Final, 3).name(), "fx3");
    }

    #[test]
    fn anchor_registry_keeps_registration_order() {
        let mut anchors = AnchorRegistry::new();
        anchors.register("b", VertexId(3), None);
        anchors.register("a", VertexId(1), Some("g".to_string()));
        anchors.register("b", VertexId(5), Some("gamma".to_string()));

        let names: Vec<&str> = anchors.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        let points = anchors.points("b").expect("anchor b registered");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].vertex, VertexId(3));
        assert_eq!(points[1].particle.as_deref(), Some("gamma"));
        assert!(anchors.points("missing").is_none());
    }

    #[test]
    fn anchor_registry_serializes_as_entry_list() {
        let mut anchors = AnchorRegistry::new();
        anchors.register("x", VertexId(0), None);
        anchors.register("x", VertexId(2), None);

        let encoded = serde_json::to_value(&anchors).expect("serialize anchors");
        assert!(encoded.is_array());
        let decoded: AnchorRegistry = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded, anchors);
        assert_eq!(decoded.points("x").map(<[_]>::len), Some(2));
    }

    #[test]
    fn graph_helpers_report_counts_styles_and_dangling_edges() {
        let mut graph = Graph {
            vertices: vec![
                vertex(0, VertexKind::Internal, 1),
                vertex(1, VertexKind::Input, 1),
                vertex(2, VertexKind::Final, 1),
            ],
            edges: vec![
                Edge {
                    from: VertexId(1),
                    to: VertexId(0),
                    particle: "e-".to_string(),
                    origin: EdgeOrigin::Incoming,
                },
                Edge {
                    from: VertexId(0),
                    to: VertexId(2),
                    particle: "e-".to_string(),
                    origin: EdgeOrigin::Branch,
                },
            ],
            anchors: AnchorRegistry::new(),
        };
        graph.vertices[0].style = Some("blob".to_string());

        assert_eq!(graph.count(VertexKind::Internal), 1);
        assert_eq!(graph.incoming(VertexId(0)).count(), 1);
        assert_eq!(graph.outgoing(VertexId(0)).count(), 1);
        assert_eq!(graph.styles().get(&VertexId(0)), Some(&"blob"));
        assert_eq!(graph.vertex_name(VertexId(2)).as_deref(), Some("fx1"));
        assert!(graph.dangling_edges().is_empty());

        graph.edges.push(Edge {
            from: VertexId(0),
            to: VertexId(9),
            particle: "g".to_string(),
            origin: EdgeOrigin::Anchor,
        });
        assert_eq!(graph.dangling_edges(), vec![2]);
    }
}
