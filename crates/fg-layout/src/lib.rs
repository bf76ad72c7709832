#![forbid(unsafe_code)]

use std::collections::{BTreeMap, VecDeque};

use fg_core::{Graph, ParticleLookup, ParticleRegistry, VertexId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpacing {
    /// Horizontal distance between neighbouring columns.
    pub column_spacing: f32,
    /// Vertical distance between neighbouring rows of one column.
    pub row_spacing: f32,
}

impl Default for LayoutSpacing {
    fn default() -> Self {
        Self {
            column_spacing: 150.0,
            row_spacing: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub spacing: LayoutSpacing,
    /// Curvature offset between neighbouring parallel edges.
    pub bend_step: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: LayoutSpacing::default(),
            bend_step: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutStats {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub column_count: usize,
    /// Vertex count of the most populated column.
    pub max_column_height: usize,
    pub curved_edge_count: usize,
    pub reversed_edge_count: usize,
    pub self_loop_count: usize,
    /// Queue pops spent on column propagation.
    pub propagation_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Which way a curved edge bows when walked from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BendSide {
    Left,
    Right,
    #[default]
    Straight,
}

impl BendSide {
    fn of(bend: f32) -> Self {
        if bend > 0.0 {
            Self::Left
        } else if bend < 0.0 {
            Self::Right
        } else {
            Self::Straight
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutVertex {
    pub vertex: VertexId,
    pub name: String,
    pub column: usize,
    pub row: usize,
    pub position: LayoutPoint,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub edge_index: usize,
    pub from: VertexId,
    pub to: VertexId,
    /// 0-based position among edges joining the same vertex pair.
    pub parallel_index: usize,
    pub parallel_count: usize,
    /// Centred curvature offset; 0 for edges without a parallel partner.
    pub offset: f32,
    /// `offset` with its sign flipped when the edge is drawn reversed.
    pub bend: f32,
    pub side: BendSide,
    /// The particle is drawn against the construction direction (antifermion).
    pub reversed: bool,
    pub is_self_loop: bool,
}

impl LayoutEdge {
    #[must_use]
    pub fn is_curved(&self) -> bool {
        self.parallel_count > 1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutResult {
    /// One entry per graph vertex, in vertex id order.
    pub vertices: Vec<LayoutVertex>,
    pub edges: Vec<LayoutEdge>,
    pub bounds: LayoutRect,
    pub column_count: usize,
    /// No vertex was a source, so the first vertex was taken as root.
    pub cycle_fallback: bool,
    pub stats: LayoutStats,
}

impl LayoutResult {
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&LayoutVertex> {
        self.vertices.get(id.0).filter(|entry| entry.vertex == id)
    }

    #[must_use]
    pub fn column_of(&self, id: VertexId) -> Option<usize> {
        self.vertex(id).map(|entry| entry.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutStageSnapshot {
    pub stage: &'static str,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub column_count: usize,
    pub curved_edge_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LayoutTrace {
    pub snapshots: Vec<LayoutStageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracedLayout {
    pub layout: LayoutResult,
    pub trace: LayoutTrace,
}

/// Lay out a topology with default spacing and the built-in particle table.
#[must_use]
pub fn layout(graph: &Graph) -> LayoutResult {
    layout_with_config(graph, &LayoutConfig::default())
}

#[must_use]
pub fn layout_with_config(graph: &Graph, config: &LayoutConfig) -> LayoutResult {
    layout_with_lookup(graph, config, &ParticleRegistry::new())
}

/// Lay out a topology; `lookup` decides which edges are drawn reversed.
#[must_use]
pub fn layout_with_lookup(
    graph: &Graph,
    config: &LayoutConfig,
    lookup: &impl ParticleLookup,
) -> LayoutResult {
    layout_traced_with_lookup(graph, config, lookup).layout
}

#[must_use]
pub fn layout_traced(graph: &Graph) -> TracedLayout {
    layout_traced_with_lookup(graph, &LayoutConfig::default(), &ParticleRegistry::new())
}

#[must_use]
pub fn layout_traced_with_lookup(
    graph: &Graph,
    config: &LayoutConfig,
    lookup: &impl ParticleLookup,
) -> TracedLayout {
    let mut trace = LayoutTrace::default();
    let vertex_count = graph.vertices.len();
    let edge_count = graph.edges.len();

    let columns = column_assignment(graph);
    let column_count = columns.columns.iter().max().map_or(0, |max| max + 1);
    push_snapshot(
        &mut trace,
        "column_assignment",
        vertex_count,
        edge_count,
        column_count,
        0,
    );
    debug!(
        columns = column_count,
        cycle_fallback = columns.cycle_fallback,
        propagation_steps = columns.propagation_steps,
        "assigned columns"
    );

    let (vertices, max_column_height) = coordinate_assignment(graph, &columns.columns, config.spacing);
    push_snapshot(
        &mut trace,
        "coordinate_assignment",
        vertex_count,
        edge_count,
        column_count,
        0,
    );

    let edges = build_edge_geometry(graph, config.bend_step, lookup);
    let curved_edge_count = edges.iter().filter(|edge| edge.is_curved()).count();
    push_snapshot(
        &mut trace,
        "edge_geometry",
        vertex_count,
        edge_count,
        column_count,
        curved_edge_count,
    );

    let bounds = compute_bounds(&vertices);
    let stats = LayoutStats {
        vertex_count,
        edge_count,
        column_count,
        max_column_height,
        curved_edge_count,
        reversed_edge_count: edges.iter().filter(|edge| edge.reversed).count(),
        self_loop_count: edges.iter().filter(|edge| edge.is_self_loop).count(),
        propagation_steps: columns.propagation_steps,
    };
    debug!(
        width = bounds.width,
        height = bounds.height,
        curved = curved_edge_count,
        "laid out topology"
    );

    TracedLayout {
        layout: LayoutResult {
            vertices,
            edges,
            bounds,
            column_count,
            cycle_fallback: columns.cycle_fallback,
            stats,
        },
        trace,
    }
}

struct ColumnAssignment {
    columns: Vec<usize>,
    cycle_fallback: bool,
    propagation_steps: usize,
}

/// Breadth-first longest-path columns from the source vertices.
///
/// A vertex is re-queued only when a strictly larger column is proposed, and
/// proposals are capped at `vertex_count - 1`, so propagation terminates even
/// when anchor edges close a cycle.
fn column_assignment(graph: &Graph) -> ColumnAssignment {
    let vertex_count = graph.vertices.len();
    if vertex_count == 0 {
        return ColumnAssignment {
            columns: Vec::new(),
            cycle_fallback: false,
            propagation_steps: 0,
        };
    }

    let mut targeted = vec![false; vertex_count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); vertex_count];
    for edge in &graph.edges {
        let (source, target) = (edge.from.0, edge.to.0);
        if source >= vertex_count || target >= vertex_count {
            continue;
        }
        targeted[target] = true;
        if source != target {
            outgoing[source].push(target);
        }
    }

    let mut roots: Vec<usize> = (0..vertex_count).filter(|index| !targeted[*index]).collect();
    let cycle_fallback = roots.is_empty();
    if cycle_fallback {
        roots.push(0);
    }

    let cap = vertex_count - 1;
    let mut columns: Vec<Option<usize>> = vec![None; vertex_count];
    let mut queue: VecDeque<usize> = VecDeque::new();
    for root in roots {
        columns[root] = Some(0);
        queue.push_back(root);
    }

    let mut propagation_steps = 0_usize;
    while let Some(vertex) = queue.pop_front() {
        propagation_steps = propagation_steps.saturating_add(1);
        let proposed = columns[vertex]
            .unwrap_or(0)
            .saturating_add(1)
            .min(cap);
        for target in outgoing[vertex].iter().copied() {
            if columns[target].is_none_or(|column| column < proposed) {
                columns[target] = Some(proposed);
                queue.push_back(target);
            }
        }
    }

    ColumnAssignment {
        columns: columns.into_iter().map(|column| column.unwrap_or(0)).collect(),
        cycle_fallback,
        propagation_steps,
    }
}

fn members_by_column(columns: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (vertex, column) in columns.iter().copied().enumerate() {
        members.entry(column).or_default().push(vertex);
    }
    members
}

/// Place columns at uniform spacing and centre each column's block against the tallest one.
fn coordinate_assignment(
    graph: &Graph,
    columns: &[usize],
    spacing: LayoutSpacing,
) -> (Vec<LayoutVertex>, usize) {
    let members = members_by_column(columns);
    let max_rows = members.values().map(Vec::len).max().unwrap_or(0);
    let total_height = max_rows as f32 * spacing.row_spacing;

    let mut placed: Vec<LayoutVertex> = Vec::with_capacity(graph.vertices.len());
    for (column, vertex_indexes) in members {
        let column_height = vertex_indexes.len() as f32 * spacing.row_spacing;
        let start_y = (total_height - column_height) / 2.0;
        for (row, vertex_index) in vertex_indexes.into_iter().enumerate() {
            let Some(vertex) = graph.vertices.get(vertex_index) else {
                continue;
            };
            placed.push(LayoutVertex {
                vertex: vertex.id,
                name: vertex.name(),
                column,
                row,
                position: LayoutPoint {
                    x: column as f32 * spacing.column_spacing,
                    y: start_y + row as f32 * spacing.row_spacing,
                },
                style: vertex.style.clone(),
            });
        }
    }

    placed.sort_by_key(|entry| entry.vertex);
    (placed, max_rows)
}

fn build_edge_geometry(
    graph: &Graph,
    bend_step: f32,
    lookup: &impl ParticleLookup,
) -> Vec<LayoutEdge> {
    let vertex_count = graph.vertices.len();

    // Parallel edges share an unordered endpoint pair.
    let mut pair_count: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut pair_index: Vec<usize> = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        let key = (edge.from.0.min(edge.to.0), edge.from.0.max(edge.to.0));
        let count = pair_count.entry(key).or_insert(0);
        pair_index.push(*count);
        *count += 1;
    }

    graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| edge.from.0 < vertex_count && edge.to.0 < vertex_count)
        .map(|(edge_index, edge)| {
            let key = (edge.from.0.min(edge.to.0), edge.from.0.max(edge.to.0));
            let parallel_count = pair_count.get(&key).copied().unwrap_or(1);
            let parallel_index = pair_index.get(edge_index).copied().unwrap_or(0);
            let offset = parallel_offset(parallel_index, parallel_count, bend_step);
            let reversed = lookup.lookup(&edge.particle).renders_reversed();
            let bend = if reversed { -offset } else { offset };

            LayoutEdge {
                edge_index,
                from: edge.from,
                to: edge.to,
                parallel_index,
                parallel_count,
                offset,
                bend,
                side: BendSide::of(bend),
                reversed,
                is_self_loop: edge.from == edge.to,
            }
        })
        .collect()
}

/// Offsets for `count` parallel edges, linearly spaced and centred on zero.
fn parallel_offset(index: usize, count: usize, step: f32) -> f32 {
    if count > 1 {
        (index as f32 - (count - 1) as f32 / 2.0) * step
    } else {
        0.0
    }
}

fn compute_bounds(vertices: &[LayoutVertex]) -> LayoutRect {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for entry in vertices {
        min_x = min_x.min(entry.position.x);
        min_y = min_y.min(entry.position.y);
        max_x = max_x.max(entry.position.x);
        max_y = max_y.max(entry.position.y);
    }

    if vertices.is_empty() {
        return LayoutRect::default();
    }

    LayoutRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

fn push_snapshot(
    trace: &mut LayoutTrace,
    stage: &'static str,
    vertex_count: usize,
    edge_count: usize,
    column_count: usize,
    curved_edge_count: usize,
) {
    trace.snapshots.push(LayoutStageSnapshot {
        stage,
        vertex_count,
        edge_count,
        column_count,
        curved_edge_count,
    });
}
