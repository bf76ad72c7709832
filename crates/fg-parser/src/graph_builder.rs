use fg_core::{
    AnchorRegistry, Edge, EdgeOrigin, FeynError, Graph, ReactionTree, Step, Token, Vertex,
    VertexId, VertexKind,
};
use tracing::{debug, warn};

/// Label used for anchor edges registered without a particle.
pub const DEFAULT_ANCHOR_PARTICLE: &str = "gamma";

/// Issues vertex ids and per-kind ordinals for a single build.
#[derive(Debug, Default)]
pub(crate) struct VertexAllocator {
    next_id: usize,
    inputs: usize,
    internals: usize,
    finals: usize,
}

impl VertexAllocator {
    pub(crate) fn allocate(&mut self, kind: VertexKind) -> Vertex {
        let counter = match kind {
            VertexKind::Input => &mut self.inputs,
            VertexKind::Internal => &mut self.internals,
            VertexKind::Final => &mut self.finals,
        };
        *counter += 1;
        let vertex = Vertex {
            id: VertexId(self.next_id),
            kind,
            ordinal: *counter,
            style: None,
        };
        self.next_id += 1;
        vertex
    }
}

#[derive(Debug, Clone, Copy)]
enum Outgoing<'t> {
    Particle(&'t str),
    Cascade {
        tree: &'t ReactionTree,
        style: Option<&'t str>,
    },
}

#[derive(Debug, Clone, Copy)]
struct LoopGroup<'t> {
    particles: &'t [String],
    style: Option<&'t str>,
}

#[derive(Debug, Clone, Copy)]
struct AnchorRef<'t> {
    name: &'t str,
    particle: Option<&'t str>,
    style: Option<&'t str>,
}

/// Tokens of one step sorted by the role they play in the topology.
#[derive(Debug, Default)]
struct StepParts<'t> {
    outgoing: Vec<Outgoing<'t>>,
    loops: Vec<LoopGroup<'t>>,
    anchors: Vec<AnchorRef<'t>>,
    /// Last style seen on a bare particle; it marks the vertex the step leaves from.
    particle_style: Option<&'t str>,
}

impl<'t> StepParts<'t> {
    fn classify(step: &'t Step) -> Self {
        let mut parts = Self::default();
        for token in &step.tokens {
            let style = token.style();
            match token.unstyled() {
                Token::Particle(name) => {
                    if style.is_some_and(|style| !style.is_empty()) {
                        parts.particle_style = style;
                    }
                    parts.outgoing.push(Outgoing::Particle(name));
                }
                Token::Cascade(tree) => parts.outgoing.push(Outgoing::Cascade { tree, style }),
                Token::Loop(particles) => parts.loops.push(LoopGroup { particles, style }),
                Token::Anchor { name, particle } => parts.anchors.push(AnchorRef {
                    name,
                    particle: particle.as_deref(),
                    style,
                }),
                // peeled by `unstyled`
                Token::Styled { .. } => {}
            }
        }
        parts
    }

    fn has_particles(&self) -> bool {
        self.outgoing
            .iter()
            .any(|item| matches!(item, Outgoing::Particle(_)))
    }

    fn has_cascades(&self) -> bool {
        self.outgoing
            .iter()
            .any(|item| matches!(item, Outgoing::Cascade { .. }))
    }
}

/// Split a cascade into its bridging particle, its head step and the rest.
fn cascade_head(tree: &ReactionTree) -> Result<(&str, StepParts<'_>, &[Step]), FeynError> {
    let Some((head, rest)) = tree.steps.split_first() else {
        return Err(FeynError::structural("Cascade has no steps"));
    };
    let Some(Token::Particle(bridge)) = head.tokens.first().map(Token::unstyled) else {
        return Err(FeynError::structural(
            "Cascade must start with its bridging particle",
        ));
    };
    let parts = StepParts::classify(head);
    if parts.outgoing.len() > 1 {
        debug!(
            bridge = bridge.as_str(),
            extra = parts.outgoing.len() - 1,
            "cascade head carries more than its bridging particle; extras ignored"
        );
    }
    Ok((bridge.as_str(), parts, rest))
}

pub(crate) struct GraphBuilder {
    allocator: VertexAllocator,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    anchors: AnchorRegistry,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self {
            allocator: VertexAllocator::default(),
            vertices: Vec::new(),
            edges: Vec::new(),
            anchors: AnchorRegistry::new(),
        }
    }

    pub(crate) fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn finish(self) -> Graph {
        Graph {
            vertices: self.vertices,
            edges: self.edges,
            anchors: self.anchors,
        }
    }

    pub(crate) fn build_tree(&mut self, tree: &ReactionTree) -> Result<(), FeynError> {
        let Some((first, rest)) = tree.steps.split_first() else {
            return Err(FeynError::structural("Reaction has no steps"));
        };

        let parts = StepParts::classify(first);
        if !parts.loops.is_empty() {
            warn!("loop in the first step has no vertex to leave from; ignored");
        }

        match (parts.has_particles(), parts.has_cascades()) {
            (true, has_cascades) => {
                if has_cascades {
                    warn!("cascades beside incoming particles in the first step are ignored");
                }
                let start = self.add_vertex(VertexKind::Internal);
                self.register_anchors(&parts.anchors, start);
                self.mark(start, parts.particle_style);
                for item in &parts.outgoing {
                    if let Outgoing::Particle(name) = item {
                        let input = self.add_vertex(VertexKind::Input);
                        self.push_edge(input, start, name, EdgeOrigin::Incoming);
                    }
                }
                self.process_steps(start, rest)
            }
            (false, true) => {
                if !parts.anchors.is_empty() {
                    warn!(
                        anchors = parts.anchors.len(),
                        "anchors beside top-level cascades have no vertex; ignored"
                    );
                }
                if !rest.is_empty() {
                    warn!(
                        ignored_steps = rest.len(),
                        "steps after a first step of cascades are ignored"
                    );
                }
                for item in &parts.outgoing {
                    if let Outgoing::Cascade { tree, style } = *item {
                        self.root_cascade(tree, style)?;
                    }
                }
                Ok(())
            }
            (false, false) => Err(FeynError::structural(
                "First step has neither incoming particles nor cascades",
            )),
        }
    }

    fn root_cascade(&mut self, tree: &ReactionTree, style: Option<&str>) -> Result<(), FeynError> {
        let (bridge, head, rest) = cascade_head(tree)?;
        let root = self.add_vertex(VertexKind::Internal);
        self.mark(root, style);
        let input = self.add_vertex(VertexKind::Input);
        self.push_edge(input, root, bridge, EdgeOrigin::Incoming);
        self.register_anchors(&head.anchors, root);
        self.process_steps(root, rest)
    }

    fn process_steps(&mut self, current: VertexId, steps: &[Step]) -> Result<(), FeynError> {
        let Some((step, rest)) = steps.split_first() else {
            return Ok(());
        };

        let parts = StepParts::classify(step);
        self.register_anchors(&parts.anchors, current);
        self.mark(current, parts.particle_style);

        if let Some(group) = parts.loops.first() {
            let discarded = parts.loops.len() - 1 + parts.outgoing.len();
            if discarded > 0 {
                debug!(discarded, "loop consumes its step; other tokens discarded");
            }
            let merge = self.add_vertex(VertexKind::Internal);
            self.mark(merge, group.style);
            for particle in group.particles {
                self.push_edge(current, merge, particle, EdgeOrigin::Loop);
            }
            return self.process_steps(merge, rest);
        }

        match parts.outgoing.as_slice() {
            [] => self.process_steps(current, rest),
            [Outgoing::Particle(name)] if !rest.is_empty() => {
                let next = self.add_vertex(VertexKind::Internal);
                self.push_edge(current, next, name, EdgeOrigin::Propagation);
                self.process_steps(next, rest)
            }
            [Outgoing::Cascade { .. }] if !rest.is_empty() => Err(FeynError::structural(
                "A cascade cannot be followed by further steps at the same level",
            )),
            branches => {
                if !rest.is_empty() {
                    warn!(
                        ignored_steps = rest.len(),
                        "steps after a branching step are ignored"
                    );
                }
                for branch in branches {
                    self.branch(current, *branch)?;
                }
                Ok(())
            }
        }
    }

    fn branch(&mut self, current: VertexId, item: Outgoing<'_>) -> Result<(), FeynError> {
        match item {
            Outgoing::Particle(name) => {
                let outgoing = self.add_vertex(VertexKind::Final);
                self.push_edge(current, outgoing, name, EdgeOrigin::Branch);
                Ok(())
            }
            Outgoing::Cascade { tree, style } => {
                let (bridge, head, rest) = cascade_head(tree)?;
                let vertex = self.add_vertex(VertexKind::Internal);
                self.mark(vertex, style);
                self.push_edge(current, vertex, bridge, EdgeOrigin::Branch);
                self.register_anchors(&head.anchors, vertex);
                self.process_steps(vertex, rest)
            }
        }
    }

    /// Chain every anchor name's points in registration order.
    pub(crate) fn connect_anchors(&mut self) {
        for entry in self.anchors.iter() {
            if entry.points.len() < 2 {
                debug!(anchor = entry.name.as_str(), "anchor registered once; no edge");
                continue;
            }
            for pair in entry.points.windows(2) {
                let particle = pair[0]
                    .particle
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ANCHOR_PARTICLE.to_string());
                self.edges.push(Edge {
                    from: pair[0].vertex,
                    to: pair[1].vertex,
                    particle,
                    origin: EdgeOrigin::Anchor,
                });
            }
        }
    }

    fn add_vertex(&mut self, kind: VertexKind) -> VertexId {
        let vertex = self.allocator.allocate(kind);
        let id = vertex.id;
        self.vertices.push(vertex);
        id
    }

    fn mark(&mut self, vertex: VertexId, style: Option<&str>) {
        let Some(style) = style.filter(|style| !style.is_empty()) else {
            return;
        };
        if let Some(target) = self.vertices.get_mut(vertex.0) {
            target.style = Some(style.to_string());
        }
    }

    fn push_edge(&mut self, from: VertexId, to: VertexId, particle: &str, origin: EdgeOrigin) {
        self.edges.push(Edge {
            from,
            to,
            particle: particle.to_string(),
            origin,
        });
    }

    fn register_anchors(&mut self, anchors: &[AnchorRef<'_>], vertex: VertexId) {
        for anchor in anchors {
            self.mark(vertex, anchor.style);
            self.anchors
                .register(anchor.name, vertex, anchor.particle.map(str::to_string));
        }
    }
}
