#![no_main]

use fg_core::ParticleRegistry;
use fg_render_tikz::{TikzConfig, export_geometry, render_tikz};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(parsed) = fg_parser::parse_graph(input) else {
        return;
    };
    assert!(parsed.graph.dangling_edges().is_empty());

    let layout = fg_layout::layout(&parsed.graph);
    assert_eq!(layout.vertices.len(), parsed.graph.vertices.len());
    assert_eq!(layout.edges.len(), parsed.graph.edges.len());

    let registry = ParticleRegistry::new();
    let tikz = render_tikz(&parsed.graph, &layout, &TikzConfig::default(), &registry);
    assert!(tikz.ends_with("};"));
    let _ = serde_json::to_string(&export_geometry(&parsed.graph, &layout, &registry));
});
