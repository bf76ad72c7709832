#![forbid(unsafe_code)]

//! feyngraph CLI - turn reaction strings into tikz-feynman diagrams.
//!
//! # Commands
//!
//! - `render`: Emit TikZ, a standalone LaTeX document, or geometry JSON
//! - `parse`: Output the reaction tree as JSON
//! - `graph`: Show the topology as an edge table or JSON
//! - `layout`: Output computed vertex positions and edge bends as JSON
//! - `validate`: Check a reaction and report diagnostics

mod config;

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fg_core::{FeynError, Graph, VertexKind};
use fg_layout::layout_with_lookup;
use fg_parser::{ParsedReaction, parse, parse_evidence_json, parse_graph};
use fg_render_tikz::{export_geometry, render_document, render_tikz};
use serde::Serialize;
use tracing::{debug, info, warn};

use config::FeyngraphConfig;

/// feyngraph CLI - turn reaction strings into tikz-feynman diagrams.
#[derive(Debug, Parser)]
#[command(
    name = "feyngraph",
    version,
    about = "feyngraph CLI - turn reaction strings into tikz-feynman diagrams",
    long_about = "Reads a reaction such as 'e+ e- > Z0 > mu+ mu-', builds its Feynman\n\
        topology, lays it out in columns and writes tikz-feynman markup.\n\n\
        Supports cascades '( ... )', loops '[ ... ]', anchors '@name' and\n\
        vertex styles '{blob}'."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (can be repeated for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (.toml, .yaml or .json) with layout, tikz and particle settings
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a reaction to TikZ, a LaTeX document, or geometry JSON.
    Render {
        /// Reaction text, input file path, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "tikz")]
        format: OutputFormat,

        /// Output file path. If omitted, writes to stdout.
        #[arg(short, long)]
        output: Option<String>,

        /// Ask tikz-feynman for its layered layout
        #[arg(long)]
        layered: bool,

        /// Print a JSON summary with counts and timings to stderr
        #[arg(long)]
        json: bool,
    },

    /// Parse a reaction and output its tree as JSON.
    Parse {
        /// Reaction text, input file path, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Build the topology and list its vertices and edges.
    Graph {
        /// Reaction text, input file path, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output the full graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lay out the topology and output the result as JSON.
    Layout {
        /// Reaction text, input file path, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a reaction and report diagnostics.
    Validate {
        /// Reaction text, input file path, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output as JSON (structured diagnostics)
        #[arg(long)]
        json: bool,
    },
}

/// Output format for render command.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    /// Bare \feynmandiagram block (a full document if the config asks for standalone)
    Tikz,
    /// Standalone LaTeX document
    Document,
    /// Node and edge geometry as JSON
    Geometry,
}

impl OutputFormat {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Tikz => "tikz",
            Self::Document => "document",
            Self::Geometry => "geometry",
        }
    }
}

/// Result of rendering a reaction.
#[derive(Debug, Serialize)]
struct RenderResult {
    format: String,
    vertex_count: usize,
    edge_count: usize,
    column_count: usize,
    curved_edge_count: usize,
    cycle_fallback: bool,
    output_bytes: usize,
    parse_time_ms: f64,
    layout_time_ms: f64,
    render_time_ms: f64,
    total_time_ms: f64,
}

/// Result of validating a reaction.
#[derive(Debug, Serialize)]
struct ValidateResult {
    valid: bool,
    step_count: usize,
    vertex_count: usize,
    edge_count: usize,
    errors: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
struct ValidationError {
    code: String,
    message: String,
    line: Option<usize>,
    column: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);
    let config = FeyngraphConfig::load_optional(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            input,
            format,
            output,
            layered,
            json,
        } => cmd_render(&input, format, output.as_deref(), layered, json, &config),

        Command::Parse { input, pretty } => cmd_parse(&input, pretty),

        Command::Graph { input, json } => cmd_graph(&input, json),

        Command::Layout { input, pretty } => cmd_layout(&input, pretty, &config),

        Command::Validate { input, json } => cmd_validate(&input, json),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if Path::new(input).exists() {
        std::fs::read_to_string(input).context(format!("Failed to read file: {input}"))
    } else {
        // Treat as inline reaction text
        Ok(input.to_string())
    }
}

fn write_output(output: Option<&str>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).context(format!("Failed to write to: {path}"))?;
            info!("Wrote output to: {path}");
        }
        None => {
            let mut stdout = io::stdout();
            stdout
                .write_all(content.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn load_reaction(input: &str) -> Result<ParsedReaction> {
    let source = load_input(input)?;
    parse_graph(source.trim()).context("Failed to build Feynman topology")
}

fn to_json(value: &impl Serialize, pretty: bool) -> Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(output)
}

// =============================================================================
// Command: render
// =============================================================================

fn cmd_render(
    input: &str,
    format: OutputFormat,
    output: Option<&str>,
    layered: bool,
    json_output: bool,
    config: &FeyngraphConfig,
) -> Result<()> {
    let total_start = Instant::now();

    // Parse
    let parse_start = Instant::now();
    let parsed = load_reaction(input)?;
    let parse_time = parse_start.elapsed();

    debug!(
        "Parsed: steps={}, vertices={}, edges={}",
        parsed.tree.len(),
        parsed.graph.vertices.len(),
        parsed.graph.edges.len()
    );

    // Layout
    let layout_start = Instant::now();
    let layout = layout_with_lookup(&parsed.graph, &config.layout, &config.particles);
    let layout_time = layout_start.elapsed();

    debug!(
        "Layout: bounds={}x{}, columns={}",
        layout.bounds.width, layout.bounds.height, layout.column_count
    );
    if layout.cycle_fallback {
        warn!("Topology has no source vertex; columns are approximate");
    }

    // Render
    let render_start = Instant::now();
    let mut tikz_config = config.tikz.clone();
    tikz_config.layered_layout |= layered;
    let rendered = match format {
        OutputFormat::Tikz if tikz_config.standalone => {
            render_document(&parsed.graph, &layout, &tikz_config, &config.particles)
        }
        OutputFormat::Tikz => render_tikz(&parsed.graph, &layout, &tikz_config, &config.particles),
        OutputFormat::Document => {
            render_document(&parsed.graph, &layout, &tikz_config, &config.particles)
        }
        OutputFormat::Geometry => {
            let geometry = export_geometry(&parsed.graph, &layout, &config.particles);
            serde_json::to_string_pretty(&geometry)?
        }
    };
    let render_time = render_start.elapsed();

    let total_time = total_start.elapsed();

    if json_output {
        let result = RenderResult {
            format: format.as_str().to_string(),
            vertex_count: layout.stats.vertex_count,
            edge_count: layout.stats.edge_count,
            column_count: layout.column_count,
            curved_edge_count: layout.stats.curved_edge_count,
            cycle_fallback: layout.cycle_fallback,
            output_bytes: rendered.len(),
            parse_time_ms: parse_time.as_secs_f64() * 1000.0,
            layout_time_ms: layout_time.as_secs_f64() * 1000.0,
            render_time_ms: render_time.as_secs_f64() * 1000.0,
            total_time_ms: total_time.as_secs_f64() * 1000.0,
        };

        let json_str = serde_json::to_string_pretty(&result)?;
        eprintln!("{json_str}");
    }

    write_output(output, &rendered)?;

    info!(
        "Rendered {} vertices, {} edges as {} in {:.2}ms",
        parsed.graph.vertices.len(),
        parsed.graph.edges.len(),
        format.as_str(),
        total_time.as_secs_f64() * 1000.0
    );

    Ok(())
}

// =============================================================================
// Command: parse
// =============================================================================

fn cmd_parse(input: &str, pretty: bool) -> Result<()> {
    let source = load_input(input)?;
    let tree = parse(source.trim()).context("Failed to parse reaction")?;
    println!("{}", to_json(&tree, pretty)?);
    Ok(())
}

// =============================================================================
// Command: graph
// =============================================================================

fn cmd_graph(input: &str, json_output: bool) -> Result<()> {
    let parsed = load_reaction(input)?;

    if json_output {
        println!("{}", to_json(&parsed.graph, true)?);
    } else {
        print!("{}", edge_table(&parsed.graph));
    }

    debug!("Evidence: {}", parse_evidence_json(&parsed));
    Ok(())
}

fn edge_table(graph: &Graph) -> String {
    let mut table = format!(
        "Vertices: {} ({} in, {} internal, {} out)\n",
        graph.vertices.len(),
        graph.count(VertexKind::Input),
        graph.count(VertexKind::Internal),
        graph.count(VertexKind::Final)
    );
    for vertex in graph.vertices.iter().filter(|vertex| vertex.style.is_some()) {
        let style = vertex.style.as_deref().unwrap_or_default();
        table.push_str(&format!("  {} [{style}]\n", vertex.name()));
    }

    table.push_str(&format!("Edges: {}\n", graph.edges.len()));
    for edge in &graph.edges {
        let from = graph.vertex_name(edge.from).unwrap_or_else(|| "?".into());
        let to = graph.vertex_name(edge.to).unwrap_or_else(|| "?".into());
        table.push_str(&format!(
            "  {from:<6} -> {to:<6} {:<10} {}\n",
            edge.particle,
            edge.origin.as_str()
        ));
    }

    for entry in graph.anchors.iter() {
        let points: Vec<String> = entry
            .points
            .iter()
            .filter_map(|point| graph.vertex_name(point.vertex))
            .collect();
        table.push_str(&format!("Anchor @{}: {}\n", entry.name, points.join(" -> ")));
    }
    table
}

// =============================================================================
// Command: layout
// =============================================================================

fn cmd_layout(input: &str, pretty: bool, config: &FeyngraphConfig) -> Result<()> {
    let parsed = load_reaction(input)?;
    let layout = layout_with_lookup(&parsed.graph, &config.layout, &config.particles);
    println!("{}", to_json(&layout, pretty)?);
    Ok(())
}

// =============================================================================
// Command: validate
// =============================================================================

fn cmd_validate(input: &str, json_output: bool) -> Result<()> {
    let source = load_input(input)?;
    let result = validate_source(source.trim());

    if json_output {
        let output = serde_json::to_string_pretty(&result)?;
        println!("{output}");
    } else {
        if result.valid {
            println!("✓ Valid reaction");
        } else {
            println!("✗ Invalid reaction");
        }

        println!("  Steps: {}", result.step_count);
        println!("  Vertices: {}", result.vertex_count);
        println!("  Edges: {}", result.edge_count);

        if !result.errors.is_empty() {
            println!("\nErrors:");
            for err in &result.errors {
                let location = match (err.line, err.column) {
                    (Some(l), Some(c)) => format!(" (line {l}, col {c})"),
                    (Some(l), None) => format!(" (line {l})"),
                    _ => String::new(),
                };
                println!("  [{}] {}{}", err.code, err.message, location);
            }
        }
    }

    if !result.valid {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_source(source: &str) -> ValidateResult {
    match parse_graph(source) {
        Ok(parsed) => ValidateResult {
            valid: true,
            step_count: parsed.tree.len(),
            vertex_count: parsed.graph.vertices.len(),
            edge_count: parsed.graph.edges.len(),
            errors: Vec::new(),
        },
        Err(error) => {
            let step_count = parse(source).map_or(0, |tree| tree.len());
            ValidateResult {
                valid: false,
                step_count,
                vertex_count: 0,
                edge_count: 0,
                errors: vec![validation_error(&error)],
            }
        }
    }
}

fn validation_error(error: &FeynError) -> ValidationError {
    let start = error.span().map(|span| span.start);
    let message = match error {
        FeynError::Syntax { message, .. } | FeynError::Structural { message } => message.clone(),
    };
    ValidationError {
        code: error.code().as_str().to_string(),
        message,
        line: start.map(|position| position.line),
        column: start.map(|position| position.col),
    }
}
