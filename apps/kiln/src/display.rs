//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::style;
use kiln_ops::{BuildReport, GraphReport, IdentityReport, OperationResult};
use std::io;
use std::time::Duration;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            let json = result.to_json().map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            OperationResult::Build(report) => render_build_report(report),
            OperationResult::Graph(report) => render_graph(report),
            OperationResult::Identity(report) => render_identities(report),
        }
        Ok(())
    }
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

fn render_build_report(report: &BuildReport) {
    println!(
        "{} {} ({} built, {} cached, {} steps in {:.1}s)",
        style("Finished").green().bold(),
        report.package,
        report.installed.len(),
        report.cached.len(),
        report.steps_executed,
        Duration::from_millis(report.duration_ms).as_secs_f64()
    );
    if !report.installed.is_empty() {
        println!("Install order: {}", report.installed.join(" -> "));
    }
}

fn render_graph(report: &GraphReport) {
    let mut nodes = table(&["Package", "Context", "Depth", "Options", "Identity"]);
    for node in &report.nodes {
        let options: Vec<String> = node
            .options
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        nodes.add_row(vec![
            Cell::new(&node.package),
            Cell::new(&node.context),
            Cell::new(node.depth),
            Cell::new(options.join("\n")),
            Cell::new(short(node.identity.as_deref().unwrap_or("-"))),
        ]);
    }
    println!("{nodes}");

    let mut edges = table(&["From", "To", "Kind", "Constraint"]);
    for edge in &report.edges {
        edges.add_row(vec![
            Cell::new(&edge.from),
            Cell::new(&edge.to),
            Cell::new(edge.kind),
            Cell::new(&edge.constraint),
        ]);
    }
    println!("{edges}");

    for (level, batch) in report.batches.iter().enumerate() {
        println!("batch {level}: {}", batch.join(", "));
    }
    if report.restarts > 0 {
        println!("resolution restarts: {}", report.restarts);
    }
}

fn render_identities(report: &IdentityReport) {
    let mut identities = table(&["Package", "Identity"]);
    for node in &report.nodes {
        identities.add_row(vec![Cell::new(&node.package), Cell::new(&node.identity)]);
    }
    println!("{identities}");
}

fn short(identity: &str) -> &str {
    identity.get(..12).unwrap_or(identity)
}
