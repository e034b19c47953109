//! arbor-cli: command-line frontend for the Arbor HTTP API
//!
//! Every subcommand acts on behalf of one owner, sent as the `x-owner-id`
//! header. `--json` prints the raw server response instead of a summary.
//!
//! # Subcommands
//! - `status`                                  : show server health
//! - `tree [--json]`                           : summarize the owner's memory tree
//! - `auto-link [--focus <id>] [...] [--json]` : discover and store connections
//! - `visualize [--focus <id>] [...] [--json]` : derive a visualization

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const OWNER_HEADER: &str = "x-owner-id";
const PREVIEW_CHARS: usize = 40;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "arbor-cli",
    version,
    about = "Arbor fragment connection graph CLI"
)]
struct Cli {
    /// Arbor HTTP server URL (overrides ARBOR_HTTP_URL env var)
    #[arg(long, env = "ARBOR_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Owner the request is made for
    #[arg(long, env = "ARBOR_OWNER", default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Arbor server status
    Status,

    /// Summarize the owner's fragments and connections
    Tree {
        /// Print the raw memory tree JSON
        #[arg(long)]
        json: bool,
    },

    /// Score fragment pairs and store the best connections
    AutoLink {
        /// Only link other fragments to this one
        #[arg(long)]
        focus: Option<String>,

        /// Lowest weight worth storing (0..=1)
        #[arg(long)]
        min_weight: Option<f64>,

        /// Maximum number of connections created
        #[arg(short = 'n', long)]
        max_connections: Option<usize>,

        /// Also create reverse connections for strong links
        #[arg(long)]
        bidirectional: bool,

        #[arg(long)]
        json: bool,
    },

    /// Derive a node/edge visualization of the graph
    Visualize {
        /// Restrict to the neighbourhood of this fragment
        #[arg(long)]
        focus: Option<String>,

        /// Traversal depth around the focus (1..=5)
        #[arg(long)]
        max_depth: Option<u32>,

        /// Node colouring: type, age, mood or tags
        #[arg(long)]
        color_by: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FragmentRef {
    pub content: String,
}

/// A stored connection as returned by POST /branches/auto-link
#[derive(Debug, Deserialize)]
pub struct LinkedBranch {
    #[serde(rename = "type")]
    pub branch_type: String,
    pub weight: f64,
    pub source: FragmentRef,
    pub target: FragmentRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub total_fragments: usize,
    pub total_connections: usize,
    pub average_connections: f64,
    pub strongest_connection: f64,
    pub connection_types: BTreeMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub stats: TreeStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSpan {
    pub days: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub clusters: usize,
    pub time_span: TimeSpan,
    pub color_legend: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct VisualizationResponse {
    pub layout: String,
    pub stats: VisualStats,
}

// ============================================================================
// Output formatting
// ============================================================================

/// First line of `content`, capped at [`PREVIEW_CHARS`] characters.
pub fn preview(content: &str) -> String {
    let line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    let mut out: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

pub fn format_tree(tree: &TreeResponse) -> String {
    let s = &tree.stats;
    let mut out = format!(
        "Fragments:    {}\nConnections:  {}\nPer fragment: {:.2}\nStrongest:    {:.2}\n",
        s.total_fragments, s.total_connections, s.average_connections, s.strongest_connection
    );
    for (kind, count) in &s.connection_types {
        out.push_str(&format!("  {:<9} {}\n", kind, count));
    }
    out
}

pub fn format_links(links: &[LinkedBranch]) -> String {
    if links.is_empty() {
        return "No new connections.\n".to_string();
    }
    let mut out = format!("Created {} connection(s)\n", links.len());
    for link in links {
        out.push_str(&format!(
            "  {:<8} {:.2}  \"{}\" -> \"{}\"\n",
            link.branch_type,
            link.weight,
            preview(&link.source.content),
            preview(&link.target.content)
        ));
    }
    out
}

pub fn format_visualization(viz: &VisualizationResponse) -> String {
    let s = &viz.stats;
    let mut out = format!(
        "Layout:    {}\nNodes:     {}\nEdges:     {}\nClusters:  {}\nSpan:      {} day(s)\n",
        viz.layout, s.total_nodes, s.total_edges, s.clusters, s.time_span.days
    );
    if !s.color_legend.is_empty() {
        out.push_str("Legend:\n");
        for (label, color) in &s.color_legend {
            out.push_str(&format!("  {} {}\n", color, label));
        }
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
    owner: String,
}

impl Api {
    fn new(server: &str, owner: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
        })
    }

    fn get(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}{}", self.server, path);
        let resp = self.client.get(&url).header(OWNER_HEADER, &self.owner).send();
        Self::read(&url, resp)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}{}", self.server, path);
        let resp = self
            .client
            .post(&url)
            .header(OWNER_HEADER, &self.owner)
            .json(body)
            .send();
        Self::read(&url, resp)
    }

    fn read(
        url: &str,
        resp: reqwest::Result<reqwest::blocking::Response>,
    ) -> anyhow::Result<serde_json::Value> {
        let resp = resp.map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("server returned {}: {}", status, body);
        }
        Ok(resp.json()?)
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_status(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/health")?;
    println!("Arbor server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
    println!("Storage:      {}", body["storage"].as_str().unwrap_or("?"));
    println!("Backend:      {}", body["backend"].as_str().unwrap_or("?"));
    println!("Socket:       {}", body["socket"].as_str().unwrap_or("?"));
    Ok(())
}

fn do_tree(api: &Api, json: bool) -> anyhow::Result<()> {
    let body = api.get("/branches/tree")?;
    if json {
        return print_json(&body);
    }
    let tree: TreeResponse = serde_json::from_value(body)?;
    print!("{}", format_tree(&tree));
    Ok(())
}

fn do_auto_link(
    api: &Api,
    focus: Option<String>,
    min_weight: Option<f64>,
    max_connections: Option<usize>,
    bidirectional: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut request = serde_json::json!({ "bidirectional": bidirectional });
    if let Some(focus) = focus {
        request["focusFragmentId"] = focus.into();
    }
    if let Some(w) = min_weight {
        request["minWeight"] = w.into();
    }
    if let Some(n) = max_connections {
        request["maxConnections"] = n.into();
    }

    let body = api.post("/branches/auto-link", &request)?;
    if json {
        return print_json(&body);
    }
    let links: Vec<LinkedBranch> = serde_json::from_value(body)?;
    print!("{}", format_links(&links));
    Ok(())
}

fn do_visualize(
    api: &Api,
    focus: Option<String>,
    max_depth: Option<u32>,
    color_by: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut request = serde_json::json!({});
    if let Some(focus) = focus {
        request["focusFragmentId"] = focus.into();
    }
    if let Some(depth) = max_depth {
        request["maxDepth"] = depth.into();
    }
    if let Some(color_by) = color_by {
        request["colorBy"] = color_by.to_lowercase().into();
    }

    let body = api.post("/branches/visualization", &request)?;
    if json {
        return print_json(&body);
    }
    let viz: VisualizationResponse = serde_json::from_value(body)?;
    print!("{}", format_visualization(&viz));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = Api::new(&cli.server, &cli.owner).and_then(|api| match cli.command {
        Commands::Status => do_status(&api),
        Commands::Tree { json } => do_tree(&api, json),
        Commands::AutoLink {
            focus,
            min_weight,
            max_connections,
            bidirectional,
            json,
        } => do_auto_link(&api, focus, min_weight, max_connections, bidirectional, json),
        Commands::Visualize {
            focus,
            max_depth,
            color_by,
            json,
        } => do_visualize(&api, focus, max_depth, color_by, json),
    });

    if let Err(e) = result {
        eprintln!("arbor-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========================================================================
    // TEST 1: preview takes the first non-empty line
    // ========================================================================
    #[test]
    fn test_preview_first_nonempty_line() {
        assert_eq!(preview("\n\n  Walk by the river \nsecond"), "Walk by the river");
        assert_eq!(preview(""), "");
    }

    // ========================================================================
    // TEST 2: preview truncates long lines with an ellipsis
    // ========================================================================
    #[test]
    fn test_preview_truncation() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));

        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    // ========================================================================
    // TEST 3: memory tree response parses and summarizes
    // ========================================================================
    #[test]
    fn test_format_tree() {
        let body = json!({
            "nodes": [],
            "edges": [],
            "stats": {
                "totalFragments": 4,
                "totalConnections": 3,
                "averageConnections": 1.5,
                "strongestConnection": 0.9,
                "connectionTypes": {"THEME": 2, "TIME": 1}
            }
        });
        let tree: TreeResponse = serde_json::from_value(body).unwrap();
        let out = format_tree(&tree);
        assert!(out.contains("Fragments:    4"));
        assert!(out.contains("Per fragment: 1.50"));
        assert!(out.contains("THEME"));
        // BTreeMap keeps type lines sorted
        assert!(out.find("THEME").unwrap() < out.find("TIME").unwrap());
    }

    // ========================================================================
    // TEST 4: auto-link response formatting
    // ========================================================================
    #[test]
    fn test_format_links() {
        let body = json!([{
            "id": "b1",
            "type": "THEME",
            "weight": 0.6,
            "metadata": {},
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "source": {"id": "f1", "content": "Morning run", "type": "TEXT", "tags": [], "createdAt": "2024-01-01T00:00:00Z"},
            "target": {"id": "f2", "content": "Evening swim", "type": "TEXT", "tags": [], "createdAt": "2024-01-01T00:00:00Z"}
        }]);
        let links: Vec<LinkedBranch> = serde_json::from_value(body).unwrap();
        let out = format_links(&links);
        assert!(out.starts_with("Created 1 connection(s)"));
        assert!(out.contains("0.60"));
        assert!(out.contains("\"Morning run\" -> \"Evening swim\""));
    }

    // ========================================================================
    // TEST 5: empty auto-link result
    // ========================================================================
    #[test]
    fn test_format_links_empty() {
        assert_eq!(format_links(&[]), "No new connections.\n");
    }

    // ========================================================================
    // TEST 6: visualization summary includes legend entries
    // ========================================================================
    #[test]
    fn test_format_visualization() {
        let body = json!({
            "nodes": [],
            "edges": [],
            "layout": "force",
            "stats": {
                "totalNodes": 2,
                "totalEdges": 1,
                "clusters": 1,
                "timeSpan": {"start": "2024-01-01T00:00:00Z", "end": "2024-01-03T00:00:00Z", "days": 2},
                "colorLegend": {"TEXT": "#3B82F6"},
                "sizeLegend": {"min": 1.0, "max": 1.0, "metric": "connections"}
            }
        });
        let viz: VisualizationResponse = serde_json::from_value(body).unwrap();
        let out = format_visualization(&viz);
        assert!(out.contains("Layout:    force"));
        assert!(out.contains("Span:      2 day(s)"));
        assert!(out.contains("#3B82F6 TEXT"));
    }

    // ========================================================================
    // TEST 7: CLI parses subcommands and flags
    // ========================================================================
    #[test]
    fn test_cli_parses_auto_link() {
        let cli = Cli::try_parse_from([
            "arbor-cli",
            "--owner",
            "u1",
            "auto-link",
            "--focus",
            "f1",
            "--min-weight",
            "0.5",
            "-n",
            "3",
            "--bidirectional",
        ])
        .unwrap();
        assert_eq!(cli.owner, "u1");
        match cli.command {
            Commands::AutoLink {
                focus,
                min_weight,
                max_connections,
                bidirectional,
                json,
            } => {
                assert_eq!(focus.as_deref(), Some("f1"));
                assert_eq!(min_weight, Some(0.5));
                assert_eq!(max_connections, Some(3));
                assert!(bidirectional);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
