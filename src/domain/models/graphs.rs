use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Language;

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_MAX_ITERS: usize = 100;
const PAGERANK_TOLERANCE: f64 = 1e-6;

/// Directed file-import graph. Nodes are repo-relative paths; an edge
/// `A → B` means "A imports B".
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

/// Neighborhood of a file in the dependency graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyNeighbors {
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file_path: &str) {
        if !self.indices.contains_key(file_path) {
            let idx = self.graph.add_node(file_path.to_string());
            self.indices.insert(file_path.to_string(), idx);
        }
    }

    pub fn add_import(&mut self, source: &str, target: &str) {
        self.add_file(source);
        self.add_file(target);
        let s = self.indices[source];
        let t = self.indices[target];
        if !self.graph.contains_edge(s, t) {
            self.graph.add_edge(s, t, ());
        }
    }

    pub fn has_node(&self, file_path: &str) -> bool {
        self.indices.contains_key(file_path)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges as `(source, target)` path pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(s, t)| (self.graph[s].clone(), self.graph[t].clone()))
            .collect()
    }

    /// Rebuild from persisted `[source, target]` pairs.
    pub fn from_edges(edges: &[(String, String)]) -> Self {
        let mut graph = Self::new();
        for (s, t) in edges {
            graph.add_import(s, t);
        }
        graph
    }

    /// Per-file centrality in `[0, 1]`: PageRank, with degree centrality
    /// as the fallback for empty or degenerate graphs.
    pub fn centrality(&self) -> HashMap<String, f64> {
        if self.graph.node_count() == 0 {
            return HashMap::new();
        }
        match self.pagerank() {
            Some(scores) => scores,
            None => self.degree_centrality(),
        }
    }

    fn pagerank(&self) -> Option<HashMap<String, f64>> {
        let n = self.graph.node_count();
        let n_f = n as f64;
        let mut rank = vec![1.0 / n_f; n];

        for _ in 0..PAGERANK_MAX_ITERS {
            let mut next = vec![(1.0 - PAGERANK_DAMPING) / n_f; n];
            let mut dangling = 0.0;

            for node in self.graph.node_indices() {
                let out: Vec<NodeIndex> =
                    self.graph.neighbors_directed(node, Direction::Outgoing).collect();
                let r = rank[node.index()];
                if out.is_empty() {
                    dangling += r;
                } else {
                    let share = PAGERANK_DAMPING * r / out.len() as f64;
                    for succ in out {
                        next[succ.index()] += share;
                    }
                }
            }

            let dangling_share = PAGERANK_DAMPING * dangling / n_f;
            for v in next.iter_mut() {
                *v += dangling_share;
            }

            let diff: f64 = rank
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .sum();
            rank = next;
            if diff < PAGERANK_TOLERANCE {
                break;
            }
        }

        if rank.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(
            self.graph
                .node_indices()
                .map(|i| (self.graph[i].clone(), rank[i.index()]))
                .collect(),
        )
    }

    fn degree_centrality(&self) -> HashMap<String, f64> {
        let n = self.graph.node_count();
        let denom = (n.saturating_sub(1)).max(1) as f64;
        self.graph
            .node_indices()
            .map(|i| {
                let degree = self
                    .graph
                    .neighbors_directed(i, Direction::Incoming)
                    .count()
                    + self.graph.neighbors_directed(i, Direction::Outgoing).count();
                (self.graph[i].clone(), degree as f64 / denom)
            })
            .collect()
    }

    /// Circular import groups: strongly-connected components with more than
    /// one file, plus self-importing files.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        for component in tarjan_scc(&self.graph) {
            if component.len() > 1 {
                cycles.push(component.iter().map(|&i| self.graph[i].clone()).collect());
            } else if let Some(&only) = component.first() {
                if self.graph.contains_edge(only, only) {
                    cycles.push(vec![self.graph[only].clone()]);
                }
            }
        }
        cycles
    }

    /// BFS neighborhood up to `depth` hops. `direction` is one of
    /// `imports`, `imported_by` or `both`.
    pub fn dependencies_of(&self, file_path: &str, depth: usize, direction: &str) -> DependencyNeighbors {
        let mut result = DependencyNeighbors::default();
        if !self.has_node(file_path) {
            return result;
        }
        if direction == "imports" || direction == "both" {
            result.imports = self.traverse(file_path, depth, Direction::Outgoing);
        }
        if direction == "imported_by" || direction == "both" {
            result.imported_by = self.traverse(file_path, depth, Direction::Incoming);
        }
        result
    }

    fn traverse(&self, start: &str, depth: usize, direction: Direction) -> Vec<String> {
        let start_idx = self.indices[start];
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        queue.push_back((start_idx, 0));

        let mut found = Vec::new();
        while let Some((node, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            for next in self.graph.neighbors_directed(node, direction) {
                if next == start_idx || !visited.insert(next) {
                    continue;
                }
                found.push(self.graph[next].clone());
                queue.push_back((next, d + 1));
            }
        }
        found
    }
}

/// Resolve an import statement to a repo-relative file path. Returns `None`
/// for imports that cannot map to a file in the repository (standard
/// library, packages, non-relative JavaScript specifiers).
pub fn resolve_import(import_stmt: &str, source_file: &str, language: Language) -> Option<String> {
    match language {
        Language::Python => resolve_python_import(import_stmt, source_file),
        Language::JavaScript => resolve_javascript_import(import_stmt, source_file),
        _ => None,
    }
}

fn python_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"from\s+([\w.]+)\s+import|import\s+([\w.]+)").unwrap())
}

fn js_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"from\s+['"]([^'"]+)['"]"#).unwrap())
}

fn resolve_python_import(import_stmt: &str, source_file: &str) -> Option<String> {
    let caps = python_import_re().captures(import_stmt)?;
    let module = caps.get(1).or_else(|| caps.get(2))?.as_str();

    if let Some(stripped) = module.strip_prefix('.') {
        // Relative import: each extra leading dot climbs one directory.
        let extra_dots = stripped.len() - stripped.trim_start_matches('.').len();
        let name = stripped.trim_start_matches('.');
        if name.is_empty() {
            return None;
        }
        let mut dir: Vec<&str> = source_file.split('/').collect();
        dir.pop();
        for _ in 0..extra_dots {
            dir.pop()?;
        }
        let mut parts: Vec<String> = dir.iter().map(|s| s.to_string()).collect();
        parts.extend(name.split('.').map(String::from));
        let mut path = parts.join("/");
        path.push_str(".py");
        Some(path)
    } else {
        Some(format!("{}.py", module.replace('.', "/")))
    }
}

fn resolve_javascript_import(import_stmt: &str, source_file: &str) -> Option<String> {
    let caps = js_import_re().captures(import_stmt)?;
    let spec = caps.get(1)?.as_str();
    if !spec.starts_with('.') {
        // Bare specifiers point at packages, not repository files.
        return None;
    }

    let mut parts: Vec<&str> = source_file.split('/').collect();
    parts.pop();
    for segment in spec.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    let mut path = parts.join("/");
    let has_extension = [".js", ".jsx", ".ts", ".tsx"]
        .iter()
        .any(|ext| path.ends_with(ext));
    if !has_extension {
        path.push_str(".js");
    }
    Some(path)
}

/// Normalized graph exchange format shared by the class, module and call
/// graphs: external tooling output and dynamic traces both reduce to this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl GraphNode {
    pub fn function(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind: "function".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
}

impl GraphEdge {
    pub fn calls(source: impl Into<String>, target: impl Into<String>, weight: u64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: "calls".to_string(),
            weight: Some(weight),
        }
    }
}

impl SerializedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Merge a dynamic trace: new nodes are appended, weights of existing
    /// edges accumulate, unseen edges are appended.
    pub fn merge_trace(&mut self, trace: &SerializedGraph) {
        let mut known: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        for node in &trace.nodes {
            if known.insert(node.id.clone()) {
                self.nodes.push(node.clone());
            }
        }

        let mut by_pair: HashMap<(String, String), usize> = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.source.clone(), e.target.clone()), i))
            .collect();
        for edge in &trace.edges {
            let key = (edge.source.clone(), edge.target.clone());
            match by_pair.get(&key) {
                Some(&i) => {
                    let current = self.edges[i].weight.unwrap_or(0);
                    self.edges[i].weight = Some(current + edge.weight.unwrap_or(1));
                }
                None => {
                    by_pair.insert(key, self.edges.len());
                    self.edges.push(edge.clone());
                }
            }
        }
    }

    /// Bounded slice over `calls` edges starting from `seeds`. Forward
    /// follows callees; backward follows callers.
    pub fn slice(&self, seeds: &[String], depth: usize, forward: bool) -> SerializedGraph {
        let mut forward_adj: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut backward_adj: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in self.edges.iter().filter(|e| e.kind == "calls") {
            forward_adj.entry(&edge.source).or_default().push(&edge.target);
            backward_adj.entry(&edge.target).or_default().push(&edge.source);
        }
        let adjacency = if forward { &forward_adj } else { &backward_adj };

        let mut nodes: HashMap<String, GraphNode> = HashMap::new();
        let mut edges = Vec::new();
        let mut seen: HashSet<String> = seeds.iter().cloned().collect();
        let mut queue: VecDeque<(String, usize)> =
            seeds.iter().map(|s| (s.clone(), 0)).collect();
        for seed in seeds {
            nodes.insert(seed.clone(), GraphNode::function(seed.clone()));
        }

        while let Some((current, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            let Some(next_hops) = adjacency.get(current.as_str()) else {
                continue;
            };
            for &next in next_hops {
                if forward {
                    edges.push(GraphEdge::calls(current.clone(), next, 1));
                } else {
                    edges.push(GraphEdge::calls(next, current.clone(), 1));
                }
                if seen.insert(next.to_string()) {
                    nodes.insert(next.to_string(), GraphNode::function(next));
                    queue.push_back((next.to_string(), d + 1));
                }
            }
        }

        let mut node_list: Vec<GraphNode> = nodes.into_values().collect();
        node_list.sort_by(|a, b| a.id.cmp(&b.id));
        SerializedGraph {
            nodes: node_list,
            edges,
        }
    }

    /// Render as Mermaid flowchart text.
    pub fn to_mermaid(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("graph TD\n");
        for node in &self.nodes {
            out.push_str(&format!("    {}[\"{}\"]\n", mermaid_id(&node.id), node.label));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "    {} --> {}\n",
                mermaid_id(&edge.source),
                mermaid_id(&edge.target)
            ));
        }
        out
    }
}

fn mermaid_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for f in ["a.py", "b.py", "c.py", "d.py"] {
            g.add_file(f);
        }
        g.add_import("a.py", "b.py");
        g.add_import("a.py", "c.py");
        g.add_import("b.py", "d.py");
        g.add_import("c.py", "d.py");
        g
    }

    #[test]
    fn test_centrality_favors_imported_files() {
        let scores = diamond().centrality();
        assert!(scores["d.py"] > scores["a.py"]);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-3, "pagerank sums to 1");
    }

    #[test]
    fn test_empty_graph_has_no_centrality() {
        assert!(DependencyGraph::new().centrality().is_empty());
    }

    #[test]
    fn test_cycles_detected() {
        let mut g = DependencyGraph::new();
        g.add_import("a.py", "b.py");
        g.add_import("b.py", "a.py");
        g.add_import("b.py", "c.py");
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn test_dependencies_bounded_by_depth() {
        let g = diamond();
        let one_hop = g.dependencies_of("a.py", 1, "imports");
        assert_eq!(one_hop.imports.len(), 2);
        assert!(!one_hop.imports.contains(&"d.py".to_string()));

        let two_hops = g.dependencies_of("a.py", 2, "imports");
        assert!(two_hops.imports.contains(&"d.py".to_string()));

        let inbound = g.dependencies_of("d.py", 2, "imported_by");
        assert!(inbound.imported_by.contains(&"a.py".to_string()));
    }

    #[test]
    fn test_edges_round_trip() {
        let g = diamond();
        let mut edges = g.edges();
        edges.sort();
        let rebuilt = DependencyGraph::from_edges(&edges);
        let mut rebuilt_edges = rebuilt.edges();
        rebuilt_edges.sort();
        assert_eq!(edges, rebuilt_edges);
        assert_eq!(
            g.dependencies_of("a.py", 2, "both").imports.len(),
            rebuilt.dependencies_of("a.py", 2, "both").imports.len()
        );
    }

    #[test]
    fn test_resolve_python_absolute_import() {
        assert_eq!(
            resolve_import("import a.b.c", "x.py", Language::Python),
            Some("a/b/c.py".to_string())
        );
        assert_eq!(
            resolve_import("from auth.tokens import issue", "x.py", Language::Python),
            Some("auth/tokens.py".to_string())
        );
    }

    #[test]
    fn test_resolve_python_relative_import() {
        assert_eq!(
            resolve_import("from .tokens import issue", "src/auth/login.py", Language::Python),
            Some("src/auth/tokens.py".to_string())
        );
        assert_eq!(
            resolve_import("from ..util import log", "src/auth/login.py", Language::Python),
            Some("src/util.py".to_string())
        );
    }

    #[test]
    fn test_resolve_javascript_relative_only() {
        assert_eq!(
            resolve_import(
                "import { login } from './auth'",
                "src/app.js",
                Language::JavaScript
            ),
            Some("src/auth.js".to_string())
        );
        assert_eq!(
            resolve_import(
                "import helper from '../lib/helper.ts'",
                "src/pages/home.js",
                Language::JavaScript
            ),
            Some("src/lib/helper.ts".to_string())
        );
        assert_eq!(
            resolve_import("import React from 'react'", "src/app.js", Language::JavaScript),
            None
        );
    }

    #[test]
    fn test_merge_trace_accumulates_weights() {
        let mut graph = SerializedGraph {
            nodes: vec![GraphNode::function("login"), GraphNode::function("hash_pw")],
            edges: vec![GraphEdge::calls("login", "hash_pw", 2)],
        };
        let trace = SerializedGraph {
            nodes: vec![GraphNode::function("login"), GraphNode::function("audit")],
            edges: vec![
                GraphEdge::calls("login", "hash_pw", 3),
                GraphEdge::calls("login", "audit", 1),
            ],
        };
        graph.merge_trace(&trace);

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].weight, Some(5));
    }

    #[test]
    fn test_slice_forward_and_backward() {
        let graph = SerializedGraph {
            nodes: vec![
                GraphNode::function("login"),
                GraphNode::function("hash_pw"),
                GraphNode::function("issue_token"),
            ],
            edges: vec![
                GraphEdge::calls("login", "hash_pw", 1),
                GraphEdge::calls("login", "issue_token", 1),
            ],
        };

        let forward = graph.slice(&["login".to_string()], 2, true);
        assert_eq!(forward.nodes.len(), 3);
        assert_eq!(forward.edges.len(), 2);

        let backward = graph.slice(&["hash_pw".to_string()], 2, false);
        assert_eq!(backward.nodes.len(), 2);
        assert_eq!(backward.edges[0].source, "login");
    }

    #[test]
    fn test_mermaid_render_names_nodes_and_edges() {
        let graph = SerializedGraph {
            nodes: vec![GraphNode::function("login"), GraphNode::function("hash_pw")],
            edges: vec![GraphEdge::calls("login", "hash_pw", 1)],
        };
        let text = graph.to_mermaid();
        assert!(text.starts_with("graph TD"));
        assert!(text.contains("login[\"login\"]"));
        assert!(text.contains("login --> hash_pw"));
    }
}
