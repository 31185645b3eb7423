use serde::{Deserialize, Serialize};

use super::Language;

/// Default sliding-window size for fixed chunks, in lines.
pub const CHUNK_WINDOW: u32 = 200;
/// Default overlap between consecutive fixed chunks, in lines.
pub const CHUNK_OVERLAP: u32 = 40;

/// How a chunk span was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Derived from one or more merged AST entity spans.
    AstRegion,
    /// A sliding window over ranges no AST entity covers.
    Fixed,
}

/// A line-bounded code region emitted by the chunker. Spans are 0-based and
/// inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start_line: u32,
    pub end_line: u32,
    pub code: String,
    pub kind: ChunkKind,
    /// `(type, name)` of the AST entities merged into this region.
    pub entities: Vec<(String, String)>,
}

/// A function or class extracted from a parse tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEntity {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub code: String,
}

/// Output of parsing a single source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub file_path: String,
    pub language: Language,
    pub functions: Vec<ParsedEntity>,
    pub classes: Vec<ParsedEntity>,
    pub imports: Vec<String>,
    pub lines_of_code: u32,
    pub chunks: Vec<ChunkSpan>,
}

impl ParsedFile {
    pub fn entity_count(&self) -> usize {
        self.functions.len() + self.classes.len()
    }
}

/// Build the chunk list for a file: merged AST regions over the function and
/// class spans, then fixed windows over whatever those regions leave
/// uncovered. Files in unsupported languages get fixed windows only.
pub fn build_chunks(
    lines: &[&str],
    functions: &[ParsedEntity],
    classes: &[ParsedEntity],
    ast_supported: bool,
) -> Vec<ChunkSpan> {
    let total = lines.len() as u32;
    if total == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();

    if ast_supported {
        // (start, end, type, name), clamped into the file.
        let mut spans: Vec<(u32, u32, String, String)> = Vec::new();
        for f in functions {
            spans.push((
                f.start_line.min(total - 1),
                f.end_line.min(total - 1),
                "function".to_string(),
                f.name.clone(),
            ));
        }
        for c in classes {
            spans.push((
                c.start_line.min(total - 1),
                c.end_line.min(total - 1),
                "class".to_string(),
                c.name.clone(),
            ));
        }
        spans.sort_by_key(|s| (s.0, s.1));

        // Merge adjacent or overlapping spans into AST regions.
        let mut merged: Vec<(u32, u32, Vec<(String, String)>)> = Vec::new();
        for (s, e, t, n) in spans {
            match merged.last_mut() {
                Some((_, prev_end, meta)) if s <= *prev_end + 1 => {
                    *prev_end = (*prev_end).max(e);
                    meta.push((t, n));
                }
                _ => merged.push((s, e, vec![(t, n)])),
            }
        }

        let covered: Vec<(u32, u32)> = merged.iter().map(|(s, e, _)| (*s, *e)).collect();
        for (s, e, meta) in merged {
            chunks.push(ChunkSpan {
                start_line: s,
                end_line: e,
                code: join_lines(lines, s, e),
                kind: ChunkKind::AstRegion,
                entities: meta,
            });
        }

        for (rs, re) in invert_ranges(&covered, 0, total - 1) {
            for (cs, ce) in sliding_windows(rs, re, CHUNK_WINDOW, CHUNK_OVERLAP) {
                chunks.push(ChunkSpan {
                    start_line: cs,
                    end_line: ce,
                    code: join_lines(lines, cs, ce),
                    kind: ChunkKind::Fixed,
                    entities: Vec::new(),
                });
            }
        }
    } else {
        for (cs, ce) in sliding_windows(0, total - 1, CHUNK_WINDOW, CHUNK_OVERLAP) {
            chunks.push(ChunkSpan {
                start_line: cs,
                end_line: ce,
                code: join_lines(lines, cs, ce),
                kind: ChunkKind::Fixed,
                entities: Vec::new(),
            });
        }
    }

    chunks
}

fn join_lines(lines: &[&str], start: u32, end: u32) -> String {
    lines[start as usize..=(end as usize).min(lines.len() - 1)].join("\n")
}

/// Gaps between sorted, non-overlapping ranges over `[start, end]`.
fn invert_ranges(ranges: &[(u32, u32)], start: u32, end: u32) -> Vec<(u32, u32)> {
    if ranges.is_empty() {
        return if start <= end { vec![(start, end)] } else { vec![] };
    }
    let mut inverted = Vec::new();
    let mut cursor = start;
    for &(s, e) in ranges {
        if cursor < s {
            inverted.push((cursor, s - 1));
        }
        cursor = cursor.max(e.saturating_add(1));
    }
    if cursor <= end {
        inverted.push((cursor, end));
    }
    inverted
}

/// `[start, end]`-bounded windows of `window` lines with `overlap` lines of
/// overlap; the step never drops below one line.
fn sliding_windows(start: u32, end: u32, window: u32, overlap: u32) -> Vec<(u32, u32)> {
    if start > end {
        return Vec::new();
    }
    let step = window.saturating_sub(overlap).max(1);
    let mut ranges = Vec::new();
    let mut i = start;
    loop {
        let j = end.min(i + window - 1);
        ranges.push((i, j));
        if j == end {
            break;
        }
        i += step;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, start: u32, end: u32) -> ParsedEntity {
        ParsedEntity {
            name: name.to_string(),
            start_line: start,
            end_line: end,
            code: String::new(),
        }
    }

    fn lines_of(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_adjacent_spans_merge_into_one_region() {
        let owned = lines_of(30);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let funcs = vec![entity("a", 0, 4), entity("b", 5, 9)];
        let chunks = build_chunks(&lines, &funcs, &[], true);

        let ast: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::AstRegion)
            .collect();
        assert_eq!(ast.len(), 1);
        assert_eq!((ast[0].start_line, ast[0].end_line), (0, 9));
        assert_eq!(ast[0].entities.len(), 2);
    }

    #[test]
    fn test_residual_ranges_get_fixed_chunks() {
        let owned = lines_of(50);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let funcs = vec![entity("f", 10, 19)];
        let chunks = build_chunks(&lines, &funcs, &[], true);

        let fixed: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Fixed)
            .collect();
        assert_eq!(fixed.len(), 2);
        assert_eq!((fixed[0].start_line, fixed[0].end_line), (0, 9));
        assert_eq!((fixed[1].start_line, fixed[1].end_line), (20, 49));
    }

    #[test]
    fn test_union_covers_whole_file() {
        let owned = lines_of(37);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let funcs = vec![entity("f", 5, 12), entity("g", 20, 25)];
        let classes = vec![entity("C", 13, 18)];
        let chunks = build_chunks(&lines, &funcs, &classes, true);

        let mut covered = vec![false; 37];
        for c in &chunks {
            assert!(c.start_line <= c.end_line);
            for line in c.start_line..=c.end_line {
                covered[line as usize] = true;
            }
        }
        assert!(covered.iter().all(|&v| v), "all lines must be covered");
    }

    #[test]
    fn test_ast_regions_are_disjoint() {
        let owned = lines_of(40);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let funcs = vec![entity("f", 0, 10), entity("g", 5, 15), entity("h", 30, 35)];
        let chunks = build_chunks(&lines, &funcs, &[], true);

        let mut ast: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::AstRegion)
            .map(|c| (c.start_line, c.end_line))
            .collect();
        ast.sort_unstable();
        for pair in ast.windows(2) {
            assert!(pair[0].1 < pair[1].0, "AST regions overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_fixed_windows_over_large_unsupported_file() {
        let owned = lines_of(500);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let chunks = build_chunks(&lines, &[], &[], false);

        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Fixed));
        assert_eq!(chunks[0].start_line, 0);
        assert_eq!(chunks[0].end_line, 199);
        // Step is window minus overlap.
        assert_eq!(chunks[1].start_line, 160);
        assert_eq!(chunks.last().unwrap().end_line, 499);
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        let chunks = build_chunks(&[], &[], &[], true);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_span_clamped_to_file() {
        let owned = lines_of(10);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let funcs = vec![entity("f", 5, 99)];
        let chunks = build_chunks(&lines, &funcs, &[], true);
        assert!(chunks.iter().all(|c| c.end_line <= 9));
    }
}
