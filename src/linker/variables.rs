//! References to exported variables from the files that import them.
//!
//! Edges from this pass are file-granularity: the caller is the importing
//! file's path, not an atom id.

use super::{AtomGraph, LinkIndex, ProjectFacts};
use crate::model::AtomKind;
use anyhow::Result;
use std::collections::HashMap;

pub fn run(graph: &mut AtomGraph, _index: &LinkIndex, facts: &ProjectFacts) -> Result<usize> {
    // (exporting file, exported name) → [(importing file, local name)]
    let mut importers: HashMap<(&str, &str), Vec<(&str, &str)>> = HashMap::new();
    let mut paths: Vec<&String> = facts.files.keys().collect();
    paths.sort();
    for path in paths {
        let Some(file_facts) = facts.file(path) else {
            continue;
        };
        let mut locals: Vec<(&String, _)> = file_facts.named_imports.iter().collect();
        locals.sort_by(|a, b| a.0.cmp(b.0));
        for (local, named) in locals {
            importers
                .entry((named.file.as_str(), named.imported.as_str()))
                .or_default()
                .push((path.as_str(), local.as_str()));
        }
    }

    let mut edges = 0;
    for idx in 0..graph.len() {
        let atom = graph.atom(idx)?;
        if atom.is_removed() || atom.kind != AtomKind::Variable || !atom.is_exported {
            continue;
        }
        let Some(users) = importers.get(&(atom.file_path.as_str(), atom.name.as_str())) else {
            continue;
        };
        let mut hits = Vec::new();
        for (path, local) in users {
            if *path == atom.file_path {
                continue;
            }
            let referenced = facts
                .file(path)
                .is_some_and(|file| file.lines.iter().any(|line| references(line, local)));
            if referenced {
                hits.push(path.to_string());
            }
        }
        for path in hits {
            if graph.add_edge(idx, &path)? {
                edges += 1;
            }
        }
    }
    Ok(edges)
}

/// A bare use of `local` on a line that neither imports, exports nor
/// declares it.
fn references(line: &str, local: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("import ")
        || trimmed.starts_with("export ")
        || trimmed.contains("require(")
        || declares(trimmed, local)
    {
        return false;
    }
    let bytes = line.as_bytes();
    line.match_indices(local).any(|(start, _)| {
        let end = start + local.len();
        let before_ok =
            start == 0 || (!is_ident_byte(bytes[start - 1]) && bytes[start - 1] != b'.');
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        before_ok && after_ok
    })
}

fn declares(line: &str, local: &str) -> bool {
    ["const ", "let ", "var ", "function ", "class "]
        .iter()
        .filter_map(|keyword| line.strip_prefix(keyword))
        .any(|rest| {
            rest.trim_start()
                .strip_prefix(local)
                .is_some_and(|after| !after.bytes().next().is_some_and(is_ident_byte))
        })
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}
