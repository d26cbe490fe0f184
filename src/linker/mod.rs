//! Cross-file linking over the project-wide atom arena.
//!
//! Runs an index build followed by five resolution passes, then refreshes
//! caller patterns and classification from the final `calledBy` sets. Passes
//! are isolated from each other: a failing pass is recorded in its stats and
//! the remaining passes still run.

pub mod direct;
pub mod export_objects;
pub mod facts;
pub mod index;
pub mod instances;
pub mod namespace;
pub mod variables;

use crate::classify::{self, CallerContext};
use crate::error::IndexError;
use crate::model::{Atom, PassStats, RelationRow};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

pub use facts::{DiskSource, MemorySource, ProjectFacts, SourceProvider};
pub use index::LinkIndex;

/// Atom arena ordered by file, line and id, plus the resolved call targets
/// discovered while linking.
#[derive(Debug, Default)]
pub struct AtomGraph {
    atoms: Vec<Atom>,
    /// `(caller index, call index)` → target atom id; first resolution wins.
    resolutions: HashMap<(usize, usize), String>,
}

impl AtomGraph {
    pub fn new(mut atoms: Vec<Atom>) -> Self {
        atoms.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line.cmp(&b.line))
                .then(a.id.cmp(&b.id))
        });
        atoms.dedup_by(|a, b| a.id == b.id);
        Self {
            atoms,
            resolutions: HashMap::new(),
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atom(&self, idx: usize) -> Result<&Atom> {
        self.atoms
            .get(idx)
            .ok_or_else(|| anyhow::anyhow!("atom index {idx} out of range"))
    }

    pub fn atom_mut(&mut self, idx: usize) -> Result<&mut Atom> {
        self.atoms
            .get_mut(idx)
            .ok_or_else(|| anyhow::anyhow!("atom index {idx} out of range"))
    }

    /// Adds `caller` to the target's `calledBy`; `true` when the edge is new.
    pub fn add_edge(&mut self, target: usize, caller: &str) -> Result<bool> {
        let atom = self.atom_mut(target)?;
        if atom.is_removed() {
            return Ok(false);
        }
        Ok(atom.add_caller(caller))
    }

    pub fn record_resolution(&mut self, caller: usize, call: usize, target: usize) -> Result<()> {
        let target_id = self.atom(target)?.id.clone();
        self.resolutions.entry((caller, call)).or_insert(target_id);
        Ok(())
    }

    /// Live `(index, id, file, owner, calls)` snapshot for passes that
    /// mutate the arena while walking it.
    pub(crate) fn live_callers(&self) -> Vec<CallerView> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, atom)| !atom.is_removed() && !atom.calls.is_empty())
            .map(|(idx, atom)| CallerView {
                idx,
                id: atom.id.clone(),
                file_path: atom.file_path.clone(),
                class_name: atom.class_name.clone(),
                calls: atom
                    .calls
                    .iter()
                    .map(|call| (call.name.clone(), call.call_type))
                    .collect(),
            })
            .collect()
    }

    /// Relation rows of every live atom, with resolved targets.
    pub fn relation_rows(&self) -> Vec<RelationRow> {
        let mut rows = Vec::new();
        for (idx, atom) in self.atoms.iter().enumerate() {
            if atom.is_removed() {
                continue;
            }
            for (call_idx, call) in atom.calls.iter().enumerate() {
                rows.push(RelationRow {
                    source_atom_id: atom.id.clone(),
                    source_file: atom.file_path.clone(),
                    call_name: call.name.clone(),
                    call_type: call.call_type,
                    line: call.line,
                    target_atom_id: self.resolutions.get(&(idx, call_idx)).cloned(),
                });
            }
        }
        rows
    }

    /// Every file with at least one atom, removed or not.
    pub fn files(&self) -> Vec<String> {
        let files: BTreeSet<&str> = self.atoms.iter().map(|a| a.file_path.as_str()).collect();
        files.into_iter().map(str::to_string).collect()
    }
}

pub(crate) struct CallerView {
    pub idx: usize,
    pub id: String,
    pub file_path: String,
    pub class_name: Option<String>,
    pub calls: Vec<(String, crate::model::CallType)>,
}

pub(crate) type PassFn = fn(&mut AtomGraph, &LinkIndex, &ProjectFacts) -> Result<usize>;

const PASSES: &[(&str, PassFn)] = &[
    ("direct_calls", direct::run),
    ("namespace_calls", namespace::run),
    ("variable_references", variables::run),
    ("instance_methods", instances::run),
    ("export_objects", export_objects::run),
];

#[derive(Debug, Default)]
pub struct LinkReport {
    pub passes: Vec<PassStats>,
    pub edges_added: usize,
    pub warnings: Vec<String>,
}

/// Rebuilds `calledBy` for every live atom and refreshes classification.
///
/// Callers are reset first, so linking the same arena twice yields the
/// same graph.
pub fn link(graph: &mut AtomGraph, facts: &ProjectFacts) -> LinkReport {
    link_with(graph, facts, PASSES)
}

/// Runs `passes` in order. A pass that fails or panics is recorded and the
/// remaining passes still run.
pub(crate) fn link_with(
    graph: &mut AtomGraph,
    facts: &ProjectFacts,
    passes: &[(&str, PassFn)],
) -> LinkReport {
    graph.resolutions.clear();
    for atom in graph.atoms.iter_mut().filter(|atom| !atom.is_removed()) {
        atom.called_by.clear();
    }

    let mut report = LinkReport::default();
    let start = Instant::now();
    let index = LinkIndex::build(&graph.atoms);
    report.passes.push(PassStats {
        name: "index".to_string(),
        edges_added: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        error: None,
    });

    for (name, pass) in passes {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| pass(graph, &index, facts)));
        let mut stats = PassStats {
            name: name.to_string(),
            ..PassStats::default()
        };
        match outcome {
            Ok(Ok(edges)) => {
                stats.edges_added = edges;
                report.edges_added += edges;
            }
            Ok(Err(err)) => stats.error = Some(err.to_string()),
            Err(_) => stats.error = Some("pass panicked".to_string()),
        }
        stats.duration_ms = start.elapsed().as_millis() as u64;
        if let Some(message) = &stats.error {
            let err = IndexError::LinkingPassFailure {
                pass: name.to_string(),
                message: message.clone(),
            };
            tracing::warn!("{err}");
            report.warnings.push(err.to_string());
        } else {
            tracing::debug!(
                "pass {name}: {} edges in {}ms",
                stats.edges_added,
                stats.duration_ms
            );
        }
        report.passes.push(stats);
    }

    enrich(graph, facts);
    report
}

/// Caller patterns and archetype/purpose from the final `calledBy`.
fn enrich(graph: &mut AtomGraph, facts: &ProjectFacts) {
    for atom in graph.atoms.iter_mut().filter(|atom| !atom.is_removed()) {
        let dynamic_import_target = facts.dynamic_import_targets.contains(&atom.file_path);
        atom.signals.has_dynamic_import = dynamic_import_target;
        classify::refresh(atom);
        atom.caller_pattern = Some(classify::explain_callers(
            atom,
            CallerContext {
                dynamic_import_target,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomKind, CallRef, CallType, CallerPatternId};

    fn function(path: &str, name: &str, calls: &[&str]) -> Atom {
        let mut atom = Atom::new(path, name, None, AtomKind::Function);
        atom.calls = calls
            .iter()
            .enumerate()
            .map(|(idx, call)| CallRef {
                name: call.to_string(),
                call_type: CallType::External,
                line: idx as i64 + 2,
            })
            .collect();
        atom
    }

    #[test]
    fn link_is_idempotent() {
        let mut foo = function("a.js", "foo", &[]);
        foo.is_exported = true;
        let bar = function("b.js", "bar", &["foo"]);
        let mut graph = AtomGraph::new(vec![bar, foo]);
        let facts = ProjectFacts::default();

        let first = link(&mut graph, &facts);
        assert_eq!(first.edges_added, 1);
        let snapshot = graph.atoms().to_vec();
        let second = link(&mut graph, &facts);
        assert_eq!(second.edges_added, 1);
        assert_eq!(graph.atoms(), snapshot.as_slice());
    }

    fn failing_pass(_: &mut AtomGraph, _: &LinkIndex, _: &ProjectFacts) -> Result<usize> {
        Err(anyhow::anyhow!("index out of date"))
    }

    fn panicking_pass(_: &mut AtomGraph, _: &LinkIndex, _: &ProjectFacts) -> Result<usize> {
        panic!("bad arena")
    }

    #[test]
    fn failed_passes_do_not_stop_later_ones() {
        let mut foo = function("a.js", "foo", &[]);
        foo.is_exported = true;
        let bar = function("b.js", "bar", &["foo"]);
        let mut graph = AtomGraph::new(vec![bar, foo]);
        let passes: &[(&str, PassFn)] = &[
            ("broken", failing_pass),
            ("panics", panicking_pass),
            ("direct_calls", direct::run),
        ];
        let report = link_with(&mut graph, &ProjectFacts::default(), passes);

        let stats: Vec<_> = report.passes.iter().map(|p| (p.name.as_str(), p.error.clone())).collect();
        assert_eq!(
            stats,
            vec![
                ("index", None),
                ("broken", Some("index out of date".to_string())),
                ("panics", Some("pass panicked".to_string())),
                ("direct_calls", None),
            ]
        );
        assert_eq!(report.passes[3].edges_added, 1);
        assert_eq!(report.edges_added, 1);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("broken"));
        assert!(report.warnings[1].contains("panics"));
        let foo = graph.atoms().iter().find(|a| a.name == "foo").unwrap();
        assert_eq!(foo.called_by, vec!["b.js::bar".to_string()]);
    }

    #[test]
    fn records_every_pass_and_refreshes_patterns() {
        let mut graph = AtomGraph::new(vec![function("a.js", "lonely", &[])]);
        let report = link(&mut graph, &ProjectFacts::default());
        let names: Vec<_> = report.passes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "index",
                "direct_calls",
                "namespace_calls",
                "variable_references",
                "instance_methods",
                "export_objects"
            ]
        );
        assert!(report.passes.iter().all(|p| p.error.is_none()));
        let pattern = graph.atoms()[0].caller_pattern.as_ref().unwrap();
        assert_eq!(pattern.id, CallerPatternId::TrulyDead);
    }

    #[test]
    fn relation_rows_carry_resolved_targets() {
        let mut foo = function("a.js", "foo", &[]);
        foo.is_exported = true;
        let bar = function("b.js", "bar", &["foo", "console.log"]);
        let mut graph = AtomGraph::new(vec![foo, bar]);
        link(&mut graph, &ProjectFacts::default());
        let rows = graph.relation_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].call_name, "foo");
        assert_eq!(rows[0].target_atom_id.as_deref(), Some("a.js::foo"));
        assert!(rows[1].target_atom_id.is_none());
    }
}
