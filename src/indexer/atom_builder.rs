use crate::classify;
use crate::indexer::extract::{ParsedFile, ParsedFunction, ParsedVariable};
use crate::indexer::registry::{ExtractorRegistry, FileContext};
use crate::metrics;
use crate::model::{Atom, AtomKind, CallRef, CallType, FunctionType, Signals};
use crate::util::{slice_bytes, slice_lines};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct BuiltAtoms {
    pub atoms: Vec<Atom>,
    pub extractor_runs: usize,
    pub warnings: Vec<String>,
}

/// Builds every atom of one parsed file.
///
/// Calls are all tagged external here; the intra-file call graph decides
/// which of them are internal.
pub fn build_atoms(
    rel_path: &str,
    source: &str,
    parsed: &ParsedFile,
    registry: &ExtractorRegistry,
    file: &FileContext,
    now: i64,
) -> BuiltAtoms {
    let mut out = BuiltAtoms::default();
    let mut seen = HashSet::new();
    for function in &parsed.functions {
        let atom_id = crate::indexer::stable_id::atom_id(rel_path, &function.qualified_name());
        if !seen.insert(atom_id) {
            tracing::debug!(
                "{rel_path}: duplicate atom {} skipped",
                function.qualified_name()
            );
            continue;
        }
        let atom = build_function_atom(rel_path, source, function, registry, file, now, &mut out);
        out.atoms.push(atom);
    }
    for variable in parsed.variables.iter().filter(|v| v.is_exported) {
        let atom_id = crate::indexer::stable_id::atom_id(rel_path, &variable.name);
        if !seen.insert(atom_id) {
            continue;
        }
        out.atoms.push(build_variable_atom(rel_path, source, variable, now));
    }
    out
}

fn build_function_atom(
    rel_path: &str,
    source: &str,
    function: &ParsedFunction,
    registry: &ExtractorRegistry,
    file: &FileContext,
    now: i64,
    out: &mut BuiltAtoms,
) -> Atom {
    let code = slice_bytes(source, function.start_byte, function.end_byte)
        .map(str::to_string)
        .unwrap_or_else(|| slice_lines(source, function.line, function.end_line));
    let mut atom = Atom::new(
        rel_path,
        &function.name,
        function.owner.as_deref(),
        AtomKind::Function,
    );
    atom.line = function.line;
    atom.end_line = function.end_line;
    atom.complexity = metrics::complexity_for(&code);
    atom.lines_of_code = metrics::lines_of_code(function.line, function.end_line);
    atom.is_exported = function.is_exported;
    atom.is_async = function.is_async;
    atom.function_type = function.function_type;
    atom.params = function.params.clone();
    atom.calls = function
        .calls
        .iter()
        .map(|call| CallRef {
            name: call.name.clone(),
            call_type: CallType::External,
            line: call.line,
        })
        .collect();

    let extraction = registry.run_atom_level(&code, &function.name, rel_path, file);
    out.extractor_runs += extraction.runs;
    out.warnings.extend(extraction.warnings);
    atom.signals = signals_from_metadata(&extraction.metadata);
    atom.metadata = extraction.metadata;
    atom.source = Some(code);
    atom.created_at = now;
    atom.extracted_at = now;
    atom.updated_at = now;
    classify::refresh(&mut atom);
    atom
}

/// Exported non-function binding: fixed shape, no extractor metadata.
fn build_variable_atom(rel_path: &str, source: &str, variable: &ParsedVariable, now: i64) -> Atom {
    let mut atom = Atom::new(rel_path, &variable.name, None, AtomKind::Variable);
    atom.line = variable.line;
    atom.end_line = variable.end_line;
    atom.complexity = 1;
    atom.lines_of_code = metrics::lines_of_code(variable.line, variable.end_line);
    atom.is_exported = variable.is_exported;
    atom.function_type = FunctionType::Variable;
    atom.source = Some(slice_lines(source, variable.line, variable.end_line));
    atom.created_at = now;
    atom.extracted_at = now;
    atom.updated_at = now;
    classify::refresh(&mut atom);
    atom
}

fn flag(metadata: &Map<String, Value>, extractor: &str, field: &str) -> bool {
    metadata
        .get(extractor)
        .and_then(|value| value.get(field))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn text(metadata: &Map<String, Value>, extractor: &str, field: &str) -> Option<String> {
    metadata
        .get(extractor)
        .and_then(|value| value.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Typed summary of the extractor outputs that classification reads.
///
/// `has_dynamic_import` is a project-level fact and is set by the linker.
pub fn signals_from_metadata(metadata: &Map<String, Value>) -> Signals {
    let domain = text(metadata, "semantic_domain", "domain").filter(|d| d != "general");
    Signals {
        has_side_effects: flag(metadata, "side_effects", "hasSideEffects"),
        has_network_calls: flag(metadata, "side_effects", "network"),
        has_error_handling: flag(metadata, "error_handling", "hasErrorHandling"),
        has_nested_loops: flag(metadata, "performance_hints", "hasNestedLoops"),
        has_timers: flag(metadata, "async_patterns", "hasTimers"),
        has_event_signals: flag(metadata, "async_patterns", "isEventHandler"),
        has_lifecycle_hooks: flag(metadata, "async_patterns", "isLifecycleHook"),
        has_dom_mutation: flag(metadata, "side_effects", "dom"),
        has_dynamic_import: false,
        flow_type: text(metadata, "data_flow", "flowType"),
        dna_hash: text(metadata, "dna", "hash"),
        domain,
    }
}

/// Drops the heavy extractor fields and the source text before persistence.
pub fn prune_to_lite(atom: &mut Atom) {
    atom.source = None;
    if let Some(Value::Object(dna)) = atom.metadata.get_mut("dna") {
        dna.remove("sequence");
    }
    if let Some(Value::Object(flow)) = atom.metadata.get_mut("data_flow") {
        flow.remove("identifiers");
        flow.remove("readsParams");
    }
    if let Some(Value::Object(domain)) = atom.metadata.get_mut("semantic_domain") {
        domain.remove("keywords");
    }
}
