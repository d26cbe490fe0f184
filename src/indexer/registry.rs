use crate::error::IndexError;
use crate::indexer::detectors;
use anyhow::Result;
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorLevel {
    /// Once per file; the result is shared by every atom of the file.
    File,
    /// Once per function, in registration order.
    Atom,
}

/// Arguments handed to one extractor.
///
/// `deps` holds only the outputs the extractor declared in `consumes`.
pub struct ExtractorInput<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub file_path: &'a str,
    pub deps: &'a Map<String, Value>,
}

impl ExtractorInput<'_> {
    pub fn dep(&self, name: &str) -> Option<&Value> {
        self.deps.get(name).filter(|value| !value.is_null())
    }
}

pub type ExtractFn = fn(&ExtractorInput<'_>) -> Result<Value>;

pub struct ExtractorSpec {
    pub name: &'static str,
    pub level: ExtractorLevel,
    pub consumes: &'static [&'static str],
    pub run: ExtractFn,
}

/// Outputs of the file-level extractors for one file.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    pub outputs: Map<String, Value>,
}

/// Result of running the atom-level extractors for one function.
#[derive(Debug, Default)]
pub struct AtomExtraction {
    pub metadata: Map<String, Value>,
    pub runs: usize,
    pub warnings: Vec<String>,
}

pub struct ExtractorRegistry {
    entries: Vec<ExtractorSpec>,
}

impl ExtractorRegistry {
    pub fn new(entries: Vec<ExtractorSpec>) -> Self {
        Self { entries }
    }

    /// The ordered table used for indexing.
    pub fn standard() -> Self {
        use ExtractorLevel::{Atom, File};
        Self::new(vec![
            spec("event_bindings", File, &[], detectors::event_bindings),
            spec("dynamic_imports", File, &[], detectors::dynamic_imports),
            spec("side_effects", Atom, &[], detectors::side_effects),
            spec("async_patterns", Atom, &["event_bindings"], detectors::async_patterns),
            spec("error_handling", Atom, &[], detectors::error_handling),
            spec("type_contracts", Atom, &[], detectors::type_contracts),
            spec(
                "error_flow",
                Atom,
                &["type_contracts", "error_handling"],
                detectors::error_flow,
            ),
            spec("performance_hints", Atom, &[], detectors::performance_hints),
            spec(
                "performance_metrics",
                Atom,
                &["performance_hints"],
                detectors::performance_metrics,
            ),
            spec("dna", Atom, &["side_effects"], detectors::dna),
            spec("data_flow", Atom, &[], detectors::data_flow),
            spec("semantic_domain", Atom, &[], detectors::semantic_domain),
        ])
    }

    pub fn entries(&self) -> &[ExtractorSpec] {
        &self.entries
    }

    pub fn names(&self, level: ExtractorLevel) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.name)
            .collect()
    }

    pub fn run_file_level(&self, source: &str, file_path: &str) -> (FileContext, Vec<String>) {
        let mut context = FileContext::default();
        let mut warnings = Vec::new();
        for entry in self.entries.iter().filter(|e| e.level == ExtractorLevel::File) {
            let deps = select_deps(entry.consumes, &context.outputs, &Map::new());
            let input = ExtractorInput {
                code: source,
                name: "",
                file_path,
                deps: &deps,
            };
            let value = run_guarded(entry, &input, file_path, &mut warnings);
            context.outputs.insert(entry.name.to_string(), value);
        }
        (context, warnings)
    }

    pub fn run_atom_level(
        &self,
        code: &str,
        name: &str,
        file_path: &str,
        file: &FileContext,
    ) -> AtomExtraction {
        let mut out = AtomExtraction::default();
        for entry in self.entries.iter().filter(|e| e.level == ExtractorLevel::Atom) {
            let deps = select_deps(entry.consumes, &out.metadata, &file.outputs);
            let input = ExtractorInput {
                code,
                name,
                file_path,
                deps: &deps,
            };
            let label = format!("{file_path}::{name}");
            let value = run_guarded(entry, &input, &label, &mut out.warnings);
            out.metadata.insert(entry.name.to_string(), value);
            out.runs += 1;
        }
        out
    }
}

fn spec(
    name: &'static str,
    level: ExtractorLevel,
    consumes: &'static [&'static str],
    run: ExtractFn,
) -> ExtractorSpec {
    ExtractorSpec {
        name,
        level,
        consumes,
        run,
    }
}

fn select_deps(
    consumes: &[&str],
    atom_outputs: &Map<String, Value>,
    file_outputs: &Map<String, Value>,
) -> Map<String, Value> {
    let mut deps = Map::new();
    for name in consumes {
        let value = atom_outputs
            .get(*name)
            .or_else(|| file_outputs.get(*name))
            .cloned()
            .unwrap_or(Value::Null);
        deps.insert((*name).to_string(), value);
    }
    deps
}

fn run_guarded(
    entry: &ExtractorSpec,
    input: &ExtractorInput<'_>,
    label: &str,
    warnings: &mut Vec<String>,
) -> Value {
    let outcome = catch_unwind(AssertUnwindSafe(|| (entry.run)(input)));
    let message = match outcome {
        Ok(Ok(value)) => return value,
        Ok(Err(err)) => err.to_string(),
        Err(_) => "extractor panicked".to_string(),
    };
    let err = IndexError::ExtractorFailure {
        extractor: entry.name.to_string(),
        message,
    };
    tracing::warn!("{label}: {err}");
    warnings.push(format!("{label}: {err}"));
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failing(_: &ExtractorInput<'_>) -> Result<Value> {
        Err(anyhow!("boom"))
    }

    fn echo_dep(input: &ExtractorInput<'_>) -> Result<Value> {
        Ok(input.dep("failing").cloned().unwrap_or(Value::Bool(false)))
    }

    #[test]
    fn standard_registry_keeps_declared_order() {
        let registry = ExtractorRegistry::standard();
        assert_eq!(
            registry.names(ExtractorLevel::File),
            vec!["event_bindings", "dynamic_imports"]
        );
        let atom = registry.names(ExtractorLevel::Atom);
        assert_eq!(atom.first(), Some(&"side_effects"));
        assert_eq!(atom.last(), Some(&"semantic_domain"));
        assert_eq!(atom.len(), 10);
        for (idx, entry) in registry.entries().iter().enumerate() {
            for dep in entry.consumes {
                let pos = registry
                    .entries()
                    .iter()
                    .position(|other| other.name == *dep)
                    .unwrap();
                assert!(pos < idx, "{} consumes later {}", entry.name, dep);
            }
        }
    }

    #[test]
    fn failing_extractor_yields_null_and_later_steps_still_run() {
        let registry = ExtractorRegistry::new(vec![
            spec("failing", ExtractorLevel::Atom, &[], failing),
            spec("echo", ExtractorLevel::Atom, &["failing"], echo_dep),
        ]);
        let out = registry.run_atom_level("function f() {}", "f", "a.js", &FileContext::default());
        assert_eq!(out.metadata["failing"], Value::Null);
        assert_eq!(out.metadata["echo"], Value::Bool(false));
        assert_eq!(out.runs, 2);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn async_patterns_sees_file_level_event_bindings() {
        let registry = ExtractorRegistry::standard();
        let source = "function onClick() {}\nbtn.addEventListener('click', onClick);";
        let (file, warnings) = registry.run_file_level(source, "a.js");
        assert!(warnings.is_empty());
        let out = registry.run_atom_level("function onClick() {}", "onClick", "a.js", &file);
        assert_eq!(out.metadata["async_patterns"]["isEventHandler"], true);
    }
}
