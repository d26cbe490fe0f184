use super::{is_archived_path, is_barrel_file, is_cli_commands_path, is_script_path, is_test_path};
use crate::model::{ArchetypeKind, Atom, AtomKind, CallerPattern, CallerPatternId, PurposeKind};

/// Project-level facts the explanation needs beyond the atom itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerContext {
    /// Some other file loads this atom's file with `import()`.
    pub dynamic_import_target: bool,
}

fn pattern(id: CallerPatternId, reason: &str, has_callers: bool, confidence: f64) -> CallerPattern {
    CallerPattern {
        id,
        reason: reason.to_string(),
        has_callers,
        confidence,
    }
}

/// Explains why an atom has (or lacks) detected callers.
pub fn explain_callers(atom: &Atom, context: CallerContext) -> CallerPattern {
    use CallerPatternId::*;

    if !atom.called_by.is_empty() {
        return pattern(DirectCall, "has resolved callers", true, 1.0);
    }
    let path = atom.file_path.as_str();
    if is_archived_path(path) {
        return pattern(Archived, "lives in an archived path", false, 0.9);
    }
    if atom.class_name.is_some() {
        return pattern(ClassInstance, "invoked through a class instance", false, 0.7);
    }
    if is_test_path(path) {
        return pattern(TestFramework, "invoked by the test runner", false, 0.85);
    }
    if is_script_path(path) {
        return if atom.kind == AtomKind::Variable {
            pattern(ScriptConstant, "constant of a standalone script", false, 0.7)
        } else {
            pattern(EntryPoint, "script entry point", false, 0.7)
        };
    }
    if is_cli_commands_path(path) {
        return pattern(CliCommand, "dispatched by the CLI", false, 0.75);
    }
    if atom.signals.has_event_signals || atom.signals.has_lifecycle_hooks {
        return pattern(EventCallback, "registered as an event or lifecycle callback", false, 0.75);
    }
    let archetype_dead = atom
        .archetype
        .as_ref()
        .is_some_and(|a| a.kind == ArchetypeKind::DeadFunction);
    let purpose_dead = atom
        .purpose
        .as_ref()
        .is_some_and(|p| p.kind == PurposeKind::DeadCode);
    if (archetype_dead || purpose_dead) && !atom.is_exported && !context.dynamic_import_target {
        return pattern(TrulyDead, "not exported and never referenced", false, 0.8);
    }
    if atom.kind == AtomKind::Variable && !atom.is_exported {
        return pattern(InternalConstant, "module-private constant", false, 0.6);
    }
    if atom.is_exported {
        return if is_barrel_file(path) {
            pattern(ReExport, "exported through a barrel file", false, 0.6)
        } else if context.dynamic_import_target {
            pattern(DynamicImport, "module is loaded with import()", false, 0.65)
        } else {
            pattern(EntryPoint, "exported with no in-repo caller", false, 0.5)
        };
    }
    if context.dynamic_import_target {
        return pattern(DynamicImport, "module is loaded with import()", false, 0.6);
    }
    pattern(Unknown, "no explanation found", false, 0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::refresh;

    fn function(path: &str, name: &str) -> Atom {
        let mut atom = Atom::new(path, name, None, AtomKind::Function);
        refresh(&mut atom);
        atom
    }

    #[test]
    fn callers_short_circuit() {
        let mut atom = function("src/a.js", "f");
        atom.add_caller("src/b.js::g");
        let result = explain_callers(&atom, CallerContext::default());
        assert_eq!(result.id, CallerPatternId::DirectCall);
        assert!(result.has_callers);
    }

    #[test]
    fn private_dead_function_is_truly_dead() {
        let atom = function("src/a.js", "unused");
        let result = explain_callers(&atom, CallerContext::default());
        assert_eq!(result.id, CallerPatternId::TrulyDead);
    }

    #[test]
    fn exported_atoms_in_barrels_are_re_exports() {
        let mut atom = Atom::new("src/ui/index.js", "Button", None, AtomKind::Function);
        atom.is_exported = true;
        refresh(&mut atom);
        assert_eq!(
            explain_callers(&atom, CallerContext::default()).id,
            CallerPatternId::ReExport
        );
    }

    #[test]
    fn dynamic_import_targets_are_explained() {
        let mut atom = Atom::new("src/lazy.js", "mount", None, AtomKind::Function);
        atom.is_exported = true;
        refresh(&mut atom);
        let context = CallerContext {
            dynamic_import_target: true,
        };
        assert_eq!(
            explain_callers(&atom, context).id,
            CallerPatternId::DynamicImport
        );
    }

    #[test]
    fn script_variables_are_script_constants() {
        let atom = Atom::new("scripts/build.js", "OUT_DIR", None, AtomKind::Variable);
        assert_eq!(
            explain_callers(&atom, CallerContext::default()).id,
            CallerPatternId::ScriptConstant
        );
    }
}
