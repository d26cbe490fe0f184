use super::{is_config_path, is_script_path, is_test_path};
use crate::model::{ArchetypeKind, Atom, Purpose, PurposeKind};

fn purpose(kind: PurposeKind, reason: &str, confidence: f64) -> Purpose {
    Purpose {
        kind,
        reason: reason.to_string(),
        confidence,
        is_dead_code: kind == PurposeKind::DeadCode,
    }
}

/// Usage-intent decision tree, independent of the archetype chain except for
/// the archetype hints near the end.
pub fn classify_purpose(atom: &Atom) -> Purpose {
    let signals = &atom.signals;
    if atom.is_exported {
        return purpose(PurposeKind::ApiExport, "exported from its module", 0.9);
    }
    if is_test_path(&atom.file_path) {
        return purpose(PurposeKind::TestHelper, "defined in a test file", 0.85);
    }
    if is_script_path(&atom.file_path) {
        return purpose(PurposeKind::ScriptMain, "defined in a scripts path", 0.8);
    }
    if is_config_path(&atom.file_path) {
        return purpose(PurposeKind::ConfigSetup, "defined in a config path", 0.8);
    }
    if atom.class_name.is_some() {
        return purpose(PurposeKind::ClassMethod, "member of a class", 0.75);
    }
    if signals.has_lifecycle_hooks || signals.has_event_signals {
        return purpose(PurposeKind::EventHandler, "bound to events or lifecycle hooks", 0.75);
    }
    if signals.has_timers || (atom.is_async && signals.has_side_effects) {
        return purpose(PurposeKind::TimerAsync, "timer or async work with side effects", 0.7);
    }
    if signals.has_network_calls {
        return purpose(PurposeKind::NetworkHandler, "performs network calls", 0.7);
    }
    if signals.has_dom_mutation {
        return purpose(PurposeKind::EventHandler, "mutates the DOM", 0.6);
    }
    match atom.archetype.as_ref().map(|a| a.kind) {
        Some(ArchetypeKind::TestCallback) => {
            return purpose(PurposeKind::TestHelper, "test framework callback", 0.7);
        }
        Some(ArchetypeKind::Handler) => {
            return purpose(PurposeKind::EventHandler, "handler naming", 0.6);
        }
        Some(ArchetypeKind::Initializer) => {
            return purpose(PurposeKind::ConfigSetup, "initializer naming", 0.6);
        }
        _ => {}
    }
    if !atom.called_by.is_empty() {
        return purpose(PurposeKind::InternalHelper, "called from other atoms", 0.8);
    }
    purpose(PurposeKind::DeadCode, "no callers and no entry signal", 0.6)
}

/// Purpose assigned to a soft-removed atom.
pub fn removed() -> Purpose {
    purpose(PurposeKind::Removed, "no longer present in its file", 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AtomKind;

    fn function(path: &str, name: &str) -> Atom {
        Atom::new(path, name, None, AtomKind::Function)
    }

    #[test]
    fn exported_atoms_are_api() {
        let mut atom = function("src/a.js", "run");
        atom.is_exported = true;
        assert_eq!(classify_purpose(&atom).kind, PurposeKind::ApiExport);
    }

    #[test]
    fn uncalled_private_function_is_dead_code() {
        let atom = function("src/a.js", "helper");
        let result = classify_purpose(&atom);
        assert_eq!(result.kind, PurposeKind::DeadCode);
        assert!(result.is_dead_code);
    }

    #[test]
    fn callers_make_internal_helper() {
        let mut atom = function("src/a.js", "helper");
        atom.add_caller("src/b.js::main");
        let result = classify_purpose(&atom);
        assert_eq!(result.kind, PurposeKind::InternalHelper);
        assert!(!result.is_dead_code);
    }

    #[test]
    fn path_rules_precede_signal_rules() {
        let mut atom = function("tests/helpers.js", "load");
        atom.signals.has_network_calls = true;
        assert_eq!(classify_purpose(&atom).kind, PurposeKind::TestHelper);
        let mut atom = function("src/api.js", "load");
        atom.signals.has_network_calls = true;
        assert_eq!(classify_purpose(&atom).kind, PurposeKind::NetworkHandler);
    }
}
