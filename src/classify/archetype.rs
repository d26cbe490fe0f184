use crate::model::{Archetype, ArchetypeKind, Atom, AtomKind};
use regex::Regex;
use std::sync::LazyLock;

static TEST_CALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(describe|it|test|before\w*|after\w*)$").expect("valid test callback regex")
});
static HANDLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(handle|on[A-Z])").expect("valid handler regex"));
static FACTORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(create|make|build)").expect("valid factory regex"));
static INITIALIZER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(init|setup|setUp|bootstrap|configure)").expect("valid initializer regex")
});
static TRANSFORMER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(to[A-Z]|parse|format|transform|convert|normalize)")
        .expect("valid transformer regex")
});
static PERSISTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(save|persist|store|write|insert)").expect("valid persister regex")
});

fn archetype(kind: ArchetypeKind, severity: u8, confidence: f64) -> Archetype {
    Archetype {
        kind,
        severity,
        confidence,
    }
}

/// Ordered rule chain; the first matching rule decides.
pub fn classify_archetype(atom: &Atom) -> Archetype {
    let callers = atom.called_by.len();
    let external = atom.external_call_count();
    let internal = atom.internal_call_count();
    let flow = atom.signals.flow_type.as_deref();

    if atom.complexity > 50
        || atom.lines_of_code > 150
        || (atom.complexity > 20 && (external > 5 || callers > 10))
    {
        return archetype(ArchetypeKind::GodFunction, 10, 0.95);
    }
    if TEST_CALLBACK_RE.is_match(&atom.name) {
        return archetype(ArchetypeKind::TestCallback, 1, 0.9);
    }
    if atom.signals.has_network_calls && !atom.signals.has_error_handling {
        return archetype(ArchetypeKind::FragileNetwork, 8, 0.85);
    }
    if atom.is_exported && callers > 5 && atom.complexity < 15 {
        return archetype(ArchetypeKind::HotPath, 7, 0.8);
    }
    if !atom.is_exported
        && callers == 0
        && atom.class_name.is_none()
        && atom.kind == AtomKind::Function
    {
        return archetype(ArchetypeKind::DeadFunction, 5, 0.7);
    }
    let coupling = atom.distinct_callees() + callers;
    if coupling >= 6 && internal >= 4 && atom.is_exported {
        return archetype(ArchetypeKind::Orchestrator, 5, 0.75);
    }
    if atom.kind == AtomKind::Function {
        let name = atom.name.as_str();
        if HANDLER_RE.is_match(name) || flow == Some("handler") {
            return archetype(ArchetypeKind::Handler, 4, 0.7);
        }
        if FACTORY_RE.is_match(name) {
            return archetype(ArchetypeKind::Factory, 4, 0.7);
        }
        if INITIALIZER_RE.is_match(name) {
            return archetype(ArchetypeKind::Initializer, 4, 0.7);
        }
        if TRANSFORMER_RE.is_match(name) || flow == Some("transform") {
            return archetype(ArchetypeKind::Transformer, 4, 0.65);
        }
        if PERSISTER_RE.is_match(name) || flow == Some("persist") {
            return archetype(ArchetypeKind::Persister, 4, 0.65);
        }
    }
    if atom.class_name.is_some() && callers == 0 {
        return archetype(ArchetypeKind::ClassMethod, 2, 0.6);
    }
    if !atom.is_exported && callers > 0 && !atom.signals.has_side_effects && atom.complexity <= 5 {
        return archetype(ArchetypeKind::PrivateUtility, 3, 0.6);
    }
    if atom.kind == AtomKind::Variable {
        return archetype(ArchetypeKind::Constant, 1, 0.9);
    }
    if atom.complexity <= 3 && atom.lines_of_code <= 15 && !atom.signals.has_side_effects {
        return archetype(ArchetypeKind::Utility, 2, 0.6);
    }
    archetype(ArchetypeKind::Standard, 1, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> Atom {
        Atom::new("src/a.js", name, None, AtomKind::Function)
    }

    #[test]
    fn god_function_wins_over_everything_else() {
        let mut atom = function("describe");
        atom.complexity = 60;
        atom.is_exported = true;
        let result = classify_archetype(&atom);
        assert_eq!(result.kind, ArchetypeKind::GodFunction);
        assert_eq!(result.severity, 10);
    }

    #[test]
    fn test_callbacks_are_terminal() {
        let atom = function("beforeEach");
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::TestCallback);
    }

    #[test]
    fn network_without_error_handling_is_fragile() {
        let mut atom = function("load");
        atom.is_exported = true;
        atom.signals.has_network_calls = true;
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::FragileNetwork);
        atom.signals.has_error_handling = true;
        assert_ne!(classify_archetype(&atom).kind, ArchetypeKind::FragileNetwork);
    }

    #[test]
    fn unexported_uncalled_function_is_dead() {
        let atom = function("helper");
        let result = classify_archetype(&atom);
        assert_eq!(result.kind, ArchetypeKind::DeadFunction);
        assert_eq!(result.severity, 5);
    }

    #[test]
    fn exported_with_many_callers_is_hot_path() {
        let mut atom = function("get");
        atom.is_exported = true;
        for idx in 0..6 {
            atom.add_caller(&format!("b.js::c{idx}"));
        }
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::HotPath);
    }

    #[test]
    fn name_prefixes_pick_role_archetypes() {
        let mut atom = function("createStore");
        atom.is_exported = true;
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::Factory);
        atom.name = "onClick".into();
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::Handler);
        atom.name = "toJson".into();
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::Transformer);
    }

    #[test]
    fn variables_are_constants() {
        let mut atom = Atom::new("src/a.js", "LIMIT", None, AtomKind::Variable);
        atom.is_exported = true;
        assert_eq!(classify_archetype(&atom).kind, ArchetypeKind::Constant);
    }
}
