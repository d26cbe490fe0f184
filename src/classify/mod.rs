//! Archetype, purpose and caller-pattern classification.
//!
//! Each classifier is a pure function of the atom as it stands; callers
//! re-run them whenever `calledBy` or the shape of an atom changes.

pub mod archetype;
pub mod caller_pattern;
pub mod purpose;

use crate::model::Atom;

pub use archetype::classify_archetype;
pub use caller_pattern::{CallerContext, explain_callers};
pub use purpose::classify_purpose;

/// Recomputes archetype and purpose. Soft-removed atoms keep REMOVED.
pub fn refresh(atom: &mut Atom) {
    if atom.is_removed() {
        return;
    }
    let archetype = classify_archetype(atom);
    atom.archetype = Some(archetype);
    atom.purpose = Some(classify_purpose(atom));
    atom.archetype_weight = crate::util::round2(
        atom.archetype
            .as_ref()
            .map(|a| f64::from(a.severity) / 10.0)
            .unwrap_or(0.0),
    );
}

fn segments(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/').map(|segment| segment.to_ascii_lowercase())
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase()
}

pub fn is_test_path(path: &str) -> bool {
    let name = file_name(path);
    segments(path).any(|s| matches!(s.as_str(), "test" | "tests" | "__tests__" | "spec" | "__mocks__"))
        || name.contains(".test.")
        || name.contains(".spec.")
}

pub fn is_script_path(path: &str) -> bool {
    let name = file_name(path);
    segments(path).any(|s| matches!(s.as_str(), "scripts" | "script" | "bin" | "install" | "tools"))
        || name.starts_with("install")
}

pub fn is_config_path(path: &str) -> bool {
    let name = file_name(path);
    segments(path).any(|s| matches!(s.as_str(), "config" | "configs" | "settings"))
        || name.contains(".config.")
        || name.starts_with("config.")
}

pub fn is_archived_path(path: &str) -> bool {
    segments(path).any(|s| {
        matches!(s.as_str(), "archive" | "archived" | "deprecated" | "legacy" | "old")
    })
}

pub fn is_cli_commands_path(path: &str) -> bool {
    segments(path).any(|s| matches!(s.as_str(), "commands" | "cli" | "cmd"))
}

/// `index.js` style barrel files that mostly re-export.
pub fn is_barrel_file(path: &str) -> bool {
    let name = file_name(path);
    matches!(
        name.as_str(),
        "index.js" | "index.mjs" | "index.cjs" | "index.ts" | "index.tsx" | "index.jsx"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_predicates() {
        assert!(is_test_path("src/__tests__/a.js"));
        assert!(is_test_path("src/store.spec.ts"));
        assert!(!is_test_path("src/testing-utils.js"));
        assert!(is_script_path("scripts/build.js"));
        assert!(is_config_path("webpack.config.js"));
        assert!(is_archived_path("src/legacy/a.js"));
        assert!(is_cli_commands_path("src/commands/run.js"));
        assert!(is_barrel_file("src/ui/index.ts"));
    }
}
