mod common;

use atomidx::classify::{classify_archetype, refresh};
use atomidx::indexer::javascript::ParserSet;
use atomidx::model::{ArchetypeKind, Atom, AtomKind, CallerPatternId, FunctionType, PurposeKind};
use common::{atom, indexer, write_repo};

#[test]
fn large_exported_functions_are_god_functions() {
    let mut value = Atom::new("src/big.js", "everything", None, AtomKind::Function);
    value.complexity = 60;
    value.is_exported = true;
    let archetype = classify_archetype(&value);
    assert_eq!(archetype.kind, ArchetypeKind::GodFunction);
    assert_eq!(archetype.severity, 10);

    refresh(&mut value);
    assert_eq!(value.archetype_weight, 1.0);
    assert_eq!(value.purpose.unwrap().kind, PurposeKind::ApiExport);
}

#[test]
fn parses_typescript_classes_and_arrow_exports() {
    let source = r#"
import { format } from "./format";

export class Cart {
  total(items: number[]): number {
    return items.reduce((sum, item) => sum + item, 0);
  }
}

export const render = async (cart: Cart) => {
  return format(cart.total([1, 2]));
};
"#;
    let mut parsers = ParserSet::new().unwrap();
    let parsed = parsers.parse("typescript", "src/cart.ts", source).unwrap();

    let names: Vec<_> = parsed.functions.iter().map(|f| f.qualified_name()).collect();
    assert_eq!(names, vec!["Cart.total", "render"]);
    let render = &parsed.functions[1];
    assert!(render.is_exported);
    assert!(render.is_async);
    assert_eq!(render.function_type, FunctionType::Arrow);
    let calls: Vec<_> = render.calls.iter().map(|c| c.name.as_str()).collect();
    assert!(calls.contains(&"format"));
    assert!(calls.contains(&"cart.total"));
    assert_eq!(parsed.imports[0].source, "./format");
}

#[test]
fn indexed_atoms_carry_classification_and_vectors() {
    let repo = write_repo(&[
        (
            "src/net.js",
            "export async function loadUser(id) {\n  const res = await fetch('/users/' + id);\n  return res.json();\n}\n",
        ),
        (
            "src/util.js",
            "function unused(a) {\n  return a + 1;\n}\n\nexport function used() {\n  return 1;\n}\n",
        ),
        (
            "tests/util.test.js",
            "import { used } from '../src/util.js';\n\nexport function checksUsed() {\n  return used();\n}\n",
        ),
    ]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();

    let load = atom(&indexer, "src/net.js::loadUser");
    assert_eq!(load.archetype.as_ref().unwrap().kind, ArchetypeKind::FragileNetwork);
    assert_eq!(load.archetype.as_ref().unwrap().severity, 8);
    assert!(load.signals.has_network_calls);
    assert!(load.source.is_none());
    assert!((0.0..=1.0).contains(&load.cohesion_score));
    assert!((0.0..=1.0).contains(&load.derived.fragility_score));
    assert_eq!(load.archetype_weight, 0.8);

    let unused = atom(&indexer, "src/util.js::unused");
    assert_eq!(unused.archetype.as_ref().unwrap().kind, ArchetypeKind::DeadFunction);
    assert_eq!(unused.purpose.as_ref().unwrap().kind, PurposeKind::DeadCode);
    assert_eq!(
        unused.caller_pattern.as_ref().unwrap().id,
        CallerPatternId::TrulyDead
    );

    let used = atom(&indexer, "src/util.js::used");
    assert_eq!(used.called_by, vec!["tests/util.test.js::checksUsed".to_string()]);
}
