mod common;

use atomidx::model::PurposeKind;
use common::{atom, indexer, write_file, write_repo};

const A_JS: &str = "export function foo() {\n  return 1;\n}\n\nexport function helper() {\n  return foo();\n}\n";
const B_JS: &str = "import { foo } from './a.js';\n\nexport function bar() {\n  return foo();\n}\n";

#[test]
fn unchanged_files_are_reloaded_without_extracting() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    let first = indexer.reindex().unwrap();
    assert!(first.extractor_runs > 0);
    let before = indexer.db().all_atoms().unwrap();

    let second = indexer.reindex().unwrap();
    assert_eq!(second.extractor_runs, 0);
    assert_eq!(second.extracted, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.atoms, before.len());
    assert_eq!(indexer.db().all_atoms().unwrap(), before);
}

#[test]
fn atoms_missing_after_an_edit_are_soft_removed() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();
    let helper = atom(&indexer, "src/a.js::helper");
    let loc = helper.lines_of_code;

    write_file(repo.path(), "src/a.js", "export function foo() {\n  return 2;\n}\n");
    let stats = indexer.reindex().unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.removed_atoms, 1);

    let removed = atom(&indexer, "src/a.js::helper");
    assert_eq!(removed.purpose.unwrap().kind, PurposeKind::Removed);
    let lineage = removed.lineage.unwrap();
    assert_eq!(lineage.previous_loc, loc);
    assert!(removed.calls.is_empty());

    // foo survives and keeps its cross-file caller; the removed helper no
    // longer counts.
    let foo = atom(&indexer, "src/a.js::foo");
    assert_eq!(foo.called_by, vec!["src/b.js::bar".to_string()]);
    assert!(indexer.db().relations_from("src/a.js::helper").unwrap().is_empty());
}

#[test]
fn invalid_utf8_edits_still_replace_stale_atoms() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();
    assert!(atom(&indexer, "src/a.js::foo").called_by.contains(&"src/b.js::bar".to_string()));

    std::fs::write(repo.path().join("src/b.js"), b"export function baz() {}\n\xff\xfe\n").unwrap();
    let stats = indexer.reindex().unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.removed_atoms, 1);

    let bar = atom(&indexer, "src/b.js::bar");
    assert_eq!(bar.purpose.unwrap().kind, PurposeKind::Removed);
    assert!(!atom(&indexer, "src/a.js::foo").called_by.contains(&"src/b.js::bar".to_string()));
    assert!(!atom(&indexer, "src/b.js::baz").is_removed());

    let third = indexer.reindex().unwrap();
    assert_eq!(third.skipped, 2);
    assert_eq!(third.extracted, 0);
    assert_eq!(third.failed, 0);
}

#[test]
fn deleted_files_soft_remove_their_atoms() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();

    std::fs::remove_file(repo.path().join("src/b.js")).unwrap();
    let stats = indexer.reindex().unwrap();
    assert_eq!(stats.deleted_files, 1);
    assert_eq!(stats.removed_atoms, 1);

    let bar = atom(&indexer, "src/b.js::bar");
    assert_eq!(bar.purpose.unwrap().kind, PurposeKind::Removed);
    assert!(!indexer.db().get_all_file_hashes().unwrap().contains_key("src/b.js"));
    assert!(atom(&indexer, "src/a.js::foo").called_by.iter().all(|c| c != "src/b.js::bar"));
}

#[test]
fn sync_handles_edits_and_deletions() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();

    write_file(
        repo.path(),
        "src/c.js",
        "import { foo } from './a.js';\n\nexport function baz() {\n  return foo();\n}\n",
    );
    std::fs::remove_file(repo.path().join("src/b.js")).unwrap();
    let stats = indexer
        .sync(&[repo.path().join("src/c.js"), repo.path().join("src/b.js")])
        .unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.deleted_files, 1);

    let foo = atom(&indexer, "src/a.js::foo");
    let mut callers = foo.called_by.clone();
    callers.sort();
    assert_eq!(
        callers,
        vec!["src/a.js::helper".to_string(), "src/c.js::baz".to_string()]
    );
}

#[test]
fn changed_files_compares_against_stored_hashes() {
    let repo = write_repo(&[("src/a.js", A_JS), ("src/b.js", B_JS)]);
    let mut indexer = indexer(repo.path());
    indexer.reindex().unwrap();

    write_file(repo.path(), "src/a.js", "export function foo() {}\n");
    write_file(repo.path(), "src/new.ts", "export const x = 1;\n");
    let changed = indexer.changed_files().unwrap();
    assert_eq!(changed.added, vec!["src/new.ts".to_string()]);
    assert_eq!(changed.modified, vec!["src/a.js".to_string()]);
    assert!(changed.deleted.is_empty());
}
