use crate::classify::purpose;
use crate::model::{Atom, Lineage};
use std::collections::{HashMap, HashSet};

/// Outcome of comparing a file's stored atoms with a fresh extraction.
#[derive(Debug, Default)]
pub struct LineageDiff {
    /// Atoms present before and now gone, already soft-removed.
    pub removed: Vec<Atom>,
    /// Fresh atoms that existed before under the same id.
    pub carried: usize,
    /// Fresh atoms seen for the first time.
    pub added: usize,
}

/// Compare stored atoms (database) against freshly built atoms of one file.
///
/// Matching is by id, which carries no line information:
/// - **carried:** `createdAt` moves over from the stored atom
/// - **added:** the fresh atom keeps its own timestamps
/// - **removed:** stored live atoms missing from the fresh set are
///   soft-removed with a lineage snapshot
///
/// Atoms that were already soft-removed stay untouched unless they reappear.
pub fn apply_lineage(previous: &[Atom], fresh: &mut [Atom], now: i64) -> LineageDiff {
    let old_map: HashMap<&str, &Atom> = previous.iter().map(|a| (a.id.as_str(), a)).collect();
    let fresh_ids: HashSet<String> = fresh.iter().map(|a| a.id.clone()).collect();
    let mut diff = LineageDiff::default();

    for atom in fresh.iter_mut() {
        match old_map.get(atom.id.as_str()) {
            Some(old) => {
                if old.created_at > 0 && old.created_at < atom.created_at {
                    atom.created_at = old.created_at;
                }
                diff.carried += 1;
            }
            None => diff.added += 1,
        }
    }

    for old in previous {
        if old.is_removed() || fresh_ids.contains(&old.id) {
            continue;
        }
        let mut removed = old.clone();
        soft_remove(&mut removed, now);
        diff.removed.push(removed);
    }
    diff
}

/// Marks an atom REMOVED and snapshots what it looked like.
pub fn soft_remove(atom: &mut Atom, now: i64) {
    if atom.is_removed() {
        return;
    }
    atom.lineage = Some(Lineage {
        removed_at: now,
        previous_loc: atom.lines_of_code,
        previous_complexity: atom.complexity,
        previous_caller_count: atom.called_by.len(),
        dna_hash: atom.signals.dna_hash.clone(),
    });
    atom.purpose = Some(purpose::removed());
    atom.calls.clear();
    atom.called_by.clear();
    atom.caller_pattern = None;
    atom.source = None;
    atom.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomKind, PurposeKind};

    fn atom(name: &str, created_at: i64) -> Atom {
        let mut atom = Atom::new("src/a.js", name, None, AtomKind::Function);
        atom.created_at = created_at;
        atom.extracted_at = created_at;
        atom
    }

    #[test]
    fn carries_creation_time_for_surviving_atoms() {
        let previous = vec![atom("keep", 10)];
        let mut fresh = vec![atom("keep", 50), atom("new", 50)];
        let diff = apply_lineage(&previous, &mut fresh, 50);
        assert_eq!(fresh[0].created_at, 10);
        assert_eq!(fresh[1].created_at, 50);
        assert_eq!(diff.carried, 1);
        assert_eq!(diff.added, 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn vanished_atoms_are_soft_removed_with_lineage() {
        let mut gone = atom("gone", 10);
        gone.complexity = 7;
        gone.lines_of_code = 20;
        gone.add_caller("src/b.js::main");
        gone.signals.dna_hash = Some("dna_0123456789abcdef".into());
        let diff = apply_lineage(&[gone], &mut [], 99);

        assert_eq!(diff.removed.len(), 1);
        let removed = &diff.removed[0];
        assert!(removed.is_removed());
        assert_eq!(removed.purpose.as_ref().unwrap().kind, PurposeKind::Removed);
        let lineage = removed.lineage.as_ref().unwrap();
        assert_eq!(lineage.removed_at, 99);
        assert_eq!(lineage.previous_complexity, 7);
        assert_eq!(lineage.previous_loc, 20);
        assert_eq!(lineage.previous_caller_count, 1);
        assert_eq!(lineage.dna_hash.as_deref(), Some("dna_0123456789abcdef"));
        assert!(removed.called_by.is_empty());
    }

    #[test]
    fn already_removed_atoms_are_not_removed_twice() {
        let mut old = atom("gone", 10);
        soft_remove(&mut old, 20);
        let diff = apply_lineage(&[old], &mut [], 30);
        assert!(diff.removed.is_empty());
    }
}
