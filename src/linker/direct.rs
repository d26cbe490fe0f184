//! Direct calls: same-file internals, `Owner.method` and bare names.

use super::facts::FileFacts;
use super::{AtomGraph, LinkIndex, ProjectFacts};
use crate::indexer::stable_id::atom_id;
use crate::model::{Atom, AtomKind, CallType};
use crate::vectors;
use anyhow::Result;

pub fn run(graph: &mut AtomGraph, index: &LinkIndex, facts: &ProjectFacts) -> Result<usize> {
    let mut edges = 0;
    for caller in graph.live_callers() {
        let file_facts = facts.file(&caller.file_path);
        for (call_idx, (name, call_type)) in caller.calls.iter().enumerate() {
            let target = if *call_type == CallType::Internal {
                same_file(
                    graph.atoms(),
                    index,
                    &caller.file_path,
                    caller.class_name.as_deref(),
                    name,
                )
            } else {
                None
            };
            let target = match target {
                Some(target) => Some(target),
                None => resolve(
                    graph.atoms(),
                    index,
                    &caller.file_path,
                    file_facts,
                    caller.class_name.as_deref(),
                    name,
                ),
            };
            let Some(target) = target else {
                continue;
            };
            if target == caller.idx {
                continue;
            }
            graph.record_resolution(caller.idx, call_idx, target)?;
            if graph.add_edge(target, &caller.id)? {
                edges += 1;
                let atom = graph.atom_mut(target)?;
                atom.derived.change_risk = vectors::change_risk(atom);
            }
        }
    }
    Ok(edges)
}

fn same_file(
    atoms: &[Atom],
    index: &LinkIndex,
    file: &str,
    owner: Option<&str>,
    name: &str,
) -> Option<usize> {
    let in_file = |idx: &usize| atoms.get(*idx).is_some_and(|atom| atom.file_path == file);
    if let Some(method) = name.strip_prefix("this.") {
        let owner = owner?;
        return index
            .by_qualified
            .get(&format!("{owner}.{method}"))
            .copied()
            .filter(in_file);
    }
    if name.contains('.') {
        return index.by_qualified.get(name).copied().filter(in_file);
    }
    index
        .named(name)
        .iter()
        .copied()
        .filter(in_file)
        .find(|idx| atoms[*idx].kind == AtomKind::Function && atoms[*idx].class_name.is_none())
}

fn resolve(
    atoms: &[Atom],
    index: &LinkIndex,
    caller_file: &str,
    file_facts: Option<&FileFacts>,
    owner: Option<&str>,
    name: &str,
) -> Option<usize> {
    if let Some(method) = name.strip_prefix("this.") {
        if method.contains('.') {
            return None;
        }
        return index.by_qualified.get(&format!("{}.{method}", owner?)).copied();
    }
    if let Some((head, _)) = name.split_once('.') {
        // Module aliases are resolved by the namespace pass.
        if file_facts.is_some_and(|facts| facts.aliases.contains_key(head)) {
            return None;
        }
        return index.by_qualified.get(name).copied();
    }

    if let Some(named) = file_facts.and_then(|facts| facts.named_imports.get(name)) {
        if let Some(target) = index.id(&atom_id(&named.file, &named.imported)) {
            return Some(target);
        }
    }

    let candidates: Vec<usize> = index
        .named(name)
        .iter()
        .copied()
        .filter(|idx| atoms[*idx].kind == AtomKind::Function && atoms[*idx].class_name.is_none())
        .collect();
    candidates
        .iter()
        .copied()
        .find(|idx| atoms[*idx].is_exported)
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|idx| atoms[*idx].file_path != caller_file)
        })
        .or_else(|| candidates.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CallRef;

    fn function(path: &str, name: &str, exported: bool, calls: &[(&str, CallType)]) -> Atom {
        let mut atom = Atom::new(path, name, None, AtomKind::Function);
        atom.is_exported = exported;
        atom.calls = calls
            .iter()
            .map(|(call, call_type)| CallRef {
                name: call.to_string(),
                call_type: *call_type,
                line: 2,
            })
            .collect();
        atom
    }

    fn run_direct(atoms: Vec<Atom>) -> AtomGraph {
        let mut graph = AtomGraph::new(atoms);
        let index = LinkIndex::build(graph.atoms());
        run(&mut graph, &index, &ProjectFacts::default()).unwrap();
        graph
    }

    fn called_by<'a>(graph: &'a AtomGraph, id: &str) -> &'a [String] {
        &graph
            .atoms()
            .iter()
            .find(|atom| atom.id == id)
            .unwrap()
            .called_by
    }

    #[test]
    fn internal_calls_prefer_the_same_file() {
        let graph = run_direct(vec![
            function("a.js", "helper", false, &[]),
            function("a.js", "main", false, &[("helper", CallType::Internal)]),
            function("b.js", "helper", true, &[]),
        ]);
        assert_eq!(called_by(&graph, "a.js::helper"), ["a.js::main"]);
        assert!(called_by(&graph, "b.js::helper").is_empty());
    }

    #[test]
    fn bare_names_prefer_exported_candidates() {
        let graph = run_direct(vec![
            function("a.js", "util", false, &[]),
            function("b.js", "util", true, &[]),
            function("c.js", "main", false, &[("util", CallType::External)]),
        ]);
        assert_eq!(called_by(&graph, "b.js::util"), ["c.js::main"]);
        assert!(called_by(&graph, "a.js::util").is_empty());
    }

    #[test]
    fn this_calls_resolve_through_the_owner() {
        let mut save = Atom::new("s.js", "save", Some("Store"), AtomKind::Function);
        save.calls.push(CallRef {
            name: "this.flush".into(),
            call_type: CallType::Internal,
            line: 3,
        });
        let flush = Atom::new("s.js", "flush", Some("Store"), AtomKind::Function);
        let graph = run_direct(vec![save, flush]);
        assert_eq!(called_by(&graph, "s.js::Store.flush"), ["s.js::Store.save"]);
    }

    #[test]
    fn bare_names_never_bind_to_methods() {
        let save = Atom::new("s.js", "save", Some("Store"), AtomKind::Function);
        let graph = run_direct(vec![
            save,
            function("s.js", "run", false, &[("save", CallType::Internal)]),
            function("t.js", "main", false, &[("save", CallType::External)]),
        ]);
        assert!(called_by(&graph, "s.js::Store.save").is_empty());
    }

    #[test]
    fn new_edges_update_change_risk() {
        let graph = run_direct(vec![
            function("a.js", "foo", true, &[]),
            function("b.js", "bar", false, &[("foo", CallType::External)]),
        ]);
        let foo = graph.atoms().iter().find(|a| a.id == "a.js::foo").unwrap();
        // 1/20*0.5 + 1/100*0.3 + 0.2
        assert_eq!(foo.derived.change_risk, 0.23);
    }
}
