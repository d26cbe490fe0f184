//! `instance.method()` calls against classes constructed in the same file.
//!
//! The receiver's type is never tracked, so every class instantiated in the
//! caller's file is a candidate.

use super::{AtomGraph, LinkIndex, ProjectFacts};
use anyhow::Result;

pub fn run(graph: &mut AtomGraph, index: &LinkIndex, facts: &ProjectFacts) -> Result<usize> {
    let mut edges = 0;
    for caller in graph.live_callers() {
        let Some(file_facts) = facts.file(&caller.file_path) else {
            continue;
        };
        if file_facts.instantiated.is_empty() {
            continue;
        }
        for (call_idx, (name, _)) in caller.calls.iter().enumerate() {
            let Some((receiver, method)) = name.split_once('.') else {
                continue;
            };
            if receiver == "this" || method.contains('.') {
                continue;
            }
            let mut targets = Vec::new();
            for class in &file_facts.instantiated {
                let Some(methods) = index.class_methods.get(class) else {
                    continue;
                };
                for &candidate in methods {
                    if graph.atom(candidate)?.name == method {
                        targets.push(candidate);
                    }
                }
            }
            for target in targets {
                if target == caller.idx {
                    continue;
                }
                graph.record_resolution(caller.idx, call_idx, target)?;
                if graph.add_edge(target, &caller.id)? {
                    edges += 1;
                }
            }
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::MemorySource;
    use crate::model::{Atom, AtomKind, CallRef, CallType};

    #[test]
    fn methods_of_instantiated_classes_gain_callers() {
        let mut source = MemorySource::new();
        source.insert("store.js", "export class Store { save() {} }\nexport class Cache { save() {} }\n");
        source.insert(
            "main.js",
            "import { Store } from './store';\nfunction main() {\n  const s = new Store();\n  s.save();\n}\n",
        );
        let facts = ProjectFacts::build(&source.paths(), &source);

        let mut main = Atom::new("main.js", "main", None, AtomKind::Function);
        main.calls.push(CallRef {
            name: "s.save".into(),
            call_type: CallType::External,
            line: 4,
        });
        let store_save = Atom::new("store.js", "save", Some("Store"), AtomKind::Function);
        let cache_save = Atom::new("store.js", "save", Some("Cache"), AtomKind::Function);
        let mut graph = AtomGraph::new(vec![main, store_save, cache_save]);
        let index = LinkIndex::build(graph.atoms());

        assert_eq!(run(&mut graph, &index, &facts).unwrap(), 1);
        let callers = |id: &str| {
            graph
                .atoms()
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.called_by.clone())
                .unwrap()
        };
        assert_eq!(callers("store.js::Store.save"), vec!["main.js::main".to_string()]);
        assert!(callers("store.js::Cache.save").is_empty());
    }
}
