//! Functions gathered into an exported object literal.
//!
//! `export const api = { fetchUser, save: persist }` makes the object a
//! caller of each imported function it lists, but only once something
//! consumes the object.

use super::{AtomGraph, LinkIndex, ProjectFacts};
use crate::indexer::stable_id::atom_id;
use anyhow::Result;

pub fn run(graph: &mut AtomGraph, index: &LinkIndex, facts: &ProjectFacts) -> Result<usize> {
    let mut paths: Vec<&String> = facts.files.keys().collect();
    paths.sort();

    let mut edges = 0;
    for path in paths {
        let Some(file_facts) = facts.file(path) else {
            continue;
        };
        for object in &file_facts.export_objects {
            let object_id = atom_id(path, &object.name);
            let Some(object_idx) = index.id(&object_id) else {
                continue;
            };
            if graph.atom(object_idx)?.called_by.is_empty() {
                continue;
            }
            for member in &object.members {
                let Some(named) = file_facts.named_imports.get(member) else {
                    continue;
                };
                if named.file == *path {
                    continue;
                }
                let Some(target) = index.id(&atom_id(&named.file, &named.imported)) else {
                    continue;
                };
                if graph.add_edge(target, &object_id)? {
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
    use crate::model::{Atom, AtomKind};

    fn setup(consumed: bool) -> (AtomGraph, usize) {
        let mut source = MemorySource::new();
        source.insert("helpers.js", "export function helperA() {}\nexport function helperB() {}\n");
        source.insert(
            "api.js",
            "import { helperA, helperB } from './helpers';\nexport const handlers = { helperA, helperB };\n",
        );
        let facts = ProjectFacts::build(&source.paths(), &source);

        let mut handlers = Atom::new("api.js", "handlers", None, AtomKind::Variable);
        handlers.is_exported = true;
        if consumed {
            handlers.called_by.push("main.js".into());
        }
        let atoms = vec![
            handlers,
            Atom::new("helpers.js", "helperA", None, AtomKind::Function),
            Atom::new("helpers.js", "helperB", None, AtomKind::Function),
        ];
        let mut graph = AtomGraph::new(atoms);
        let index = LinkIndex::build(graph.atoms());
        let edges = run(&mut graph, &index, &facts).unwrap();
        (graph, edges)
    }

    #[test]
    fn unconsumed_objects_add_nothing() {
        let (graph, edges) = setup(false);
        assert_eq!(edges, 0);
        assert!(graph.atoms().iter().all(|a| a.called_by.is_empty()));
    }

    #[test]
    fn consumed_objects_call_their_members() {
        let (graph, edges) = setup(true);
        assert_eq!(edges, 2);
        let helper = graph.atoms().iter().find(|a| a.name == "helperA").unwrap();
        assert_eq!(helper.called_by, vec!["api.js::handlers".to_string()]);
    }
}
