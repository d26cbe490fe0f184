//! `alias.method` through module aliases and `this.method` across mixins.

use super::{AtomGraph, LinkIndex, ProjectFacts};
use crate::indexer::stable_id::atom_id;
use anyhow::Result;

pub fn run(graph: &mut AtomGraph, index: &LinkIndex, facts: &ProjectFacts) -> Result<usize> {
    let mut edges = 0;
    for caller in graph.live_callers() {
        let Some(file_facts) = facts.file(&caller.file_path) else {
            continue;
        };
        for (call_idx, (name, _)) in caller.calls.iter().enumerate() {
            let Some((head, method)) = name.split_once('.') else {
                continue;
            };
            if method.contains('.') {
                continue;
            }
            let targets: Vec<usize> = if head == "this" {
                facts
                    .mixin_peers(&caller.file_path)
                    .filter_map(|peer| index.id(&atom_id(peer, method)))
                    .collect()
            } else {
                file_facts
                    .aliases
                    .get(head)
                    .and_then(|file| index.id(&atom_id(file, method)))
                    .into_iter()
                    .collect()
            };
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

    fn call(atom: &mut Atom, name: &str) {
        atom.calls.push(CallRef {
            name: name.to_string(),
            call_type: CallType::External,
            line: atom.line + 1,
        });
    }

    fn link_with(files: &[(&str, &str)], atoms: Vec<Atom>) -> AtomGraph {
        let mut source = MemorySource::new();
        for (path, text) in files {
            source.insert(path, text);
        }
        let facts = ProjectFacts::build(&source.paths(), &source);
        let mut graph = AtomGraph::new(atoms);
        let index = LinkIndex::build(graph.atoms());
        run(&mut graph, &index, &facts).unwrap();
        graph
    }

    #[test]
    fn namespace_alias_calls_resolve_to_the_imported_file() {
        let mut main = Atom::new("main.js", "main", None, AtomKind::Function);
        call(&mut main, "api.fetchUser");
        let target = Atom::new("api.js", "fetchUser", None, AtomKind::Function);
        let graph = link_with(
            &[
                ("api.js", "export function fetchUser() {}\n"),
                ("main.js", "import * as api from './api';\nfunction main() { api.fetchUser(); }\n"),
            ],
            vec![main, target],
        );
        let target = graph.atoms().iter().find(|a| a.name == "fetchUser").unwrap();
        assert_eq!(target.called_by, vec!["main.js::main".to_string()]);
    }

    #[test]
    fn this_calls_reach_mixin_peers() {
        let mut save = Atom::new("mixin.js", "save", None, AtomKind::Function);
        call(&mut save, "this.onClick");
        let on_click = Atom::new("handlers.js", "onClick", None, AtomKind::Function);
        let graph = link_with(
            &[
                ("mixin.js", "export function save() { this.onClick(); }\n"),
                ("handlers.js", "export function onClick() {}\n"),
                (
                    "target.js",
                    "import * as mixin from './mixin.js';\nimport * as handlers from './handlers.js';\nclass Target {}\nObject.assign(Target.prototype, mixin, handlers);\n",
                ),
            ],
            vec![save, on_click],
        );
        let target = graph.atoms().iter().find(|a| a.name == "onClick").unwrap();
        assert_eq!(target.called_by, vec!["mixin.js::save".to_string()]);
    }
}
