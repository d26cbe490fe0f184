use crate::model::{Atom, AtomKind, CallType};
use std::collections::HashMap;

/// Resolves a call name against the atoms of its own file.
///
/// `this.m` and `Owner.m` match class members, bare names match only
/// top-level functions of the file.
pub fn resolve_local(
    call: &str,
    caller_owner: Option<&str>,
    by_qualified: &HashMap<String, usize>,
    by_name: &HashMap<&str, usize>,
) -> Option<usize> {
    if let Some(method) = call.strip_prefix("this.") {
        let owner = caller_owner?;
        if method.contains('.') {
            return None;
        }
        return by_qualified.get(&format!("{owner}.{method}")).copied();
    }
    if call.contains('.') {
        return by_qualified.get(call).copied();
    }
    by_name.get(call).copied()
}

/// Tags each call internal or external and seeds `calledBy` for internal
/// targets. Returns the number of edges added.
pub fn link_intra_file(atoms: &mut [Atom]) -> usize {
    let mut by_qualified: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (idx, atom) in atoms.iter().enumerate() {
        if atom.kind != AtomKind::Function || atom.is_removed() {
            continue;
        }
        by_qualified.insert(atom.qualified_name(), idx);
        if atom.class_name.is_none() {
            by_name.entry(atom.name.as_str()).or_insert(idx);
        }
    }

    let mut edges: Vec<(usize, String)> = Vec::new();
    let mut resolved: Vec<Vec<bool>> = Vec::with_capacity(atoms.len());
    for atom in atoms.iter() {
        let mut flags = Vec::with_capacity(atom.calls.len());
        for call in &atom.calls {
            let target = resolve_local(
                &call.name,
                atom.class_name.as_deref(),
                &by_qualified,
                &by_name,
            );
            flags.push(target.is_some());
            if let Some(target) = target {
                edges.push((target, atom.id.clone()));
            }
        }
        resolved.push(flags);
    }

    for (atom, flags) in atoms.iter_mut().zip(resolved) {
        for (call, internal) in atom.calls.iter_mut().zip(flags) {
            call.call_type = if internal {
                CallType::Internal
            } else {
                CallType::External
            };
        }
    }

    let mut added = 0;
    for (target, caller) in edges {
        if atoms[target].add_caller(&caller) {
            added += 1;
        }
    }
    added
}
