//! Derived metric vectors computed from the finished graph.
//!
//! Every score is normalized to `[0, 1]` and rounded to two decimals.

use crate::model::{Atom, Derived};
use crate::util::round2;
use std::collections::HashMap;

pub const MAX_DEPENDENCY_DEPTH: u32 = 10;

/// Observed change history for an atom. Nothing records this yet, so the
/// stability score falls back to timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct History {
    pub change_frequency: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorContext {
    pub callers: usize,
    pub callees: usize,
    pub history: Option<History>,
}

impl VectorContext {
    pub fn for_atom(atom: &Atom) -> Self {
        Self {
            callers: atom.called_by.len(),
            callees: atom.distinct_callees(),
            history: None,
        }
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn cohesion(atom: &Atom) -> f64 {
    if atom.lines_of_code <= 0 {
        return 1.0;
    }
    round2(clamp01(
        1.0 - 2.0 * atom.complexity as f64 / atom.lines_of_code as f64,
    ))
}

pub fn coupling(atom: &Atom, ctx: &VectorContext) -> f64 {
    let total_calls = atom.calls.len();
    let connections = (ctx.callers + ctx.callees) as f64;
    let external_ratio = if total_calls == 0 {
        0.0
    } else {
        atom.external_call_count() as f64 / total_calls as f64
    };
    round2(clamp01(0.6 * clamp01(connections / 20.0) + 0.4 * external_ratio))
}

pub fn importance(atom: &Atom, ctx: &VectorContext) -> f64 {
    let callers = ((ctx.callers as f64 + 1.0).log2() / 5.0).clamp(0.0, 0.5);
    let exported = if atom.is_exported { 1.0 } else { 0.0 };
    round2(clamp01(
        0.4 * callers + 0.3 * exported + 0.3 * clamp01(atom.complexity as f64 / 50.0),
    ))
}

pub fn propagation(atom: &Atom, ctx: &VectorContext, coupling: f64) -> f64 {
    round2(clamp01(
        0.30 * clamp01(atom.complexity as f64 / 30.0)
            + 0.30 * clamp01(ctx.callers as f64 / 10.0)
            + 0.20 * clamp01(ctx.callees as f64 / 10.0)
            + 0.20 * coupling,
    ))
}

pub fn fragility(atom: &Atom, coupling: f64) -> f64 {
    let unguarded = if atom.signals.has_error_handling { 0.0 } else { 1.0 };
    let network = if atom.signals.has_network_calls { 0.5 } else { 0.0 };
    round2(clamp01(
        0.3 * clamp01(atom.complexity as f64 / 20.0) + 0.3 * unguarded + 0.2 * network
            + 0.2 * coupling,
    ))
}

pub fn testability(atom: &Atom) -> f64 {
    let mut score = 1.0 - 0.4 * clamp01(atom.complexity as f64 / 80.0);
    if atom.signals.has_side_effects {
        score -= 0.2;
    }
    if atom.signals.has_nested_loops {
        score -= 0.15;
    }
    if atom.is_async {
        score -= 0.1;
    }
    score -= (atom.params.len() as f64 / 10.0).clamp(0.0, 0.15);
    round2(clamp01(score))
}

pub fn stability(atom: &Atom, ctx: &VectorContext) -> f64 {
    let frequency = match ctx.history {
        Some(history) => clamp01(history.change_frequency),
        None if atom.extracted_at > atom.created_at => 0.5,
        None => 0.0,
    };
    round2(1.0 - frequency)
}

pub fn change_risk(atom: &Atom) -> f64 {
    let exported = if atom.is_exported { 0.2 } else { 0.0 };
    round2(
        (atom.called_by.len() as f64 / 20.0 * 0.5 + atom.complexity as f64 / 100.0 * 0.3 + exported)
            .min(1.0),
    )
}

pub fn archetype_weight(atom: &Atom) -> f64 {
    atom.archetype
        .as_ref()
        .map(|archetype| round2(archetype.severity as f64 / 10.0))
        .unwrap_or(0.0)
}

/// Applies every vector to one atom; `true` when any value changed.
pub fn apply(atom: &mut Atom, ctx: &VectorContext, depth: u32) -> bool {
    let coupling_score = coupling(atom, ctx);
    let derived = Derived {
        fragility_score: fragility(atom, coupling_score),
        testability_score: testability(atom),
        coupling_score,
        change_risk: change_risk(atom),
    };
    let importance_score = importance(atom, ctx);
    let stability_score = stability(atom, ctx);
    let propagation_score = propagation(atom, ctx, coupling_score);
    let cohesion_score = cohesion(atom);
    let weight = archetype_weight(atom);

    let changed = atom.derived != derived
        || atom.importance_score != importance_score
        || atom.stability_score != stability_score
        || atom.propagation_score != propagation_score
        || atom.cohesion_score != cohesion_score
        || atom.dependency_depth != depth
        || atom.archetype_weight != weight;
    atom.derived = derived;
    atom.importance_score = importance_score;
    atom.stability_score = stability_score;
    atom.propagation_score = propagation_score;
    atom.cohesion_score = cohesion_score;
    atom.dependency_depth = depth;
    atom.archetype_weight = weight;
    changed
}

/// Longest chain of resolved callees per atom, following `calledBy` edges
/// backwards. Cycles contribute nothing past the repeated atom.
pub fn dependency_depths(atoms: &[Atom]) -> Vec<u32> {
    let by_id: HashMap<&str, usize> = atoms
        .iter()
        .enumerate()
        .map(|(idx, atom)| (atom.id.as_str(), idx))
        .collect();
    let mut callees: Vec<Vec<usize>> = vec![Vec::new(); atoms.len()];
    for (target, atom) in atoms.iter().enumerate() {
        for caller in &atom.called_by {
            if let Some(&source) = by_id.get(caller.as_str()) {
                callees[source].push(target);
            }
        }
    }

    let mut memo: Vec<Option<u32>> = vec![None; atoms.len()];
    let mut on_stack = vec![false; atoms.len()];
    (0..atoms.len())
        .map(|idx| depth_of(idx, &callees, &mut memo, &mut on_stack))
        .collect()
}

fn depth_of(
    idx: usize,
    callees: &[Vec<usize>],
    memo: &mut [Option<u32>],
    on_stack: &mut [bool],
) -> u32 {
    if let Some(depth) = memo[idx] {
        return depth;
    }
    if on_stack[idx] {
        return 0;
    }
    on_stack[idx] = true;
    let mut depth = 0;
    for &next in &callees[idx] {
        if on_stack[next] {
            continue;
        }
        depth = depth.max(1 + depth_of(next, callees, memo, on_stack));
        if depth >= MAX_DEPENDENCY_DEPTH {
            depth = MAX_DEPENDENCY_DEPTH;
            break;
        }
    }
    on_stack[idx] = false;
    memo[idx] = Some(depth);
    depth
}

/// Recomputes vectors for all live atoms; returns indices whose values changed.
pub fn compute_all(atoms: &mut [Atom]) -> Vec<usize> {
    let depths = dependency_depths(atoms);
    let mut changed = Vec::new();
    for (idx, atom) in atoms.iter_mut().enumerate() {
        if atom.is_removed() {
            continue;
        }
        let ctx = VectorContext::for_atom(atom);
        if apply(atom, &ctx, depths[idx]) {
            changed.push(idx);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomKind, CallRef, CallType};

    fn atom(name: &str) -> Atom {
        Atom::new("a.js", name, None, AtomKind::Function)
    }

    #[test]
    fn cohesion_stays_in_bounds() {
        let mut value = atom("f");
        value.lines_of_code = 0;
        assert_eq!(cohesion(&value), 1.0);
        value.lines_of_code = 10;
        value.complexity = 1;
        assert_eq!(cohesion(&value), 0.8);
        value.complexity = 40;
        assert_eq!(cohesion(&value), 0.0);
    }

    #[test]
    fn change_risk_saturates() {
        let mut value = atom("f");
        value.is_exported = true;
        value.complexity = 10;
        value.called_by = vec!["b.js::g".into(); 2];
        assert_eq!(change_risk(&value), 0.28);
        value.complexity = 500;
        assert_eq!(change_risk(&value), 1.0);
    }

    #[test]
    fn stability_reflects_re_extraction() {
        let mut value = atom("f");
        value.created_at = 10;
        value.extracted_at = 10;
        assert_eq!(stability(&value, &VectorContext::for_atom(&value)), 1.0);
        value.extracted_at = 20;
        assert_eq!(stability(&value, &VectorContext::for_atom(&value)), 0.5);
        let ctx = VectorContext {
            history: Some(History {
                change_frequency: 0.25,
            }),
            ..VectorContext::for_atom(&value)
        };
        assert_eq!(stability(&value, &ctx), 0.75);
    }

    #[test]
    fn coupling_mixes_connections_and_external_ratio() {
        let mut value = atom("f");
        value.calls = vec![
            CallRef {
                name: "g".into(),
                call_type: CallType::Internal,
                line: 1,
            },
            CallRef {
                name: "fetch".into(),
                call_type: CallType::External,
                line: 2,
            },
        ];
        let ctx = VectorContext::for_atom(&value);
        assert_eq!(coupling(&value, &ctx), 0.26);
    }

    #[test]
    fn testability_never_negative() {
        let mut value = atom("f");
        value.complexity = 200;
        value.is_async = true;
        value.params = (0..5).map(|idx| format!("p{idx}")).collect();
        value.signals.has_side_effects = true;
        value.signals.has_nested_loops = true;
        assert_eq!(testability(&value), 0.0);
    }

    #[test]
    fn dependency_depth_handles_cycles_and_chains() {
        let mut a = atom("a");
        let mut b = atom("b");
        let mut c = atom("c");
        // a -> b -> c -> b
        b.called_by = vec![a.id.clone(), c.id.clone()];
        c.called_by = vec![b.id.clone()];
        a.called_by = Vec::new();
        let depths = dependency_depths(&[a, b, c]);
        assert_eq!(depths[0], 2);
        assert!(depths.iter().all(|depth| *depth <= MAX_DEPENDENCY_DEPTH));
    }

    #[test]
    fn compute_all_reports_changes_once() {
        let mut atoms = vec![atom("a"), atom("b")];
        atoms[1].called_by = vec![atoms[0].id.clone()];
        let first = compute_all(&mut atoms);
        assert_eq!(first, vec![0, 1]);
        assert_eq!(atoms[0].dependency_depth, 1);
        assert!(compute_all(&mut atoms).is_empty());
    }
}
