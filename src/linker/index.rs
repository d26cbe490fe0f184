use crate::model::Atom;
use std::collections::HashMap;

/// Lookup tables over the live atoms of the arena.
#[derive(Debug, Default)]
pub struct LinkIndex {
    pub by_name: HashMap<String, Vec<usize>>,
    pub by_qualified: HashMap<String, usize>,
    pub by_id: HashMap<String, usize>,
    /// Class name → owner-tagged method atoms.
    pub class_methods: HashMap<String, Vec<usize>>,
}

impl LinkIndex {
    pub fn build(atoms: &[Atom]) -> Self {
        let mut index = LinkIndex::default();
        for (idx, atom) in atoms.iter().enumerate() {
            if atom.is_removed() {
                continue;
            }
            index.by_name.entry(atom.name.clone()).or_default().push(idx);
            index.by_id.insert(atom.id.clone(), idx);
            if let Some(owner) = &atom.class_name {
                index
                    .by_qualified
                    .entry(atom.qualified_name())
                    .or_insert(idx);
                index.class_methods.entry(owner.clone()).or_default().push(idx);
            }
        }
        index
    }

    pub fn id(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn named(&self, name: &str) -> &[usize] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
