use crate::model::{Atom, FileRecord, RelationRow};

/// Configuration for a worker's write buffer
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum approximate memory for buffered atoms before an early flush (default: 64MB)
    pub max_memory_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

/// One processed file, ready to persist.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub record: FileRecord,
    pub atoms: Vec<Atom>,
    pub relations: Vec<RelationRow>,
    /// Atoms were reloaded from storage, nothing to write.
    pub skipped: bool,
}

/// Buffers a worker's results so a whole slice is written in one transaction.
///
/// Two triggers flush:
///
/// 1. **End of slice:** the worker drains the buffer once it has processed
///    every file
/// 2. **Memory pressure:** estimated memory of buffered atoms exceeds
///    `max_memory_bytes`
pub struct BatchWriter {
    pending: Vec<FileResult>,
    config: BatchConfig,
    estimated_memory_bytes: usize,
}

impl BatchWriter {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            pending: Vec::new(),
            config,
            estimated_memory_bytes: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BatchConfig::default())
    }

    pub fn add(&mut self, result: FileResult) {
        if !result.skipped {
            self.estimated_memory_bytes += Self::estimate_memory(&result);
        }
        self.pending.push(result);
    }

    pub fn should_flush(&self) -> bool {
        !self.pending.is_empty() && self.estimated_memory_bytes >= self.config.max_memory_bytes
    }

    /// Take all pending results and reset the writer
    pub fn take(&mut self) -> Vec<FileResult> {
        self.estimated_memory_bytes = 0;
        std::mem::take(&mut self.pending)
    }

    /// Rough estimate: 1KB per atom plus 100 bytes per call and relation row.
    fn estimate_memory(result: &FileResult) -> usize {
        let atoms: usize = result
            .atoms
            .iter()
            .map(|atom| 1024 + atom.calls.len() * 100)
            .sum();
        atoms + result.relations.len() * 100
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn estimated_memory(&self) -> usize {
        self.estimated_memory_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Projects an atom's calls into relation rows; targets are filled in by
/// the linker.
pub fn relation_rows(atom: &Atom) -> Vec<RelationRow> {
    atom.calls
        .iter()
        .map(|call| RelationRow {
            source_atom_id: atom.id.clone(),
            source_file: atom.file_path.clone(),
            call_name: call.name.clone(),
            call_type: call.call_type,
            line: call.line,
            target_atom_id: None,
        })
        .collect()
}
