use blake3::Hasher;

/// Deterministic atom identifier: `filePath::qualifiedName`.
///
/// The id carries no line information, so an atom keeps its id when code
/// above it moves. Two functions with the same qualified name in one file
/// collide; the builder keeps the first and drops later duplicates.
pub fn atom_id(file_path: &str, qualified_name: &str) -> String {
    format!("{file_path}::{qualified_name}")
}

/// Splits an atom id back into `(file_path, qualified_name)`.
pub fn split_atom_id(id: &str) -> Option<(&str, &str)> {
    id.rsplit_once("::")
}

/// Compute a structural fingerprint from an operation sequence.
///
/// # Format
///
/// Returns `dna_{16_hex_chars}`, the first 64 bits of the blake3 hash over the
/// null-separated operations. Identifiers are not part of the input, so two
/// functions doing the same work under different names share a hash.
pub fn dna_hash(operations: &[String]) -> String {
    let mut hasher = Hasher::new();
    for op in operations {
        hasher.update(op.as_bytes());
        hasher.update(b"\x00");
    }
    let hash = hasher.finalize();
    let hex = hash.to_hex();
    format!("dna_{}", &hex.as_str()[..16])
}

/// blake3 hex digest of raw file content.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}
