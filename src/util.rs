use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reads a source file, replacing invalid UTF-8 sequences with U+FFFD.
pub fn read_to_string(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            repo_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Lexically resolves `./` and `../` in a slash-separated relative path.
pub fn join_relative(base_dir: &str, spec: &str) -> String {
    let mut parts: Vec<&str> = base_dir
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory portion of a slash-separated relative path, `""` at the root.
pub fn parent_dir(rel_path: &str) -> &str {
    match rel_path.rfind('/') {
        Some(idx) => &rel_path[..idx],
        None => "",
    }
}

pub fn slice_lines(content: &str, start_line: i64, end_line: i64) -> String {
    if content.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = (start_line.max(1) - 1) as usize;
    let mut end = end_line.max(1) as usize;
    if start >= lines.len() {
        return String::new();
    }
    if end > lines.len() {
        end = lines.len();
    }
    if end <= start {
        end = start + 1;
    }
    lines[start..end].join("\n")
}

pub fn slice_bytes(content: &str, start_byte: usize, end_byte: usize) -> Option<&str> {
    if end_byte <= start_byte || start_byte > content.len() {
        return None;
    }
    content.get(start_byte..end_byte.min(content.len()))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    Ok(())
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_relative_resolves_dots() {
        assert_eq!(join_relative("src/app", "./util"), "src/app/util");
        assert_eq!(join_relative("src/app", "../lib/x.js"), "src/lib/x.js");
        assert_eq!(join_relative("", "./a"), "a");
    }

    #[test]
    fn parent_dir_of_root_file_is_empty() {
        assert_eq!(parent_dir("a.js"), "");
        assert_eq!(parent_dir("src/a.js"), "src");
    }

    #[test]
    fn read_to_string_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.js");
        fs::write(&path, b"export function baz() {}\n\xff\xfe\n").unwrap();
        let text = read_to_string(&path).unwrap();
        assert!(text.starts_with("export function baz() {}\n"));
        assert!(text.contains('\u{FFFD}'));
        assert!(read_to_string(&dir.path().join("missing.js")).is_err());
    }

    #[test]
    fn round2_rounds_half_up() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.0 / 3.0), 0.33);
    }
}
