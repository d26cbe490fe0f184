//! Per-file facts the linking passes read from source text.

use crate::indexer::scan::JS_TS_EXTENSIONS;
use crate::util::{join_relative, parent_dir};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?([^'"`;]+?)\s+from\s+['"]([^'"]+)['"]"#)
        .expect("valid import regex")
});
static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)\b(?:const|let|var)\s+(\{[^}]*\}|[A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#,
    )
    .expect("valid require regex")
});
static NEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bnew\s+([A-Za-z_$][\w$]*)\s*\(").expect("valid new regex")
});
static ASSIGN_MIXIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Object\.assign\(\s*([A-Za-z_$][\w$]*)\.prototype\s*,([^;]*?)\)\s*;?")
        .expect("valid mixin regex")
});
static PROTOTYPE_SPREAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_$][\w$]*)\.prototype\s*=\s*\{([^}]*)\}").expect("valid prototype regex")
});
static EXPORT_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*\{")
        .expect("valid export object regex")
});
static DYNAMIC_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\(\s*['"`]([^'"`]+)['"`]\s*\)"#).expect("valid dynamic import regex")
});
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("valid identifier regex"));

/// Supplies source text for a repository-relative path.
pub trait SourceProvider {
    fn source(&self, rel_path: &str) -> Option<String>;
}

/// Reads files under a repository root.
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl SourceProvider for DiskSource {
    fn source(&self, rel_path: &str) -> Option<String> {
        crate::util::read_to_string(&self.root.join(rel_path)).ok()
    }
}

/// In-memory sources keyed by relative path.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel_path: &str, source: &str) {
        self.files.insert(rel_path.to_string(), source.to_string());
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl SourceProvider for MemorySource {
    fn source(&self, rel_path: &str) -> Option<String> {
        self.files.get(rel_path).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    pub file: String,
    pub imported: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportObject {
    pub name: String,
    pub line: i64,
    /// Bare identifier values, in declaration order.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    /// Namespace, default and whole-module `require` aliases → target file.
    pub aliases: HashMap<String, String>,
    /// Local name → exporting file and exported name.
    pub named_imports: HashMap<String, NamedImport>,
    /// Types constructed with `new` in this file.
    pub instantiated: BTreeSet<String>,
    pub export_objects: Vec<ExportObject>,
    /// Files loaded with `import()`.
    pub dynamic_imports: Vec<String>,
    pub lines: Vec<String>,
}

impl FileFacts {
    /// The file a local identifier refers to, through any import form.
    pub fn file_for_local(&self, local: &str) -> Option<&str> {
        self.aliases
            .get(local)
            .map(String::as_str)
            .or_else(|| self.named_imports.get(local).map(|named| named.file.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFacts {
    pub files: HashMap<String, FileFacts>,
    /// Symmetric co-membership: each member file of a mixin composition maps
    /// to every other member.
    pub mixin_peers: HashMap<String, BTreeSet<String>>,
    pub dynamic_import_targets: HashSet<String>,
}

impl ProjectFacts {
    pub fn build(file_paths: &[String], provider: &dyn SourceProvider) -> Self {
        let known: HashSet<&str> = file_paths.iter().map(String::as_str).collect();
        let mut facts = ProjectFacts::default();
        let mut groups: Vec<BTreeSet<String>> = Vec::new();
        for path in file_paths {
            let Some(source) = provider.source(path) else {
                tracing::debug!("no source for {path}, linking without its facts");
                continue;
            };
            let (file_facts, file_groups) = collect_file_facts(path, &source, &known);
            for target in &file_facts.dynamic_imports {
                facts.dynamic_import_targets.insert(target.clone());
            }
            groups.extend(file_groups);
            facts.files.insert(path.clone(), file_facts);
        }
        for group in groups {
            for member in &group {
                let peers = facts.mixin_peers.entry(member.clone()).or_default();
                for other in &group {
                    if other != member {
                        peers.insert(other.clone());
                    }
                }
            }
        }
        facts
    }

    pub fn file(&self, path: &str) -> Option<&FileFacts> {
        self.files.get(path)
    }

    pub fn mixin_peers(&self, path: &str) -> impl Iterator<Item = &String> {
        self.mixin_peers.get(path).into_iter().flatten()
    }
}

fn collect_file_facts(
    path: &str,
    source: &str,
    known: &HashSet<&str>,
) -> (FileFacts, Vec<BTreeSet<String>>) {
    let code = crate::metrics::strip_comments_and_strings(source);
    let mut facts = FileFacts {
        lines: code.lines().map(str::to_string).collect(),
        ..FileFacts::default()
    };

    for caps in IMPORT_RE.captures_iter(source) {
        let Some(target) = resolve_import_path(path, &caps[2], known) else {
            continue;
        };
        parse_import_clause(&caps[1], &target, &mut facts);
    }
    for caps in REQUIRE_RE.captures_iter(source) {
        let Some(target) = resolve_import_path(path, &caps[2], known) else {
            continue;
        };
        let binding = caps[1].trim();
        if binding.starts_with('{') {
            for (imported, local) in destructured_names(binding) {
                facts.named_imports.insert(
                    local,
                    NamedImport {
                        file: target.clone(),
                        imported,
                    },
                );
            }
        } else {
            facts.aliases.insert(binding.to_string(), target);
        }
    }
    for caps in NEW_RE.captures_iter(&code) {
        facts.instantiated.insert(caps[1].to_string());
    }
    for caps in DYNAMIC_IMPORT_RE.captures_iter(source) {
        if let Some(target) = resolve_import_path(path, &caps[1], known) {
            if !facts.dynamic_imports.contains(&target) {
                facts.dynamic_imports.push(target);
            }
        }
    }
    facts.export_objects = collect_export_objects(source);

    let mut groups = Vec::new();
    for caps in ASSIGN_MIXIN_RE.captures_iter(&code) {
        let members = caps[2]
            .split(',')
            .map(|part| part.trim().trim_start_matches('{').trim_end_matches('}').trim())
            .map(|part| part.trim_start_matches("...").trim())
            .filter(|part| IDENT_RE.is_match(part))
            .map(str::to_string)
            .collect::<Vec<_>>();
        groups.push(mixin_group(path, &members, &facts));
    }
    for caps in PROTOTYPE_SPREAD_RE.captures_iter(&code) {
        let members = caps[2]
            .split(',')
            .filter_map(|part| part.trim().strip_prefix("..."))
            .map(str::trim)
            .filter(|part| IDENT_RE.is_match(part))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if !members.is_empty() {
            groups.push(mixin_group(path, &members, &facts));
        }
    }
    groups.retain(|group| group.len() > 1);
    (facts, groups)
}

/// The composing file plus the file behind each mixed-in identifier.
fn mixin_group(path: &str, members: &[String], facts: &FileFacts) -> BTreeSet<String> {
    let mut group = BTreeSet::new();
    group.insert(path.to_string());
    for member in members {
        if let Some(file) = facts.file_for_local(member) {
            group.insert(file.to_string());
        }
    }
    group
}

fn parse_import_clause(clause: &str, target: &str, facts: &mut FileFacts) {
    let clause = clause.trim();
    let (head, named) = match clause.find('{') {
        Some(open) => {
            let close = clause.rfind('}').unwrap_or(clause.len());
            (&clause[..open], Some(&clause[open..close.max(open)]))
        }
        None => (clause, None),
    };
    for part in head.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(alias) = part.strip_prefix("* as ").or_else(|| part.strip_prefix("*as ")) {
            facts.aliases.insert(alias.trim().to_string(), target.to_string());
        } else if IDENT_RE.is_match(part) {
            facts.aliases.insert(part.to_string(), target.to_string());
        }
    }
    if let Some(named) = named {
        for spec in named.trim_start_matches('{').split(',') {
            let spec = spec.trim().trim_start_matches("type ").trim();
            if spec.is_empty() {
                continue;
            }
            let (imported, local) = match spec.split_once(" as ") {
                Some((imported, local)) => (imported.trim(), local.trim()),
                None => (spec, spec),
            };
            if !IDENT_RE.is_match(local) {
                continue;
            }
            facts.named_imports.insert(
                local.to_string(),
                NamedImport {
                    file: target.to_string(),
                    imported: imported.to_string(),
                },
            );
        }
    }
}

/// `{ a, b: c }` → `[(a, a), (b, c)]`.
fn destructured_names(binding: &str) -> Vec<(String, String)> {
    binding
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (imported, local) = match part.split_once(':') {
                Some((imported, local)) => (imported.trim(), local.trim()),
                None => (part, part),
            };
            let local = local.split('=').next().unwrap_or(local).trim();
            if IDENT_RE.is_match(imported) && IDENT_RE.is_match(local) {
                Some((imported.to_string(), local.to_string()))
            } else {
                None
            }
        })
        .collect()
}

fn collect_export_objects(source: &str) -> Vec<ExportObject> {
    let mut objects = Vec::new();
    for caps in EXPORT_OBJECT_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let body_start = whole.end();
        let Some(body) = balanced_body(&source[body_start..]) else {
            continue;
        };
        let line = source[..whole.start()].matches('\n').count() as i64 + 1;
        let mut members = Vec::new();
        for entry in split_top_level(body) {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with("...") {
                continue;
            }
            let value = match entry.split_once(':') {
                Some((_, value)) => value.trim(),
                None => entry,
            };
            if IDENT_RE.is_match(value) && !members.iter().any(|m| m == value) {
                members.push(value.to_string());
            }
        }
        objects.push(ExportObject {
            name: caps[1].to_string(),
            line,
            members,
        });
    }
    objects
}

/// Text up to the `}` closing a brace opened just before `rest`.
fn balanced_body(rest: &str) -> Option<&str> {
    let mut depth = 1usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in body.char_indices() {
        match ch {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Resolves a relative module specifier to a known repository file.
///
/// Tries the literal path, then each JS/TS extension, then `index.*` inside
/// a directory. Package imports resolve to nothing.
pub fn resolve_import_path(from: &str, spec: &str, known: &HashSet<&str>) -> Option<String> {
    if !spec.starts_with('.') {
        return None;
    }
    let base = join_relative(parent_dir(from), spec);
    if known.contains(base.as_str()) {
        return Some(base);
    }
    let stem = strip_js_extension(&base);
    for ext in JS_TS_EXTENSIONS {
        let candidate = format!("{stem}.{ext}");
        if known.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    for ext in JS_TS_EXTENSIONS {
        let candidate = format!("{base}/index.{ext}");
        if known.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    None
}

/// `./a.js` written in TS sources often refers to `./a.ts`.
fn strip_js_extension(path: &str) -> &str {
    for ext in [".js", ".jsx", ".mjs", ".cjs"] {
        if let Some(stem) = path.strip_suffix(ext) {
            return stem;
        }
    }
    path
}
