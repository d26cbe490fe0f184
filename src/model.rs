use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    Function,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Declaration,
    Expression,
    Arrow,
    Method,
    Variable,
}

impl FunctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionType::Declaration => "declaration",
            FunctionType::Expression => "expression",
            FunctionType::Arrow => "arrow",
            FunctionType::Method => "method",
            FunctionType::Variable => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Internal,
    External,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Internal => "internal",
            CallType::External => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRef {
    pub name: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub line: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchetypeKind {
    GodFunction,
    TestCallback,
    FragileNetwork,
    HotPath,
    DeadFunction,
    Orchestrator,
    Handler,
    Factory,
    Initializer,
    Transformer,
    Persister,
    ClassMethod,
    PrivateUtility,
    Constant,
    Utility,
    Standard,
}

impl ArchetypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchetypeKind::GodFunction => "god-function",
            ArchetypeKind::TestCallback => "test-callback",
            ArchetypeKind::FragileNetwork => "fragile-network",
            ArchetypeKind::HotPath => "hot-path",
            ArchetypeKind::DeadFunction => "dead-function",
            ArchetypeKind::Orchestrator => "orchestrator",
            ArchetypeKind::Handler => "handler",
            ArchetypeKind::Factory => "factory",
            ArchetypeKind::Initializer => "initializer",
            ArchetypeKind::Transformer => "transformer",
            ArchetypeKind::Persister => "persister",
            ArchetypeKind::ClassMethod => "class-method",
            ArchetypeKind::PrivateUtility => "private-utility",
            ArchetypeKind::Constant => "constant",
            ArchetypeKind::Utility => "utility",
            ArchetypeKind::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    #[serde(rename = "type")]
    pub kind: ArchetypeKind,
    pub severity: u8,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurposeKind {
    ApiExport,
    TestHelper,
    ScriptMain,
    ConfigSetup,
    ClassMethod,
    EventHandler,
    TimerAsync,
    NetworkHandler,
    InternalHelper,
    DeadCode,
    Removed,
}

impl PurposeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurposeKind::ApiExport => "API_EXPORT",
            PurposeKind::TestHelper => "TEST_HELPER",
            PurposeKind::ScriptMain => "SCRIPT_MAIN",
            PurposeKind::ConfigSetup => "CONFIG_SETUP",
            PurposeKind::ClassMethod => "CLASS_METHOD",
            PurposeKind::EventHandler => "EVENT_HANDLER",
            PurposeKind::TimerAsync => "TIMER_ASYNC",
            PurposeKind::NetworkHandler => "NETWORK_HANDLER",
            PurposeKind::InternalHelper => "INTERNAL_HELPER",
            PurposeKind::DeadCode => "DEAD_CODE",
            PurposeKind::Removed => "REMOVED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purpose {
    #[serde(rename = "type")]
    pub kind: PurposeKind,
    pub reason: String,
    pub confidence: f64,
    pub is_dead_code: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerPatternId {
    DirectCall,
    Archived,
    ClassInstance,
    TestFramework,
    ScriptConstant,
    EntryPoint,
    CliCommand,
    EventCallback,
    TrulyDead,
    InternalConstant,
    ReExport,
    DynamicImport,
    Unknown,
}

impl CallerPatternId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerPatternId::DirectCall => "direct_call",
            CallerPatternId::Archived => "archived",
            CallerPatternId::ClassInstance => "class_instance",
            CallerPatternId::TestFramework => "test_framework",
            CallerPatternId::ScriptConstant => "script_constant",
            CallerPatternId::EntryPoint => "entry_point",
            CallerPatternId::CliCommand => "cli_command",
            CallerPatternId::EventCallback => "event_callback",
            CallerPatternId::TrulyDead => "truly_dead",
            CallerPatternId::InternalConstant => "internal_constant",
            CallerPatternId::ReExport => "re_export",
            CallerPatternId::DynamicImport => "dynamic_import",
            CallerPatternId::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerPattern {
    pub id: CallerPatternId,
    pub reason: String,
    pub has_callers: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
    pub fragility_score: f64,
    pub testability_score: f64,
    pub coupling_score: f64,
    pub change_risk: f64,
}

/// Compact view of extractor results that survives pruning to a lite atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signals {
    pub has_side_effects: bool,
    pub has_network_calls: bool,
    pub has_error_handling: bool,
    pub has_nested_loops: bool,
    pub has_timers: bool,
    pub has_event_signals: bool,
    pub has_lifecycle_hooks: bool,
    pub has_dom_mutation: bool,
    pub has_dynamic_import: bool,
    pub flow_type: Option<String>,
    pub dna_hash: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    pub removed_at: i64,
    pub previous_loc: i64,
    pub previous_complexity: i64,
    pub previous_caller_count: usize,
    pub dna_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub line: i64,
    pub end_line: i64,
    pub kind: AtomKind,
    pub complexity: i64,
    pub lines_of_code: i64,
    pub is_exported: bool,
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub function_type: FunctionType,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub calls: Vec<CallRef>,
    #[serde(default)]
    pub called_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<Archetype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<Purpose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_pattern: Option<CallerPattern>,
    #[serde(default)]
    pub derived: Derived,
    #[serde(default)]
    pub importance_score: f64,
    #[serde(default)]
    pub stability_score: f64,
    #[serde(default)]
    pub propagation_score: f64,
    #[serde(default)]
    pub cohesion_score: f64,
    #[serde(default)]
    pub dependency_depth: u32,
    #[serde(default)]
    pub archetype_weight: f64,
    #[serde(default)]
    pub signals: Signals,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub extracted_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Atom {
    /// A bare atom with default analytics; the id is derived from the path and
    /// qualified name.
    pub fn new(file_path: &str, name: &str, class_name: Option<&str>, kind: AtomKind) -> Self {
        let qualified = match class_name {
            Some(owner) => format!("{owner}.{name}"),
            None => name.to_string(),
        };
        Atom {
            id: crate::indexer::stable_id::atom_id(file_path, &qualified),
            name: name.to_string(),
            file_path: file_path.to_string(),
            line: 1,
            end_line: 1,
            kind,
            complexity: 1,
            lines_of_code: 1,
            is_exported: false,
            is_async: false,
            class_name: class_name.map(|owner| owner.to_string()),
            function_type: match kind {
                AtomKind::Function => FunctionType::Declaration,
                AtomKind::Variable => FunctionType::Variable,
            },
            params: Vec::new(),
            calls: Vec::new(),
            called_by: Vec::new(),
            archetype: None,
            purpose: None,
            caller_pattern: None,
            derived: Derived::default(),
            importance_score: 0.0,
            stability_score: 0.0,
            propagation_score: 0.0,
            cohesion_score: 0.0,
            dependency_depth: 0,
            archetype_weight: 0.0,
            signals: Signals::default(),
            metadata: Map::new(),
            source: None,
            lineage: None,
            created_at: 0,
            extracted_at: 0,
            updated_at: 0,
        }
    }

    /// `Owner.method` for class members, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.class_name {
            Some(owner) => format!("{owner}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Adds `caller` to `called_by` unless it is this atom or already present.
    pub fn add_caller(&mut self, caller: &str) -> bool {
        if caller == self.id || self.called_by.iter().any(|existing| existing == caller) {
            return false;
        }
        self.called_by.push(caller.to_string());
        true
    }

    pub fn is_removed(&self) -> bool {
        matches!(
            self.purpose.as_ref().map(|purpose| purpose.kind),
            Some(PurposeKind::Removed)
        )
    }

    pub fn external_call_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.call_type == CallType::External)
            .count()
    }

    pub fn internal_call_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.call_type == CallType::Internal)
            .count()
    }

    /// Number of distinct callee names.
    pub fn distinct_callees(&self) -> usize {
        let mut names: Vec<&str> = self.calls.iter().map(|call| call.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: String,
    pub hash: String,
    pub last_analyzed: i64,
    pub atom_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRow {
    pub source_atom_id: String,
    pub source_file: String,
    pub call_name: String,
    pub call_type: CallType,
    pub line: i64,
    pub target_atom_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassStats {
    pub name: String,
    pub edges_added: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub scanned: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deleted_files: usize,
    pub removed_atoms: usize,
    pub atoms: usize,
    pub extractor_runs: usize,
    pub edges_added: usize,
    pub atoms_saved: usize,
    pub relations_saved: usize,
    pub workers: usize,
    pub passes: Vec<PassStats>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ChangedFilesResult {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RepoOverview {
    pub repo_root: String,
    pub files: i64,
    pub atoms: i64,
    pub removed_atoms: i64,
    pub relations: i64,
    pub resolved_relations: i64,
    pub last_indexed: Option<i64>,
    pub archetypes: Vec<(String, i64)>,
    pub purposes: Vec<(String, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom() -> Atom {
        Atom::new("a.js", "foo", None, AtomKind::Function)
    }

    #[test]
    fn add_caller_rejects_self_and_duplicates() {
        let mut target = atom();
        assert!(!target.add_caller("a.js::foo"));
        assert!(target.add_caller("b.js::bar"));
        assert!(!target.add_caller("b.js::bar"));
        assert_eq!(target.called_by, vec!["b.js::bar".to_string()]);
    }

    #[test]
    fn serializes_with_camel_case_and_type_tags() {
        let mut value = atom();
        value.calls.push(CallRef {
            name: "bar".to_string(),
            call_type: CallType::External,
            line: 2,
        });
        value.archetype = Some(Archetype {
            kind: ArchetypeKind::GodFunction,
            severity: 10,
            confidence: 0.95,
        });
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["filePath"], "a.js");
        assert_eq!(json["calls"][0]["type"], "external");
        assert_eq!(json["archetype"]["type"], "god-function");
        let back: Atom = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }
}
