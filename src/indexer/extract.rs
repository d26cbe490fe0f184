use crate::model::FunctionType;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCall {
    pub name: String,
    pub line: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedFunction {
    pub name: String,
    pub owner: Option<String>,
    pub line: i64,
    pub end_line: i64,
    pub start_byte: usize,
    pub end_byte: usize,
    pub params: Vec<String>,
    pub is_exported: bool,
    pub is_async: bool,
    pub function_type: FunctionType,
    pub calls: Vec<RawCall>,
}

impl ParsedFunction {
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKeyword {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedVariable {
    pub name: String,
    pub line: i64,
    pub end_line: i64,
    pub keyword: DeclKeyword,
    pub is_exported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportDecl {
    pub source: String,
    pub line: i64,
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub specifiers: Vec<ImportSpecifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Variable,
    Named,
    Default,
    Reexport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDecl {
    pub name: String,
    pub kind: ExportKind,
    pub line: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: String,
    pub line: i64,
}

/// Per-file parse record consumed by the atom builder.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ParsedFile {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
    pub functions: Vec<ParsedFunction>,
    pub variables: Vec<ParsedVariable>,
    pub type_declarations: Vec<TypeDecl>,
}

impl ParsedFile {
    pub fn is_exported_name(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export.name == name)
    }
}
