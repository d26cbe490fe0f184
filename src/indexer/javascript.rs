use crate::error::IndexError;
use crate::indexer::extract::{
    DeclKeyword, ExportDecl, ExportKind, ImportDecl, ImportSpecifier, ParsedFile, ParsedFunction,
    ParsedVariable, RawCall, TypeDecl,
};
use crate::model::FunctionType;
use anyhow::Result;
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Javascript,
    Typescript,
    Tsx,
}

impl Dialect {
    pub fn for_language(language: &str) -> Option<Self> {
        match language {
            "javascript" => Some(Dialect::Javascript),
            "typescript" => Some(Dialect::Typescript),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }
}

pub struct JavascriptParser {
    parser: Parser,
}

impl JavascriptParser {
    pub fn new(dialect: Dialect) -> Result<Self> {
        let mut parser = Parser::new();
        match dialect {
            Dialect::Javascript => {
                parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?
            }
            Dialect::Typescript => {
                parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?
            }
            Dialect::Tsx => parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?,
        }
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter returned no tree"))?;
        let root = tree.root_node();
        let mut output = ParsedFile::default();
        let mut exported_names: Vec<String> = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            walk_top_level(child, source, false, &mut output, &mut exported_names);
        }
        for name in &exported_names {
            for function in output.functions.iter_mut() {
                if function.owner.is_none() && &function.name == name {
                    function.is_exported = true;
                }
            }
            for variable in output.variables.iter_mut() {
                if &variable.name == name {
                    variable.is_exported = true;
                }
            }
        }
        Ok(output)
    }
}

/// One parser per dialect, owned by a single worker.
pub struct ParserSet {
    javascript: JavascriptParser,
    typescript: JavascriptParser,
    tsx: JavascriptParser,
}

impl ParserSet {
    pub fn new() -> Result<Self> {
        Ok(Self {
            javascript: JavascriptParser::new(Dialect::Javascript)?,
            typescript: JavascriptParser::new(Dialect::Typescript)?,
            tsx: JavascriptParser::new(Dialect::Tsx)?,
        })
    }

    pub fn parse(&mut self, language: &str, rel_path: &str, source: &str) -> Result<ParsedFile> {
        let dialect = Dialect::for_language(language).ok_or_else(|| IndexError::ParseFailure {
            path: rel_path.to_string(),
            message: format!("unsupported language {language}"),
        })?;
        let parser = match dialect {
            Dialect::Javascript => &mut self.javascript,
            Dialect::Typescript => &mut self.typescript,
            Dialect::Tsx => &mut self.tsx,
        };
        parser.parse(source).map_err(|err| {
            IndexError::ParseFailure {
                path: rel_path.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }
}

fn walk_top_level(
    node: Node<'_>,
    source: &str,
    exported: bool,
    output: &mut ParsedFile,
    exported_names: &mut Vec<String>,
) {
    match node.kind() {
        "import_statement" => handle_import(node, source, output),
        "export_statement" => handle_export(node, source, output, exported_names),
        "function_declaration" | "generator_function_declaration" => {
            if let Some(function) = function_from_declaration(node, source, exported) {
                output.functions.push(function);
            }
        }
        "class_declaration" | "abstract_class_declaration" | "class" => {
            handle_class(node, source, exported, output);
        }
        "lexical_declaration" | "variable_declaration" => {
            handle_variable_declaration(node, source, exported, output);
        }
        "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
            if let Some(name) = field_text(node, "name", source) {
                output.type_declarations.push(TypeDecl {
                    name,
                    kind: type_decl_kind(node.kind()).to_string(),
                    line: start_line(node),
                });
            }
        }
        "expression_statement" => handle_commonjs_export(node, source, output, exported_names),
        _ => {}
    }
}

fn type_decl_kind(kind: &str) -> &'static str {
    match kind {
        "interface_declaration" => "interface",
        "type_alias_declaration" => "type",
        "enum_declaration" => "enum",
        _ => "class",
    }
}

fn handle_import(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let Some(module) = unquote_string_literal(&node_text(source_node, source)) else {
        return;
    };
    let mut decl = ImportDecl {
        source: module,
        line: start_line(node),
        ..Default::default()
    };
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for part in child.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => decl.default = Some(node_text(part, source)),
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let alias = part
                        .named_children(&mut ns_cursor)
                        .find(|n| n.kind() == "identifier")
                        .map(|n| node_text(n, source));
                    decl.namespace = alias;
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part.named_children(&mut spec_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(imported) = field_text(spec, "name", source) else {
                            continue;
                        };
                        let local = field_text(spec, "alias", source)
                            .unwrap_or_else(|| imported.clone());
                        decl.specifiers.push(ImportSpecifier { imported, local });
                    }
                }
                _ => {}
            }
        }
    }
    output.imports.push(decl);
}

fn handle_export(
    node: Node<'_>,
    source: &str,
    output: &mut ParsedFile,
    exported_names: &mut Vec<String>,
) {
    let line = start_line(node);
    let is_default = has_token(node, "default");
    if let Some(declaration) = node.child_by_field_name("declaration") {
        let before = (output.functions.len(), output.variables.len());
        walk_top_level(declaration, source, true, output, exported_names);
        let kind = match declaration.kind() {
            "function_declaration" | "generator_function_declaration" => ExportKind::Function,
            "class_declaration" | "abstract_class_declaration" => ExportKind::Class,
            _ => ExportKind::Variable,
        };
        for function in &output.functions[before.0..] {
            if function.owner.is_none() {
                output.exports.push(ExportDecl {
                    name: function.name.clone(),
                    kind,
                    line,
                });
            }
        }
        for variable in &output.variables[before.1..] {
            output.exports.push(ExportDecl {
                name: variable.name.clone(),
                kind,
                line,
            });
        }
        if kind == ExportKind::Class {
            if let Some(name) = field_text(declaration, "name", source) {
                output.exports.push(ExportDecl { name, kind, line });
            }
        }
        return;
    }
    if let Some(value) = node.child_by_field_name("value") {
        if is_default {
            match value.kind() {
                "identifier" => {
                    let name = node_text(value, source);
                    exported_names.push(name.clone());
                    output.exports.push(ExportDecl {
                        name,
                        kind: ExportKind::Default,
                        line,
                    });
                }
                "function_expression" | "function" | "arrow_function" | "class" => {
                    if value.kind() == "class" {
                        handle_class(value, source, true, output);
                    } else if let Some(mut function) =
                        function_from_value("default", value, source, line)
                    {
                        if let Some(name) = field_text(value, "name", source) {
                            function.name = name;
                        }
                        function.is_exported = true;
                        output.functions.push(function);
                    }
                    output.exports.push(ExportDecl {
                        name: "default".to_string(),
                        kind: ExportKind::Default,
                        line,
                    });
                }
                _ => {}
            }
        }
        return;
    }
    let reexport = node.child_by_field_name("source").is_some();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "export_clause" {
            continue;
        }
        let mut spec_cursor = child.walk();
        for spec in child.named_children(&mut spec_cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let Some(local) = field_text(spec, "name", source) else {
                continue;
            };
            let exported = field_text(spec, "alias", source).unwrap_or_else(|| local.clone());
            if !reexport {
                exported_names.push(local);
            }
            output.exports.push(ExportDecl {
                name: exported,
                kind: if reexport {
                    ExportKind::Reexport
                } else {
                    ExportKind::Named
                },
                line,
            });
        }
    }
}

/// `module.exports = { a, b }`, `module.exports.x = fn`, `exports.x = fn`.
fn handle_commonjs_export(
    node: Node<'_>,
    source: &str,
    output: &mut ParsedFile,
    exported_names: &mut Vec<String>,
) {
    let Some(expr) = node.named_child(0) else {
        return;
    };
    if expr.kind() != "assignment_expression" {
        return;
    }
    let (Some(left), Some(right)) = (
        expr.child_by_field_name("left"),
        expr.child_by_field_name("right"),
    ) else {
        return;
    };
    let target = node_text(left, source);
    let line = start_line(node);
    if target == "module.exports" {
        match right.kind() {
            "object" => {
                let mut cursor = right.walk();
                for entry in right.named_children(&mut cursor) {
                    let name = match entry.kind() {
                        "shorthand_property_identifier" => node_text(entry, source),
                        "pair" => match entry.child_by_field_name("value") {
                            Some(value) if value.kind() == "identifier" => {
                                node_text(value, source)
                            }
                            _ => continue,
                        },
                        _ => continue,
                    };
                    exported_names.push(name.clone());
                    output.exports.push(ExportDecl {
                        name,
                        kind: ExportKind::Named,
                        line,
                    });
                }
            }
            "identifier" => {
                let name = node_text(right, source);
                exported_names.push(name.clone());
                output.exports.push(ExportDecl {
                    name,
                    kind: ExportKind::Default,
                    line,
                });
            }
            _ => {}
        }
        return;
    }
    let name = target
        .strip_prefix("module.exports.")
        .or_else(|| target.strip_prefix("exports."));
    let Some(name) = name else {
        return;
    };
    if name.contains('.') || name.is_empty() {
        return;
    }
    if let Some(mut function) = function_from_value(name, right, source, line) {
        function.is_exported = true;
        output.functions.push(function);
    } else if right.kind() == "identifier" {
        exported_names.push(node_text(right, source));
    }
    output.exports.push(ExportDecl {
        name: name.to_string(),
        kind: ExportKind::Named,
        line,
    });
}

fn handle_class(node: Node<'_>, source: &str, exported: bool, output: &mut ParsedFile) {
    let Some(class_name) = field_text(node, "name", source) else {
        return;
    };
    output.type_declarations.push(TypeDecl {
        name: class_name.clone(),
        kind: "class".to_string(),
        line: start_line(node),
    });
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_definition" => {
                let Some(name) = field_text(member, "name", source) else {
                    continue;
                };
                let body_node = member.child_by_field_name("body");
                output.functions.push(ParsedFunction {
                    name,
                    owner: Some(class_name.clone()),
                    line: start_line(member),
                    end_line: end_line(member),
                    start_byte: member.start_byte(),
                    end_byte: member.end_byte(),
                    params: collect_params(member, source),
                    is_exported: exported,
                    is_async: has_token(member, "async"),
                    function_type: FunctionType::Method,
                    calls: body_node
                        .map(|b| collect_calls(b, source))
                        .unwrap_or_default(),
                });
            }
            "field_definition" | "public_field_definition" => {
                let name = member
                    .child_by_field_name("property")
                    .or_else(|| member.child_by_field_name("name"))
                    .map(|n| node_text(n, source));
                let value = member.child_by_field_name("value");
                let (Some(name), Some(value)) = (name, value) else {
                    continue;
                };
                if let Some(mut function) =
                    function_from_value(&name, value, source, start_line(member))
                {
                    function.owner = Some(class_name.clone());
                    function.is_exported = exported;
                    function.line = start_line(member);
                    function.function_type = FunctionType::Method;
                    output.functions.push(function);
                }
            }
            _ => {}
        }
    }
}

fn handle_variable_declaration(
    node: Node<'_>,
    source: &str,
    exported: bool,
    output: &mut ParsedFile,
) {
    let keyword = declaration_keyword(node, source);
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = node_text(name_node, source);
        let line = start_line(declarator);
        if let Some(value) = declarator.child_by_field_name("value") {
            if let Some(mut function) = function_from_value(&name, value, source, line) {
                function.is_exported = exported;
                function.line = start_line(node);
                function.end_line = end_line(node);
                output.functions.push(function);
                continue;
            }
        }
        output.variables.push(ParsedVariable {
            name,
            line,
            end_line: end_line(declarator),
            keyword,
            is_exported: exported,
        });
    }
}

fn function_from_declaration(node: Node<'_>, source: &str, exported: bool) -> Option<ParsedFunction> {
    let name = field_text(node, "name", source)?;
    let body = node.child_by_field_name("body");
    Some(ParsedFunction {
        name,
        owner: None,
        line: start_line(node),
        end_line: end_line(node),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        params: collect_params(node, source),
        is_exported: exported,
        is_async: has_token(node, "async"),
        function_type: FunctionType::Declaration,
        calls: body.map(|b| collect_calls(b, source)).unwrap_or_default(),
    })
}

/// A function literal bound to `name`; `None` when `value` is not callable.
fn function_from_value(
    name: &str,
    value: Node<'_>,
    source: &str,
    line: i64,
) -> Option<ParsedFunction> {
    let value = unwrap_expression(value);
    let function_type = match value.kind() {
        "arrow_function" => FunctionType::Arrow,
        "function_expression" | "function" | "generator_function" => FunctionType::Expression,
        _ => return None,
    };
    let body = value.child_by_field_name("body");
    let calls = match body {
        Some(body) => collect_calls(body, source),
        None => Vec::new(),
    };
    Some(ParsedFunction {
        name: name.to_string(),
        owner: None,
        line,
        end_line: end_line(value),
        start_byte: value.start_byte(),
        end_byte: value.end_byte(),
        params: collect_params(value, source),
        is_exported: false,
        is_async: has_token(value, "async"),
        function_type,
        calls,
    })
}

fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    loop {
        match node.kind() {
            "parenthesized_expression" | "as_expression" | "satisfies_expression" => {
                match node
                    .child_by_field_name("expression")
                    .or_else(|| node.named_child(0))
                {
                    Some(inner) => node = inner,
                    None => return node,
                }
            }
            _ => return node,
        }
    }
}

fn collect_params(node: Node<'_>, source: &str) -> Vec<String> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![node_text(single, source)];
    }
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let name_node = match param.kind() {
            "required_parameter" | "optional_parameter" => param
                .child_by_field_name("pattern")
                .unwrap_or(param),
            "assignment_pattern" => param.child_by_field_name("left").unwrap_or(param),
            "rest_pattern" => param.named_child(0).unwrap_or(param),
            "comment" => continue,
            _ => param,
        };
        let name = match name_node.kind() {
            "assignment_pattern" => name_node
                .child_by_field_name("left")
                .map(|n| node_text(n, source))
                .unwrap_or_default(),
            "rest_pattern" => name_node
                .named_child(0)
                .map(|n| node_text(n, source))
                .unwrap_or_default(),
            _ => node_text(name_node, source),
        };
        if !name.is_empty() {
            out.push(name);
        }
    }
    out
}

/// Every call inside `body`, including calls made from nested callbacks.
fn collect_calls(body: Node<'_>, source: &str) -> Vec<RawCall> {
    let mut calls = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            if let Some(target) = node.child_by_field_name("function") {
                if let Some(name) = call_name(target, source) {
                    calls.push(RawCall {
                        name,
                        line: start_line(node),
                    });
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    calls.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.name.cmp(&b.name)));
    calls
}

fn call_name(target: Node<'_>, source: &str) -> Option<String> {
    let raw = node_text(target, source).replace("?.", ".");
    let raw = raw.trim();
    if raw.is_empty() || !is_simple_call_target(raw) {
        return None;
    }
    if raw.starts_with('.') || raw.ends_with('.') {
        return None;
    }
    Some(raw.to_string())
}

fn is_simple_call_target(raw: &str) -> bool {
    raw.chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '$' || ch == '#')
}

fn declaration_keyword(node: Node<'_>, source: &str) -> DeclKeyword {
    let text = node_text(node, source);
    let trimmed = text.trim_start();
    if trimmed.starts_with("const ") {
        DeclKeyword::Const
    } else if trimmed.starts_with("let ") {
        DeclKeyword::Let
    } else {
        DeclKeyword::Var
    }
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    let text = node_text(node.child_by_field_name(field)?, source);
    if text.is_empty() { None } else { Some(text) }
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' || first == '`' {
        let last = trimmed.chars().last()?;
        if last == first {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

fn start_line(node: Node<'_>) -> i64 {
    node.start_position().row as i64 + 1
}

fn end_line(node: Node<'_>) -> i64 {
    node.end_position().row as i64 + 1
}

fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{Dialect, JavascriptParser};
    use crate::model::FunctionType;

    #[test]
    fn extracts_functions_calls_and_exports() {
        let source = r#"
import * as mixin from "./mixin.js";
import { foo, bar as baz } from "./a.js";

export function run(a, b = 2, ...rest) {
    foo();
    baz.go();
    return helper(a);
}

const helper = async (x) => {
    await fetch(x);
};

export const LIMIT = 10;
"#;
        let mut parser = JavascriptParser::new(Dialect::Javascript).unwrap();
        let parsed = parser.parse(source).unwrap();

        assert_eq!(parsed.imports.len(), 2);
        assert_eq!(parsed.imports[0].namespace.as_deref(), Some("mixin"));
        assert_eq!(parsed.imports[1].specifiers[1].local, "baz");
        assert_eq!(parsed.imports[1].specifiers[1].imported, "bar");

        let run = parsed.functions.iter().find(|f| f.name == "run").unwrap();
        assert!(run.is_exported);
        assert_eq!(run.params, vec!["a", "b", "rest"]);
        let names: Vec<_> = run.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "baz.go", "helper"]);

        let helper = parsed.functions.iter().find(|f| f.name == "helper").unwrap();
        assert!(!helper.is_exported);
        assert!(helper.is_async);
        assert_eq!(helper.function_type, FunctionType::Arrow);

        assert_eq!(parsed.variables.len(), 1);
        assert!(parsed.variables[0].is_exported);
        assert!(parsed.is_exported_name("LIMIT"));
    }

    #[test]
    fn extracts_class_methods_with_owner() {
        let source = r#"
export class Store {
    constructor() { this.items = []; }
    async save(item) { this.validate(item); }
    validate(item) { return !!item; }
}
"#;
        let mut parser = JavascriptParser::new(Dialect::Javascript).unwrap();
        let parsed = parser.parse(source).unwrap();
        let save = parsed.functions.iter().find(|f| f.name == "save").unwrap();
        assert_eq!(save.owner.as_deref(), Some("Store"));
        assert!(save.is_async);
        assert_eq!(save.function_type, FunctionType::Method);
        assert_eq!(save.calls[0].name, "this.validate");
        assert_eq!(parsed.type_declarations[0].name, "Store");
    }

    #[test]
    fn commonjs_exports_mark_functions_exported() {
        let source = r#"
function a() {}
function b() {}
module.exports = { a, renamed: b };
exports.c = function () { a(); };
"#;
        let mut parser = JavascriptParser::new(Dialect::Javascript).unwrap();
        let parsed = parser.parse(source).unwrap();
        assert!(parsed.functions.iter().all(|f| f.is_exported));
        assert!(parsed.functions.iter().any(|f| f.name == "c"));
    }

    #[test]
    fn parses_typescript_parameters() {
        let source = "export function add(a: number, b?: number): number { return a + (b ?? 0); }";
        let mut parser = JavascriptParser::new(Dialect::Typescript).unwrap();
        let parsed = parser.parse(source).unwrap();
        assert_eq!(parsed.functions[0].params, vec!["a", "b"]);
    }
}
