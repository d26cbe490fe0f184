//! Regex and token heuristics behind the extractor registry.
//!
//! Every function here is pure: it sees the code of one function (or one
//! file for the file-level detectors) plus the outputs it declared as inputs,
//! and returns a JSON value.

use crate::indexer::registry::ExtractorInput;
use crate::indexer::stable_id::dna_hash;
use crate::metrics::strip_comments_and_strings;
use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static EVENT_BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\.(addEventListener|on|once|addListener)\(\s*['"`]([\w:.-]+)['"`]\s*,\s*(?:this\.)?([A-Za-z_$][\w$]*)"#,
    )
    .expect("valid event binding regex")
});
static DYNAMIC_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\(\s*['"`]([^'"`]+)['"`]\s*\)"#).expect("valid dynamic import regex")
});
static NETWORK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(fetch|axios(\.\w+)?|XMLHttpRequest|WebSocket|EventSource|http\.request|https\.request|request|got|superagent)\s*\(|\bnew\s+(XMLHttpRequest|WebSocket|EventSource)\b|\$\.(ajax|get|post)\(",
    )
    .expect("valid network regex")
});
static DOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(innerHTML|outerHTML|textContent|appendChild|removeChild|insertBefore|replaceChild|insertAdjacentHTML|setAttribute|removeAttribute|classList|style\.\w+)\b|\bdocument\.(createElement|write|body)",
    )
    .expect("valid dom regex")
});
static STORAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(localStorage|sessionStorage|indexedDB)\b|\bfs\.(write|append|unlink|mkdir|rm|rename|copy)\w*|\.(save|insert|update|delete|upsert|put)\w*\s*\(",
    )
    .expect("valid storage regex")
});
static LOGGING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bconsole\.(log|warn|error|info|debug|trace)\b").expect("valid logging regex")
});
static GLOBAL_WRITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(window|globalThis|global|process\.env)\.[\w$]+\s*=[^=]|\bthis\.[\w$]+\s*=[^=]")
        .expect("valid global write regex")
});
static TIMER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(setTimeout|setInterval|setImmediate|requestAnimationFrame|requestIdleCallback|queueMicrotask)\s*\(")
        .expect("valid timer regex")
});
static PROMISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.then\s*\(|\bPromise\.(all|race|any|allSettled|resolve|reject)\b|\bnew\s+Promise\b")
        .expect("valid promise regex")
});
static AWAIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bawait\b").expect("valid await regex"));
static EMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(emit|dispatchEvent|addEventListener|removeEventListener|on|once|off)\s*\(")
        .expect("valid emit regex")
});
static LIFECYCLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(connectedCallback|disconnectedCallback|attributeChangedCallback|adoptedCallback|componentDidMount|componentDidUpdate|componentWillUnmount|mounted|beforeMount|unmounted|beforeDestroy|created|ngOnInit|ngOnDestroy|ngOnChanges|onMount|onDestroy|onInit|onLoad|onUnload)$",
    )
    .expect("valid lifecycle regex")
});
static LIFECYCLE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(useEffect|useLayoutEffect|onMounted|onUnmounted|onMount|onDestroy)\s*\(")
        .expect("valid lifecycle call regex")
});
static TRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btry\s*\{").expect("valid try regex"));
static CATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcatch\s*[({]").expect("valid catch regex"));
static PROMISE_CATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.catch\s*\(").expect("valid promise catch regex"));
static FINALLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfinally\b").expect("valid finally regex"));
static THROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bthrow\s+(?:new\s+([A-Za-z_$][\w$]*))?").expect("valid throw regex")
});
static RETURN_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\s+[^;\s}]").expect("valid return regex"));
static TYPED_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^(]*\(([^)]*:[^)]*)\)").expect("valid typed param regex")
});
static RETURN_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^{]*\)\s*:\s*([A-Za-z_$][\w$<>\[\]|., ]*)").expect("valid return type regex")
});
static LOOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(for|while)\s*\(|\bdo\s*\{").expect("valid loop regex"));
static ITERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(forEach|map|filter|reduce|some|every|find|findIndex|flatMap)\s*\(")
        .expect("valid iterator regex")
});
static SYNC_IO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+Sync\s*\(").expect("valid sync io regex"));
static JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bJSON\.(parse|stringify)\s*\(").expect("valid json regex"));
static QUERY_SELECTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(querySelector(All)?|getElementById|getElementsBy\w+)\s*\(")
        .expect("valid query selector regex")
});
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][\w$]*").expect("valid identifier regex"));
static CALL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(if|else|for|while|switch|case|try|catch|throw|return|await|yield|new|break|continue)\b|[A-Za-z_$][\w$]*\s*\(|[^=!<>]=[^=>]")
        .expect("valid dna token regex")
});

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default", "delete",
    "do", "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "null", "of", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "yield",
];

const DOMAINS: &[(&str, &[&str])] = &[
    (
        "auth",
        &["auth", "login", "logout", "token", "session", "password", "credential", "permission", "jwt", "oauth"],
    ),
    (
        "network",
        &["fetch", "request", "response", "http", "api", "endpoint", "socket", "url", "axios"],
    ),
    (
        "ui",
        &["render", "click", "element", "dom", "view", "component", "modal", "button", "style", "display"],
    ),
    (
        "storage",
        &["save", "load", "store", "cache", "persist", "database", "db", "storage", "record", "query"],
    ),
    (
        "validation",
        &["validate", "check", "verify", "assert", "sanitize", "valid", "schema"],
    ),
    (
        "data",
        &["parse", "format", "transform", "convert", "serialize", "map", "filter", "sort", "normalize"],
    ),
    (
        "config",
        &["config", "setting", "option", "env", "init", "setup", "bootstrap"],
    ),
    (
        "testing",
        &["test", "mock", "stub", "spy", "fixture", "expect", "describe"],
    ),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBinding {
    method: String,
    event: String,
    handler: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBindings {
    bindings: Vec<EventBinding>,
    handlers: Vec<String>,
}

/// `el.addEventListener('click', onClick)` style bindings across the file.
pub fn event_bindings(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let mut bindings = Vec::new();
    let mut handlers = BTreeSet::new();
    for caps in EVENT_BINDING_RE.captures_iter(&code) {
        let handler = caps[3].to_string();
        handlers.insert(handler.clone());
        bindings.push(EventBinding {
            method: caps[1].to_string(),
            event: caps[2].to_string(),
            handler,
        });
    }
    Ok(serde_json::to_value(EventBindings {
        bindings,
        handlers: handlers.into_iter().collect(),
    })?)
}

/// `import('./module')` targets referenced anywhere in the file.
pub fn dynamic_imports(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let targets: BTreeSet<String> = DYNAMIC_IMPORT_RE
        .captures_iter(&code)
        .map(|caps| caps[1].to_string())
        .collect();
    Ok(serde_json::json!({ "targets": targets.into_iter().collect::<Vec<_>>() }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SideEffects {
    has_side_effects: bool,
    network: bool,
    dom: bool,
    storage: bool,
    logging: bool,
    global_mutation: bool,
    categories: Vec<&'static str>,
}

pub fn side_effects(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let network = NETWORK_RE.is_match(&code);
    let dom = DOM_RE.is_match(&code);
    let storage = STORAGE_RE.is_match(&code);
    let logging = LOGGING_RE.is_match(&code);
    let global_mutation = GLOBAL_WRITE_RE.is_match(&code);
    let mut categories = Vec::new();
    for (flag, name) in [
        (network, "network"),
        (dom, "dom"),
        (storage, "storage"),
        (logging, "logging"),
        (global_mutation, "global_mutation"),
    ] {
        if flag {
            categories.push(name);
        }
    }
    Ok(serde_json::to_value(SideEffects {
        has_side_effects: !categories.is_empty(),
        network,
        dom,
        storage,
        logging,
        global_mutation,
        categories,
    })?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AsyncPatterns {
    uses_await: bool,
    await_count: usize,
    uses_promises: bool,
    has_timers: bool,
    timer_count: usize,
    is_event_handler: bool,
    emits_events: bool,
    is_lifecycle_hook: bool,
}

pub fn async_patterns(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let handlers = input
        .dep("event_bindings")
        .and_then(|value| value.get("handlers"))
        .and_then(Value::as_array);
    let is_event_handler = handlers
        .map(|list| list.iter().any(|h| h.as_str() == Some(input.name)))
        .unwrap_or(false);
    let await_count = AWAIT_RE.find_iter(&code).count();
    let timer_count = TIMER_RE.find_iter(&code).count();
    let is_lifecycle_hook =
        LIFECYCLE_NAME_RE.is_match(input.name) || LIFECYCLE_CALL_RE.is_match(&code);
    Ok(serde_json::to_value(AsyncPatterns {
        uses_await: await_count > 0,
        await_count,
        uses_promises: PROMISE_RE.is_match(&code),
        has_timers: timer_count > 0,
        timer_count,
        is_event_handler,
        emits_events: EMIT_RE.is_match(&code),
        is_lifecycle_hook,
    })?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorHandling {
    has_error_handling: bool,
    try_catch_count: usize,
    promise_catch_count: usize,
    has_finally: bool,
    throw_count: usize,
}

pub fn error_handling(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let try_count = TRY_RE.find_iter(&code).count();
    let catch_count = CATCH_RE.find_iter(&code).count().min(try_count);
    let promise_catch_count = PROMISE_CATCH_RE.find_iter(&code).count();
    Ok(serde_json::to_value(ErrorHandling {
        has_error_handling: catch_count > 0 || promise_catch_count > 0,
        try_catch_count: catch_count,
        promise_catch_count,
        has_finally: FINALLY_RE.is_match(&code),
        throw_count: THROW_RE.find_iter(&code).count(),
    })?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypeContracts {
    returns_value: bool,
    has_typed_params: bool,
    return_type: Option<String>,
    throws_types: Vec<String>,
}

pub fn type_contracts(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code);
    let signature = signature_of(&code);
    let throws_types: BTreeSet<String> = THROW_RE
        .captures_iter(&code)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();
    let return_type = RETURN_TYPE_RE
        .captures(signature)
        .map(|caps| caps[1].trim().to_string())
        .filter(|value| !value.is_empty());
    let arrow_expression_body = code.contains("=>") && !code.contains('{');
    Ok(serde_json::to_value(TypeContracts {
        returns_value: RETURN_VALUE_RE.is_match(&code) || arrow_expression_body,
        has_typed_params: TYPED_PARAM_RE.is_match(signature),
        return_type,
        throws_types: throws_types.into_iter().collect(),
    })?)
}

/// How errors leave the function: caught locally, thrown to the caller, or neither.
pub fn error_flow(input: &ExtractorInput<'_>) -> Result<Value> {
    let handled = input
        .dep("error_handling")
        .and_then(|v| v.get("hasErrorHandling"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let throw_count = input
        .dep("error_handling")
        .and_then(|v| v.get("throwCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let throws: Vec<Value> = input
        .dep("type_contracts")
        .and_then(|v| v.get("throwsTypes"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let flow = match (handled, throw_count > 0) {
        (true, true) => "rethrows",
        (true, false) => "guarded",
        (false, true) => "propagates",
        (false, false) => "unguarded",
    };
    Ok(serde_json::json!({
        "flow": flow,
        "handled": handled,
        "throws": throws,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceHints {
    loop_count: usize,
    max_loop_depth: usize,
    has_nested_loops: bool,
    hints: Vec<&'static str>,
}

pub fn performance_hints(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments_and_strings(input.code);
    let loop_starts: Vec<usize> = LOOP_RE
        .find_iter(&code)
        .chain(ITERATOR_RE.find_iter(&code))
        .map(|m| m.start())
        .collect();
    let max_loop_depth = max_loop_nesting(&code, &loop_starts);
    let mut hints = Vec::new();
    if max_loop_depth >= 2 {
        hints.push("nested_loops");
    }
    if SYNC_IO_RE.is_match(&code) {
        hints.push("sync_io");
    }
    if max_loop_depth >= 1 && JSON_RE.is_match(&code) {
        hints.push("json_in_loop");
    }
    if max_loop_depth >= 1 && QUERY_SELECTOR_RE.is_match(&code) {
        hints.push("dom_query_in_loop");
    }
    if max_loop_depth >= 1 && AWAIT_RE.is_match(&code) {
        hints.push("await_in_loop");
    }
    Ok(serde_json::to_value(PerformanceHints {
        loop_count: loop_starts.len(),
        max_loop_depth,
        has_nested_loops: max_loop_depth >= 2,
        hints,
    })?)
}

pub fn performance_metrics(input: &ExtractorInput<'_>) -> Result<Value> {
    let hints = input.dep("performance_hints");
    let depth = hints
        .and_then(|v| v.get("maxLoopDepth"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let hint_count = hints
        .and_then(|v| v.get("hints"))
        .and_then(Value::as_array)
        .map(|list| list.len())
        .unwrap_or(0);
    let big_o = match depth {
        0 => "O(1)".to_string(),
        1 => "O(n)".to_string(),
        n => format!("O(n^{n})"),
    };
    let score = (1.0 - 0.25 * depth as f64 - 0.1 * hint_count as f64).clamp(0.0, 1.0);
    Ok(serde_json::json!({
        "estimatedComplexity": big_o,
        "score": crate::util::round2(score),
    }))
}

/// Structural fingerprint: the ordered operation sequence with identifiers
/// erased, plus its hash.
pub fn dna(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments_and_strings(input.code);
    let body = body_of(&code);
    let mut sequence = Vec::new();
    for m in CALL_TOKEN_RE.find_iter(body) {
        let token = m.as_str().trim();
        let op = if token.ends_with('(') {
            let ident = token.trim_end_matches('(').trim();
            if matches!(ident, "if" | "for" | "while" | "switch" | "catch") {
                ident.to_string()
            } else {
                "call".to_string()
            }
        } else if token.contains('=') {
            "assign".to_string()
        } else {
            token.to_string()
        };
        sequence.push(op);
    }
    if let Some(categories) = input
        .dep("side_effects")
        .and_then(|v| v.get("categories"))
        .and_then(Value::as_array)
    {
        for category in categories.iter().filter_map(Value::as_str) {
            sequence.push(format!("effect:{category}"));
        }
    }
    let hash = dna_hash(&sequence);
    Ok(serde_json::json!({ "hash": hash, "sequence": sequence }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataFlow {
    flow_type: &'static str,
    reads_params: Vec<String>,
    identifiers: Vec<String>,
}

pub fn data_flow(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments_and_strings(input.code);
    let signature = signature_of(&code);
    let params = param_names(signature);
    let body = body_of(&code);
    let identifiers: BTreeSet<String> = IDENT_RE
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .filter(|ident| !JS_KEYWORDS.contains(&ident.as_str()))
        .collect();
    let reads_params: Vec<String> = params
        .iter()
        .filter(|param| identifiers.contains(*param))
        .cloned()
        .collect();
    let lower = input.name.to_ascii_lowercase();
    let handler_param = params.iter().any(|p| {
        matches!(p.as_str(), "event" | "evt" | "e" | "req" | "res" | "ctx" | "message" | "msg")
    });
    let returns = RETURN_VALUE_RE.is_match(body) || !body.contains('{');
    let flow_type = if STORAGE_RE.is_match(body)
        || ["save", "persist", "store", "write", "insert"]
            .iter()
            .any(|prefix| lower.starts_with(prefix))
    {
        "persist"
    } else if handler_param || lower.starts_with("handle") || lower.starts_with("on") {
        "handler"
    } else if NETWORK_RE.is_match(body) {
        "fetch"
    } else if !params.is_empty() && returns && !DOM_RE.is_match(body) {
        "transform"
    } else if returns {
        "producer"
    } else {
        "procedure"
    };
    Ok(serde_json::to_value(DataFlow {
        flow_type,
        reads_params,
        identifiers: identifiers.into_iter().collect(),
    })?)
}

/// Dominant concern of a function, from keywords in its name and body.
pub fn semantic_domain(input: &ExtractorInput<'_>) -> Result<Value> {
    let code = strip_comments(input.code).to_ascii_lowercase();
    let name = input.name.to_ascii_lowercase();
    let path = input.file_path.to_ascii_lowercase();
    let mut best: Option<(&str, usize, Vec<&str>)> = None;
    for (domain, keywords) in DOMAINS {
        let mut score = 0;
        let mut matched = Vec::new();
        for keyword in keywords.iter() {
            let mut hit = false;
            if name.contains(keyword) {
                score += 3;
                hit = true;
            }
            if path.contains(keyword) {
                score += 1;
                hit = true;
            }
            if code.contains(keyword) {
                score += 1;
                hit = true;
            }
            if hit {
                matched.push(*keyword);
            }
        }
        if score > 0 && best.as_ref().is_none_or(|(_, best_score, _)| score > *best_score) {
            best = Some((domain, score, matched));
        }
    }
    let value = match best {
        Some((domain, score, keywords)) => serde_json::json!({
            "domain": domain,
            "confidence": crate::util::round2((score as f64 / 10.0).min(1.0)),
            "keywords": keywords,
        }),
        None => serde_json::json!({ "domain": "general", "confidence": 0.0, "keywords": [] }),
    };
    Ok(value)
}

fn strip_comments(code: &str) -> String {
    // Strings carry event names and import targets, so only comments go.
    let mut out = String::with_capacity(code.len());
    let stripped = strip_comments_and_strings(code);
    let mut original = code.chars();
    let mut in_string = false;
    let mut quote = ' ';
    for blank in stripped.chars() {
        let ch = original.next().unwrap_or(' ');
        if in_string {
            out.push(ch);
            if blank == quote {
                in_string = false;
            }
            continue;
        }
        if matches!(blank, '"' | '\'' | '`') && ch == blank {
            in_string = true;
            quote = blank;
            out.push(ch);
            continue;
        }
        out.push(blank);
    }
    out
}

fn signature_of(code: &str) -> &str {
    match code.find('{') {
        Some(idx) => &code[..idx],
        None => match code.find("=>") {
            Some(idx) => &code[..idx],
            None => code,
        },
    }
}

fn body_of(code: &str) -> &str {
    let sig = signature_of(code);
    &code[sig.len()..]
}

fn param_names(signature: &str) -> Vec<String> {
    let inner = match (signature.find('('), signature.rfind(')')) {
        (Some(open), Some(close)) if close > open => &signature[open + 1..close],
        _ => {
            let head = signature.trim().trim_start_matches("async").trim();
            return IDENT_RE
                .find(head)
                .map(|m| vec![m.as_str().to_string()])
                .unwrap_or_default();
        }
    };
    inner
        .split(',')
        .filter_map(|part| {
            let part = part.trim().trim_start_matches("...");
            let name = part.split([':', '=', '?']).next()?.trim();
            if name.is_empty() || name.starts_with(['{', '[']) {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// Deepest nesting of loop constructs, tracked by brace depth.
fn max_loop_nesting(code: &str, loop_starts: &[usize]) -> usize {
    if loop_starts.is_empty() {
        return 0;
    }
    let mut starts = loop_starts.to_vec();
    starts.sort_unstable();
    let mut open_loops: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut next_start = 0usize;
    let mut pending = 0usize;
    for (idx, ch) in code.char_indices() {
        while next_start < starts.len() && starts[next_start] == idx {
            pending += 1;
            next_start += 1;
        }
        match ch {
            '{' => {
                depth += 1;
                if pending > 0 {
                    pending -= 1;
                    open_loops.push(depth);
                    max_depth = max_depth.max(open_loops.len());
                }
            }
            '}' => {
                if open_loops.last() == Some(&depth) {
                    open_loops.pop();
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }
    max_depth.max(usize::from(!starts.is_empty()))
}
