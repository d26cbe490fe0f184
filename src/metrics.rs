const BRANCH_KEYWORDS: &[&str] = &["if", "for", "while", "case", "catch"];

/// Cyclomatic-style complexity of a JS/TS function body.
///
/// Base 1, plus one per branch keyword, `&&`, `||` and ternary `?`. `else if`
/// is counted once through its `if`. Comments and string contents are removed
/// first so keywords inside them do not count; `?.` and `??` are not branches.
pub fn complexity_for(snippet: &str) -> i64 {
    let code = strip_comments_and_strings(snippet);
    let keyword_hits = count_keyword_hits(&code, BRANCH_KEYWORDS);
    let operator_hits = count_operator_hits(&code);
    (1 + keyword_hits + operator_hits).max(1)
}

/// Physical lines spanned by `[start_line, end_line]`, at least 1.
pub fn lines_of_code(start_line: i64, end_line: i64) -> i64 {
    (end_line - start_line + 1).max(1)
}

/// Replaces comments and the contents of string/template literals with spaces.
///
/// Newlines are preserved so line offsets still match the input.
pub fn strip_comments_and_strings(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        if ch == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if ch == '/' && next == Some('*') {
            out.push_str("  ");
            i += 2;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    out.push_str("  ");
                    i += 2;
                    break;
                }
                out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            continue;
        }
        if ch == '"' || ch == '\'' || ch == '`' {
            let quote = ch;
            out.push(quote);
            i += 1;
            while i < chars.len() {
                let c = chars[i];
                if c == '\\' {
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                if c == quote {
                    out.push(quote);
                    i += 1;
                    break;
                }
                if c == '\n' && quote != '`' {
                    break;
                }
                out.push(if c == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn count_keyword_hits(snippet: &str, keywords: &[&str]) -> i64 {
    let mut count = 0;
    let mut token = String::new();
    for ch in snippet.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            token.push(ch);
        } else if !token.is_empty() {
            if keywords.contains(&token.as_str()) {
                count += 1;
            }
            token.clear();
        }
    }
    if !token.is_empty() && keywords.contains(&token.as_str()) {
        count += 1;
    }
    count
}

fn count_operator_hits(snippet: &str) -> i64 {
    let mut count = snippet.matches("&&").count() as i64 + snippet.matches("||").count() as i64;
    let bytes = snippet.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte != b'?' {
            continue;
        }
        let prev = if idx > 0 { bytes[idx - 1] } else { b' ' };
        let next = bytes.get(idx + 1).copied().unwrap_or(b' ');
        if prev == b'?' || next == b'?' || next == b'.' {
            continue;
        }
        // TS optional members and parameters: `a?: T`, `b?)`.
        if next == b':' || next == b')' || next == b',' {
            continue;
        }
        count += 1;
    }
    count
}
