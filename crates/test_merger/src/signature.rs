//! Signature normalization for method deduplication.
//!
//! Two generated fragments target "the same method" when name and ordered
//! parameter types match, regardless of parameter names, modifiers, or
//! formatting. Constructors key the same way through their class name.

use regex::Regex;
use std::sync::OnceLock;

fn generic_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*([<>,])\s*").expect("static regex"))
}

/// Normalize a member header into a `name(type,type)` key.
pub fn normalize_signature(header: &[String]) -> String {
    let declaration = header
        .iter()
        .filter(|line| !line.trim_start().starts_with('@'))
        .map(|line| line.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let declaration = declaration.split_whitespace().collect::<Vec<_>>().join(" ");

    let Some(open) = declaration.find('(') else {
        return declaration;
    };
    // Trailing identifier before the parameter list is the member name.
    let name = declaration[..open]
        .trim_end()
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .next()
        .unwrap_or("")
        .to_string();

    let close = matching_paren(&declaration, open).unwrap_or(declaration.len());
    let params = &declaration[open + 1..close.min(declaration.len())];
    let types: Vec<String> = split_top_level(params)
        .into_iter()
        .filter_map(|param| param_type(&param))
        .collect();

    format!("{}({})", name, types.join(","))
}

/// Index of the `)` matching the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0;
    for (idx, c) in text.char_indices().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a parameter list on commas outside generics and nested parens.
fn split_top_level(params: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (idx, c) in params.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(params[start..idx].to_string());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let tail = params[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts.retain(|p| !p.trim().is_empty());
    parts
}

/// Extract the type of one parameter, dropping modifiers, annotations, and
/// the parameter name.
fn param_type(param: &str) -> Option<String> {
    let tokens: Vec<&str> = param
        .split_whitespace()
        .filter(|t| *t != "final" && !t.starts_with('@'))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let type_tokens = if tokens.len() == 1 {
        &tokens[..]
    } else {
        &tokens[..tokens.len() - 1]
    };
    let joined = type_tokens.join(" ");
    // `List < String >` and `List<String>` must key identically.
    Some(generic_ws_re().replace_all(&joined, "$1").into_owned())
}
