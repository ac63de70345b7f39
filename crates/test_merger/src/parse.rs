//! Structural scan of one generated test class.
//!
//! Line-oriented with brace-depth tracking; enough for conventionally
//! formatted generated code, without pulling in a Java parser.

use crate::signature::normalize_signature;
use crate::{MergeError, MergedMethod, Result, TestUnit};
use log::debug;

/// Parse one artifact into its structural parts.
pub fn parse_unit(source: &str) -> Result<TestUnit> {
    let mut unit = TestUnit::default();
    let mut in_class = false;
    let mut found_class = false;
    let mut depth: i32 = 0;
    let mut pending: Vec<String> = Vec::new();
    let mut current: Option<MergedMethod> = None;

    for raw in source.lines() {
        let trimmed = raw.trim();

        // Inside a member body: collect lines until its brace closes.
        if let Some(mut method) = current.take() {
            depth += brace_delta(trimmed);
            if depth <= 1 {
                unit.push_method(method);
                if depth <= 0 {
                    in_class = false;
                }
            } else {
                method.body.push(raw.to_string());
                current = Some(method);
            }
            continue;
        }

        if !in_class {
            if trimmed.starts_with("package ") {
                unit.package = trimmed.to_string();
            } else if trimmed.starts_with("import ") {
                unit.imports.insert(trimmed.to_string());
            } else if trimmed.starts_with('@') {
                // Class-level annotation, e.g. a runner declaration.
                pending.push(trimmed.to_string());
            } else if is_class_decl(trimmed) && trimmed.contains('{') {
                in_class = true;
                found_class = true;
                unit.class_annotations.extend(pending.drain(..));
                depth = brace_delta(trimmed).max(1);
            }
            continue;
        }

        // Member level of the class body.
        if trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
        {
            continue;
        }
        if trimmed == "}" {
            in_class = false;
            depth = 0;
            pending.clear();
            continue;
        }
        if trimmed.starts_with('@') {
            pending.push(trimmed.to_string());
            continue;
        }
        if is_field_decl(trimmed) {
            // Buffered annotations belong to this field.
            let mut decl: Vec<String> =
                pending.drain(..).filter(|l| l.starts_with('@')).collect();
            decl.push(trimmed.to_string());
            unit.push_field(decl.join("\n"));
            continue;
        }
        if trimmed.ends_with(';') && trimmed.contains('(') {
            // Bodyless declaration; nothing to merge.
            debug!("Skipping bodyless member: {}", trimmed);
            pending.clear();
            continue;
        }

        pending.push(trimmed.to_string());
        if trimmed.contains('{') {
            let delta = brace_delta(trimmed);
            let mut header = std::mem::take(&mut pending);
            let signature = normalize_signature(&header);
            if depth + delta <= 1 {
                // Whole member on one line.
                depth += delta;
                let inner = inner_of_braces(trimmed);
                if let Some(last) = header.last_mut() {
                    if let Some(idx) = last.find('{') {
                        last.truncate(idx + 1);
                    }
                }
                let body = if inner.is_empty() { Vec::new() } else { vec![inner] };
                unit.push_method(MergedMethod {
                    signature,
                    header,
                    body,
                });
            } else {
                depth += delta;
                current = Some(MergedMethod {
                    signature,
                    header,
                    body: Vec::new(),
                });
            }
        }
    }

    if !found_class {
        return Err(MergeError::NoClassDeclaration);
    }
    Ok(unit)
}

/// Net brace count of one line, ignoring braces inside string and char
/// literals and line comments.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    let mut in_char = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string || in_char => {
                chars.next();
            }
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            '/' if !in_string && !in_char => {
                if chars.peek() == Some(&'/') {
                    break;
                }
            }
            '{' if !in_string && !in_char => delta += 1,
            '}' if !in_string && !in_char => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn is_class_decl(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.any(|t| t == "class" || t == "interface" || t == "enum")
}

/// A field ends with `;` and has no parameter list before any initializer.
fn is_field_decl(line: &str) -> bool {
    if !line.ends_with(';') {
        return false;
    }
    match line.find('(') {
        None => true,
        Some(paren) => line.find('=').is_some_and(|eq| eq < paren),
    }
}

/// Text between the first `{` and the last `}` of a single-line member.
fn inner_of_braces(line: &str) -> String {
    let Some(open) = line.find('{') else {
        return String::new();
    };
    let Some(close) = line.rfind('}') else {
        return String::new();
    };
    if close <= open {
        return String::new();
    }
    line[open + 1..close].trim().to_string()
}
