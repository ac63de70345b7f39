//! Small text-joining helpers for context assembly.
//!
//! Each function does one thing: turn metadata lines into a readable block.

/// Join declaration lines into one block.
pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// Join method briefs, leaving out the target method's own brief.
pub fn filter_and_join_lines(lines: &[String], exclude: &str) -> String {
    lines
        .iter()
        .filter(|line| line.as_str() != exclude)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Section heading for one dependency class snippet.
pub fn format_dependency(dep_class_name: &str, snippet: &str) -> String {
    format!(
        "The brief information of dependent class `{}` is\n```java\n{}\n```",
        dep_class_name, snippet
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_drops_exact_match_only() {
        let lines = vec![
            "int add(int a, int b);".to_string(),
            "int sub(int a, int b);".to_string(),
        ];
        let joined = filter_and_join_lines(&lines, "int add(int a, int b);");
        assert_eq!(joined, "int sub(int a, int b);");
    }

    #[test]
    fn join_empty_is_empty() {
        assert_eq!(join_lines(&[]), "");
    }
}
