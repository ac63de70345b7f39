//! Code-block extraction from raw backend responses.

/// Pull exactly one fenced code block out of a response.
///
/// The first fence wins, with or without a language tag. An unterminated
/// fence or an empty block is an extraction failure, reported as `None`;
/// the caller consumes the round and retries.
pub fn extract_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after_fence = &response[start + 3..];
    let newline = after_fence.find('\n')?;
    let body = &after_fence[newline + 1..];
    let end = body.find("```")?;
    let code = body[..end].trim_end();
    if code.trim().is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
