// Helper functions for safe logging

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
///
/// # Example
/// ```
/// use protected_api::common::safe_token_log;
/// assert_eq!(safe_token_log("eyJhbGciOiJSUzI1NiJ9.payload.sig"), "eyJh....sig");
/// ```
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 && token.is_char_boundary(4) && token.is_char_boundary(token.len() - 4) {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// Truncates a logged body to `max` bytes on a char boundary.
pub fn truncate_for_log(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
