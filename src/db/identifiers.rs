use anyhow::{Result, anyhow};

/// Longest identifier MySQL accepts
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Whether `name` can be used as a table, column or tenant identifier.
///
/// Only letters, digits, underscores and dollar signs are accepted, which
/// keeps every identifier safe to place between backticks.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Validate `name` and return it wrapped in backticks
pub fn quote_identifier(name: &str) -> Result<String> {
    if !is_valid_identifier(name) {
        return Err(anyhow!(
            "Invalid identifier '{}': must be 1-{} letters, numbers, underscores or dollar signs",
            name,
            MAX_IDENTIFIER_LEN
        ));
    }
    Ok(format!("`{}`", name))
}

/// Quote every column of a list, failing on the first invalid one
pub fn quote_all(names: &[&str]) -> Result<Vec<String>> {
    names.iter().map(|name| quote_identifier(name)).collect()
}
